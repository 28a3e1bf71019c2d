use crate::context::Context;
use clap::Subcommand;
use stagecrypt_core::{Result, DEFAULT_CHUNK_SIZE, STAGECRYPT_EDITOR_VAR};

pub mod edit;
pub mod export;
pub mod import;
pub mod render;

#[derive(Subcommand)]
pub enum Commands {
    /// Read an open config from stdin, encrypt its secrets and write the config file
    Import,

    /// Decrypt the config file and print it in open form
    Export {
        /// Print JSON instead of YAML
        #[arg(long)]
        json: bool,
    },

    /// Edit the config file in open form with an external editor
    Edit {
        /// Edit JSON instead of YAML
        #[arg(long)]
        json: bool,

        /// Editor command (falls back to $EDITOR, then vi)
        #[arg(long, env = STAGECRYPT_EDITOR_VAR)]
        editor: Option<String>,
    },

    /// Resolve the config for one stage and render it
    Render {
        /// Stage to resolve
        stage: String,

        /// Stage whose key and environment are used for encrypted output and
        /// the parameter store (defaults to the rendered stage)
        #[arg(long)]
        environment: Option<String>,

        /// Plaintext JSON
        #[arg(long, group = "format")]
        json: bool,

        /// JSON with every value encrypted
        #[arg(long, group = "format")]
        encrypt: bool,

        /// The whole document as a JSON array of encrypted chunks
        #[arg(long, group = "format")]
        bundle: bool,

        /// A Rust module embedding the encrypted chunks and a loader
        #[arg(long, group = "format")]
        artifact: bool,

        /// Write every value to the parameter store under this prefix
        #[arg(long, value_name = "PREFIX", group = "format")]
        parameter_store: Option<String>,

        /// Key used to encrypt parameter store values
        #[arg(long, value_name = "ID", alias = "ssm-kms-key", requires = "parameter_store")]
        sink_key_id: Option<String>,

        /// Maximum plaintext bytes per encrypted chunk
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
}

impl Commands {
    pub fn execute(self, context: &Context) -> Result<()> {
        match self {
            Commands::Import => import::execute(context),
            Commands::Export { json } => export::execute(context, json),
            Commands::Edit { json, editor } => edit::execute(context, json, editor),
            Commands::Render {
                stage,
                environment,
                json,
                encrypt,
                bundle,
                artifact,
                parameter_store,
                sink_key_id,
                chunk_size,
            } => {
                let target = if let Some(prefix) = parameter_store {
                    render::Target::ParameterStore {
                        prefix,
                        sink_key_id,
                    }
                } else {
                    render::Target::Output(render::format_from_flags(
                        json, encrypt, bundle, artifact,
                    ))
                };
                render::execute(
                    context,
                    &render::RenderArgs {
                        stage,
                        key_stage: environment,
                        target,
                        chunk_size,
                    },
                )
            }
        }
    }
}
