use clap::Args;
use stagecrypt_aws::{AwsProvider, ServiceConfig};
use stagecrypt_config::{ConfigDocument, EnvironmentCatalog, StageRegistry};
use stagecrypt_core::{
    Result, DEFAULT_CONFIG_FILE, DEFAULT_ENVIRONMENTS_FILE, STAGECRYPT_CONFIG_VAR,
    STAGECRYPT_ENVIRONMENTS_VAR,
};
use std::path::PathBuf;
use std::time::Duration;

/// Flags shared by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Config file
    #[arg(short = 'c', long, global = true, env = STAGECRYPT_CONFIG_VAR, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Environment catalog mapping environments to accounts and profiles
    #[arg(long, global = true, env = STAGECRYPT_ENVIRONMENTS_VAR, default_value = DEFAULT_ENVIRONMENTS_FILE)]
    pub environments: PathBuf,

    /// AWS region (overrides the catalog and the ambient AWS config)
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// AWS credentials profile (overrides the catalog)
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Endpoint override for every AWS service client
    #[arg(long, global = true)]
    pub endpoint_url: Option<String>,

    /// Timeout for a single AWS operation, in seconds
    #[arg(long, global = true, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Connection timeout, in seconds
    #[arg(long, global = true, default_value_t = 5)]
    pub connect_timeout_secs: u64,

    /// Attempts per AWS call, 1 disables retries
    #[arg(long, global = true, default_value_t = 3)]
    pub max_attempts: u32,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Everything a command needs besides its own arguments
pub struct Context {
    pub config_path: PathBuf,
    pub catalog: EnvironmentCatalog,
    service: ServiceConfig,
}

impl Context {
    pub fn from_args(args: &GlobalArgs) -> Result<Self> {
        let catalog = EnvironmentCatalog::load(&args.environments)?;
        let service = ServiceConfig {
            region: args.region.clone(),
            profile: args.profile.clone(),
            endpoint_url: args.endpoint_url.clone(),
            operation_timeout: Duration::from_secs(args.timeout_secs),
            connect_timeout: Duration::from_secs(args.connect_timeout_secs),
            max_attempts: args.max_attempts,
        };

        Ok(Self {
            config_path: args.config.clone(),
            catalog,
            service,
        })
    }

    /// AWS clients are built lazily, so this never touches the network
    pub fn provider(&self) -> Result<AwsProvider> {
        AwsProvider::new(self.service.clone(), self.catalog.clone())
    }

    pub fn load_document(&self) -> Result<(ConfigDocument, StageRegistry)> {
        let document = ConfigDocument::load(&self.config_path)?;
        let registry = document.registry()?;
        Ok((document, registry))
    }
}
