use crate::context::Context;
use stagecrypt_config::{ConfigDocument, DocumentFormat};
use stagecrypt_core::{Error, Result};
use stagecrypt_crypto::CryptoGateway;
use std::io::Read;

pub fn execute(context: &Context) -> Result<()> {
    let mut source = String::new();
    std::io::stdin()
        .read_to_string(&mut source)
        .map_err(|e| Error::file_system("<stdin>", "read", e))?;
    import_text(context, &source)
}

/// Close an open-form document and write it to the config file.
///
/// Nothing is written unless every secret was encrypted.
pub fn import_text(context: &Context, source: &str) -> Result<()> {
    let open = ConfigDocument::parse(source.trim())?;
    let registry = open.registry()?;
    let provider = context.provider()?;
    let gateway = CryptoGateway::new(&registry, &provider);

    let closed = ConfigDocument {
        config: stagecrypt_engine::close(&open.config, &gateway)?,
        stages: open.stages,
    };

    let text = closed.render(DocumentFormat::Yaml)?;
    stagecrypt_utils::write_atomic_string(&context.config_path, &text)?;
    tracing::info!(path = %context.config_path.display(), "Wrote config file");
    Ok(())
}
