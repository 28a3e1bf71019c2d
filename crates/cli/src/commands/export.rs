use crate::context::Context;
use stagecrypt_config::{ConfigDocument, DocumentFormat};
use stagecrypt_core::Result;
use stagecrypt_crypto::CryptoGateway;

pub fn execute(context: &Context, json: bool) -> Result<()> {
    print!("{}", export_text(context, json)?);
    Ok(())
}

/// The config file in open form, or a starting template when there is no
/// config file yet.
pub fn export_text(context: &Context, json: bool) -> Result<String> {
    let format = if json {
        DocumentFormat::Json
    } else {
        DocumentFormat::Yaml
    };

    if !context.config_path.exists() {
        tracing::info!(
            path = %context.config_path.display(),
            "No config file found, exporting a template"
        );
        return context.catalog.template().render(format);
    }

    let (closed, registry) = context.load_document()?;
    let provider = context.provider()?;
    let gateway = CryptoGateway::new(&registry, &provider);

    let open = ConfigDocument {
        config: stagecrypt_engine::open(&closed.config, &gateway)?,
        stages: closed.stages,
    };
    open.render(format)
}
