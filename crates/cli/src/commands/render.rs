use crate::context::Context;
use stagecrypt_core::Result;
use stagecrypt_crypto::CryptoGateway;
use stagecrypt_engine::{ParameterStoreSink, RenderFormat};

/// Where rendered output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Output(RenderFormat),
    ParameterStore {
        prefix: String,
        sink_key_id: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct RenderArgs {
    pub stage: String,
    /// Stage whose key and environment are used for re-encryption and sinks
    pub key_stage: Option<String>,
    pub target: Target,
    pub chunk_size: usize,
}

/// Pick a format from mutually exclusive flags
pub fn format_from_flags(json: bool, encrypt: bool, bundle: bool, artifact: bool) -> RenderFormat {
    if encrypt {
        RenderFormat::EncryptedJson
    } else if bundle {
        RenderFormat::EncryptedBundle
    } else if artifact {
        RenderFormat::Artifact
    } else if json {
        RenderFormat::Json
    } else {
        RenderFormat::Yaml
    }
}

pub fn execute(context: &Context, args: &RenderArgs) -> Result<()> {
    let (document, registry) = context.load_document()?;
    let provider = context.provider()?;
    let gateway = CryptoGateway::new(&registry, &provider).with_chunk_size(args.chunk_size)?;
    let key_stage = args.key_stage.as_deref().unwrap_or(&args.stage);

    let resolved = stagecrypt_engine::resolve(&document.config, &args.stage, &gateway)?;

    match &args.target {
        Target::Output(format) => {
            let output = stagecrypt_engine::render(&resolved, *format, &gateway, key_stage)?;
            print!("{output}");
        }
        Target::ParameterStore {
            prefix,
            sink_key_id,
        } => {
            let report = ParameterStoreSink::new(prefix.clone())
                .with_sink_key(sink_key_id.clone())
                .write(&resolved, &gateway, &provider, key_stage)?;
            println!(
                "Wrote {} parameter(s) with prefix {prefix} to AWS account {}",
                report.written.len(),
                report.account_id
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_flags() {
        assert_eq!(format_from_flags(false, false, false, false), RenderFormat::Yaml);
        assert_eq!(format_from_flags(true, false, false, false), RenderFormat::Json);
        assert_eq!(
            format_from_flags(false, true, false, false),
            RenderFormat::EncryptedJson
        );
        assert_eq!(
            format_from_flags(false, false, true, false),
            RenderFormat::EncryptedBundle
        );
        assert_eq!(format_from_flags(false, false, false, true), RenderFormat::Artifact);
    }
}
