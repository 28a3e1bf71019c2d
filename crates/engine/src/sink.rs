//! Parameter store sink.
//!
//! Every leaf of a resolved config becomes one secret-typed parameter named
//! `prefix + path`. Names and values are validated up front so that a bad
//! document writes nothing. Writes themselves are not transactional: a
//! failed write is recorded and the remaining leaves are still attempted.

use crate::resolved::ResolvedConfig;
use regex::Regex;
use stagecrypt_config::Scalar;
use stagecrypt_core::{
    Error, Result, SinkFailure, MAX_PARAMETER_HIERARCHY, PARAMETER_NAME_PATTERN,
};
use stagecrypt_crypto::{CryptoGateway, ParameterStoreProvider};

/// A validated parameter ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedParameter {
    pub name: String,
    pub value: String,
}

/// Outcome of a successful sink run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkReport {
    pub account_id: String,
    pub key_id: Option<String>,
    pub written: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ParameterStoreSink {
    prefix: String,
    sink_key: Option<String>,
}

impl ParameterStoreSink {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            sink_key: None,
        }
    }

    /// Encrypt parameters with this key instead of the store's default
    #[must_use]
    pub fn with_sink_key(mut self, key: Option<String>) -> Self {
        self.sink_key = key;
        self
    }

    /// Validate every parameter name and value without writing anything
    pub fn plan(&self, resolved: &ResolvedConfig) -> Result<Vec<PlannedParameter>> {
        let pattern = Regex::new(PARAMETER_NAME_PATTERN)
            .map_err(|e| Error::configuration(format!("invalid parameter name pattern: {e}")))?;

        if !self.prefix.starts_with('/') {
            return Err(Error::validation(
                &self.prefix,
                "parameter store names must be fully qualified (start with a slash)",
            ));
        }
        validate_name(&pattern, &self.prefix)?;

        resolved
            .leaves()
            .into_iter()
            .map(|(path, scalar)| {
                let name = path.to_parameter_name(&self.prefix);
                validate_name(&pattern, &name)?;
                let value = match scalar {
                    Scalar::Null => {
                        return Err(Error::validation(
                            &name,
                            "null values cannot be stored in the parameter store",
                        ))
                    }
                    other => other.to_string(),
                };
                Ok(PlannedParameter { name, value })
            })
            .collect()
    }

    /// Validate, then write every leaf through the store of `key_stage`'s
    /// environment.
    pub fn write(
        &self,
        resolved: &ResolvedConfig,
        gateway: &CryptoGateway<'_>,
        stores: &dyn ParameterStoreProvider,
        key_stage: &str,
    ) -> Result<SinkReport> {
        let plan = self.plan(resolved)?;

        let environment = gateway.registry().environment(key_stage)?;
        let store = stores.parameter_store(environment)?;
        let account_id = store.account_id()?;
        tracing::info!(
            prefix = %self.prefix,
            account = %account_id,
            parameters = plan.len(),
            "Writing config to parameter store"
        );

        let key_id = self
            .sink_key
            .as_deref()
            .map(|key| gateway.describe_key(key, key_stage))
            .transpose()?;

        let mut written = Vec::with_capacity(plan.len());
        let mut failures = Vec::new();
        for parameter in plan {
            tracing::info!(name = %parameter.name, "Writing parameter");
            match store.put_secret(&parameter.name, &parameter.value, key_id.as_deref()) {
                Ok(()) => written.push(parameter.name),
                Err(e) => {
                    tracing::warn!(name = %parameter.name, error = %e, "Parameter write failed");
                    failures.push(SinkFailure {
                        name: parameter.name,
                        message: e.to_string(),
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(SinkReport {
                account_id,
                key_id,
                written,
            })
        } else {
            Err(Error::SinkWrite {
                failures,
                written: written.len(),
            })
        }
    }
}

fn validate_name(pattern: &Regex, name: &str) -> Result<()> {
    if name.matches('/').count() > MAX_PARAMETER_HIERARCHY {
        return Err(Error::validation(
            name,
            format!(
                "parameter store names allow for no more than {MAX_PARAMETER_HIERARCHY} levels of hierarchy"
            ),
        ));
    }
    if !pattern.is_match(name) {
        return Err(Error::validation(
            name,
            "parameter store names may consist of only letters, digits and the symbols _.-/",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::resolve;
    use stagecrypt_config::{ConfigDocument, ConfigTree};
    use stagecrypt_crypto::testing::{LocalKeyService, LocalProvider, RecordingParameterStore};

    const STAGES: &str = "stages:\n  prod:\n    environment: prod-env\n    key: prod-key\n";

    fn run<F>(config: &str, sink: ParameterStoreSink, check: F)
    where
        F: FnOnce(Result<SinkReport>, &LocalProvider),
    {
        let doc = ConfigDocument::parse(&format!("{STAGES}config:\n{config}")).unwrap();
        let registry = doc.registry().unwrap();
        let provider = LocalProvider::new();
        let gateway = CryptoGateway::new(&registry, &provider);
        let resolved = resolve(&doc.config, "prod", &gateway).unwrap();
        let result = sink.write(&resolved, &gateway, &provider, "prod");
        check(result, &provider);
    }

    #[test]
    fn test_nested_leaf_becomes_one_parameter() {
        run("  nested:\n    inner: x\n", ParameterStoreSink::new("/svc/id"), |result, provider| {
            let report = result.unwrap();
            assert_eq!(report.account_id, RecordingParameterStore::ACCOUNT_ID);
            assert_eq!(report.written, ["/svc/id/nested/inner"]);

            let writes = provider.parameter_store.writes();
            assert_eq!(writes.len(), 1);
            assert_eq!(writes[0].name, "/svc/id/nested/inner");
            assert_eq!(writes[0].value, "x");
            assert_eq!(writes[0].key_id, None);
            assert_eq!(provider.requested_environments(), ["prod-env"]);
        });
    }

    #[test]
    fn test_scalars_are_stringified_and_lists_indexed() {
        run(
            "  port: 8080\n  debug: true\n  hosts: [a, b]\n",
            ParameterStoreSink::new("/app/"),
            |result, provider| {
                result.unwrap();
                let writes: Vec<_> = provider
                    .parameter_store
                    .writes()
                    .into_iter()
                    .map(|w| (w.name, w.value))
                    .collect();
                assert_eq!(
                    writes,
                    [
                        ("/app/port".to_string(), "8080".to_string()),
                        ("/app/debug".to_string(), "true".to_string()),
                        ("/app/hosts/0".to_string(), "a".to_string()),
                        ("/app/hosts/1".to_string(), "b".to_string()),
                    ]
                );
            },
        );
    }

    #[test]
    fn test_sink_key_is_resolved_once() {
        let sink = ParameterStoreSink::new("/svc").with_sink_key(Some("ssm-key".to_string()));
        run("  a: 1\n  b: 2\n", sink, |result, provider| {
            let report = result.unwrap();
            let expected = LocalKeyService::key_id_for("alias/ssm-key");
            assert_eq!(report.key_id.as_deref(), Some(expected.as_str()));
            assert!(provider
                .parameter_store
                .writes()
                .iter()
                .all(|w| w.key_id.as_deref() == Some(expected.as_str())));
        });
    }

    #[test]
    fn test_validation_happens_before_any_write() {
        let cases = [
            ("  a: x\n", "svc"),
            ("  bad key: x\n", "/svc"),
            ("  a: ~\n  b: x\n", "/svc"),
            ("  b: x\n", "/1/2/3/4/5/6/7/8/9/10/11/12/13/14/15"),
        ];
        for (config, prefix) in cases {
            run(config, ParameterStoreSink::new(prefix), |result, provider| {
                let err = result.unwrap_err();
                assert!(matches!(err, Error::Validation { .. }), "{err}");
                assert!(provider.parameter_store.writes().is_empty());
            });
        }
    }

    #[test]
    fn test_failed_writes_are_collected() {
        let doc = ConfigDocument::parse(&format!("{STAGES}config:\n  a: 1\n  b: 2\n  c: 3\n"))
            .unwrap();
        let registry = doc.registry().unwrap();
        let provider = LocalProvider::new();
        provider.parameter_store.fail_on("/svc/b");
        let gateway = CryptoGateway::new(&registry, &provider);
        let resolved = resolve(&doc.config, "prod", &gateway).unwrap();

        let err = ParameterStoreSink::new("/svc")
            .write(&resolved, &gateway, &provider, "prod")
            .unwrap_err();
        match err {
            Error::SinkWrite { failures, written } => {
                assert_eq!(written, 2);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].name, "/svc/b");
            }
            other => panic!("unexpected error: {other}"),
        }
        // no rollback of earlier writes, later leaves still attempted
        let names: Vec<_> = provider
            .parameter_store
            .writes()
            .into_iter()
            .map(|w| w.name)
            .collect();
        assert_eq!(names, ["/svc/a", "/svc/c"]);
    }

    #[test]
    fn test_empty_config_writes_nothing() {
        let resolved = ResolvedConfig::new("prod", ConfigTree::empty_mapping());
        let plan = ParameterStoreSink::new("/svc").plan(&resolved).unwrap();
        assert!(plan.is_empty());
    }
}
