//! Per-environment AWS client construction.

use crate::config::ServiceConfig;
use crate::kms::KmsKeyService;
use crate::runtime::BlockingRuntime;
use crate::ssm::SsmParameterStore;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use parking_lot::Mutex;
use stagecrypt_config::EnvironmentCatalog;
use stagecrypt_core::Result;
use stagecrypt_crypto::{KeyService, KeyServiceProvider, ParameterStore, ParameterStoreProvider};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds KMS, SSM and STS clients on demand, one SDK config per environment.
///
/// Nothing touches the network until the first client is used, so commands
/// that never encrypt or decrypt work without credentials.
#[derive(Debug)]
pub struct AwsProvider {
    runtime: BlockingRuntime,
    config: ServiceConfig,
    catalog: EnvironmentCatalog,
    sdk_configs: Mutex<HashMap<String, SdkConfig>>,
}

impl AwsProvider {
    pub fn new(config: ServiceConfig, catalog: EnvironmentCatalog) -> Result<Self> {
        Ok(Self {
            runtime: BlockingRuntime::new()?,
            config,
            catalog,
            sdk_configs: Mutex::new(HashMap::new()),
        })
    }

    fn sdk_config(&self, environment: &str) -> Result<SdkConfig> {
        if let Some(sdk_config) = self.sdk_configs.lock().get(environment) {
            return Ok(sdk_config.clone());
        }

        let entry = self.catalog.lookup(environment)?;
        let config = self.config.for_environment(entry);
        tracing::debug!(
            environment = %environment,
            region = ?config.region,
            profile = ?config.profile,
            "Loading AWS configuration"
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(config.operation_timeout)
                    .connect_timeout(config.connect_timeout)
                    .build(),
            )
            .retry_config(RetryConfig::standard().with_max_attempts(config.max_attempts));
        if let Some(region) = config.region {
            loader = loader.region(Region::new(region));
        }
        if let Some(profile) = config.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(endpoint_url) = config.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }

        let sdk_config = self.runtime.block_on(loader.load())?;
        self.sdk_configs
            .lock()
            .insert(environment.to_string(), sdk_config.clone());
        Ok(sdk_config)
    }
}

impl KeyServiceProvider for AwsProvider {
    fn key_service(&self, environment: &str) -> Result<Arc<dyn KeyService>> {
        let sdk_config = self.sdk_config(environment)?;
        Ok(Arc::new(KmsKeyService::new(
            aws_sdk_kms::Client::new(&sdk_config),
            self.runtime.clone(),
        )))
    }
}

impl ParameterStoreProvider for AwsProvider {
    fn parameter_store(&self, environment: &str) -> Result<Arc<dyn ParameterStore>> {
        let sdk_config = self.sdk_config(environment)?;
        Ok(Arc::new(SsmParameterStore::new(
            aws_sdk_ssm::Client::new(&sdk_config),
            aws_sdk_sts::Client::new(&sdk_config),
            self.runtime.clone(),
        )))
    }
}
