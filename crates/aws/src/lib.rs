//! AWS adapters for stagecrypt
//!
//! [`AwsProvider`] implements the key service and parameter store provider
//! traits with KMS, SSM and STS clients. All calls are blocking from the
//! caller's point of view; a current-thread Tokio runtime drives the SDK.

pub mod config;
pub mod kms;
pub mod provider;
pub mod runtime;
pub mod ssm;

pub use config::ServiceConfig;
pub use kms::KmsKeyService;
pub use provider::AwsProvider;
pub use runtime::BlockingRuntime;
pub use ssm::SsmParameterStore;
