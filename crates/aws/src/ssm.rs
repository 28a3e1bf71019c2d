use crate::runtime::BlockingRuntime;
use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::types::ParameterType;
use stagecrypt_core::{Error, Result};
use stagecrypt_crypto::ParameterStore;

/// SSM parameter store plus the STS client used to name its account
#[derive(Debug, Clone)]
pub struct SsmParameterStore {
    ssm: aws_sdk_ssm::Client,
    sts: aws_sdk_sts::Client,
    runtime: BlockingRuntime,
}

impl SsmParameterStore {
    #[must_use]
    pub fn new(
        ssm: aws_sdk_ssm::Client,
        sts: aws_sdk_sts::Client,
        runtime: BlockingRuntime,
    ) -> Self {
        Self { ssm, sts, runtime }
    }
}

impl ParameterStore for SsmParameterStore {
    fn put_secret(&self, name: &str, value: &str, key_id: Option<&str>) -> Result<()> {
        self.runtime
            .block_on(
                self.ssm
                    .put_parameter()
                    .name(name)
                    .value(value)
                    .r#type(ParameterType::SecureString)
                    .overwrite(true)
                    .set_key_id(key_id.map(str::to_string))
                    .send(),
            )?
            .map_err(|e| Error::parameter_store("put", DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    fn account_id(&self) -> Result<String> {
        let identity = self
            .runtime
            .block_on(self.sts.get_caller_identity().send())?
            .map_err(|e| {
                Error::parameter_store(
                    "account lookup",
                    aws_sdk_sts::error::DisplayErrorContext(&e).to_string(),
                )
            })?;
        identity
            .account()
            .map(str::to_string)
            .ok_or_else(|| Error::parameter_store("account lookup", "STS returned no account"))
    }
}
