use stagecrypt_core::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::{Builder, Handle, Runtime};

/// Current-thread runtime shared by the SDK clients of one command.
///
/// The rest of the tool is synchronous; every SDK call is driven to
/// completion with [`BlockingRuntime::block_on`].
#[derive(Clone)]
pub struct BlockingRuntime {
    runtime: Arc<Runtime>,
}

impl BlockingRuntime {
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::configuration(format!("failed to create tokio runtime: {e}")))?;
        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }

    /// Run a future to completion on this runtime
    pub fn block_on<F>(&self, future: F) -> Result<F::Output>
    where
        F: Future,
    {
        if Handle::try_current().is_ok() {
            return Err(Error::configuration(
                "cannot use block_on from within an async runtime",
            ));
        }
        Ok(self.runtime.block_on(future))
    }
}

impl std::fmt::Debug for BlockingRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingRuntime").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_on_returns_output() {
        let runtime = BlockingRuntime::new().unwrap();
        let value = runtime.block_on(async { 40 + 2 }).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_nested_block_on_is_rejected() {
        let runtime = BlockingRuntime::new().unwrap();
        let inner = runtime.clone();
        let nested = runtime
            .block_on(async move { inner.block_on(async { 1 }).is_err() })
            .unwrap();
        assert!(nested);
    }
}
