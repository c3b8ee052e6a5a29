//! Function execution with a chosen startup mode

use crate::error::PrewarmError;
use crate::models::{Execution, ExecutionMode};
use crate::pool::DEFAULT_INIT_TIMEOUT;
use crate::runtime::ContainerRuntime;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Runs functions through a container runtime and times them
#[derive(Clone)]
pub struct FunctionExecutor {
    runtime: Arc<dyn ContainerRuntime>,
    init_timeout: Duration,
}

impl FunctionExecutor {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            init_timeout: DEFAULT_INIT_TIMEOUT,
        }
    }

    /// Bound the COLD-mode initialization
    pub fn with_init_timeout(mut self, init_timeout: Duration) -> Self {
        self.init_timeout = init_timeout;
        self
    }

    /// Execute the function body, initializing a container first in COLD mode.
    ///
    /// A COLD execution runs in a one-shot container that is released once
    /// the body returns. Errors go straight back to the caller, which decides
    /// whether to retry.
    pub async fn execute(
        &self,
        function_id: &str,
        input: Value,
        mode: ExecutionMode,
    ) -> Result<Execution, PrewarmError> {
        let start = Instant::now();

        if mode == ExecutionMode::Cold {
            self.initialize(function_id).await?;
        }

        let output = self.runtime.invoke(function_id, input).await;

        if mode == ExecutionMode::Cold {
            if let Err(e) = self.runtime.release(function_id).await {
                warn!(function_id = %function_id, error = %e, "Failed to release one-shot container");
            }
        }

        let output = output.map_err(|source| PrewarmError::ExecutionFailed {
            function_id: function_id.to_string(),
            source,
        })?;

        let elapsed = start.elapsed();
        debug!(
            function_id = %function_id,
            mode = %mode,
            elapsed_ms = elapsed.as_millis() as u64,
            "Execution finished"
        );

        Ok(Execution {
            output,
            elapsed,
            mode,
        })
    }

    async fn initialize(&self, function_id: &str) -> Result<(), PrewarmError> {
        match tokio::time::timeout(self.init_timeout, self.runtime.initialize(function_id)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(PrewarmError::InitializationFailed {
                function_id: function_id.to_string(),
                source,
            }),
            Err(_) => Err(PrewarmError::InitializationTimeout {
                function_id: function_id.to_string(),
                timeout: self.init_timeout,
            }),
        }
    }
}
