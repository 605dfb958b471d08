use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::credentials::ClientContext;
use super::invoker::classify_failure;
use super::transport::{VendorRequest, VendorTransport};
use crate::config::PollConfig;
use crate::error::OperationError;
use crate::models::{Operation, OperationStatus};

/// What a single poll reply says about the operation.
#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    Pending,
    Completed(Value),
    Failed(String),
}

/// Reads one operation body. A body that does not parse as an operation is
/// treated as still pending.
pub fn evaluate(body: &Value) -> PollState {
    let status: OperationStatus = serde_json::from_value(body.clone()).unwrap_or_default();
    if !status.done {
        return PollState::Pending;
    }
    match status.error {
        Some(fault) => PollState::Failed(fault.describe()),
        None => PollState::Completed(body.clone()),
    }
}

/// Drives a long-running operation to a terminal state.
#[derive(Clone)]
pub struct OperationPoller {
    transport: Arc<dyn VendorTransport>,
    config: PollConfig,
}

impl OperationPoller {
    pub fn new(transport: Arc<dyn VendorTransport>, config: PollConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Polls at a fixed interval until the operation is done, fails, the
    /// attempt budget runs out or `cancel` fires. Never issues more than
    /// `max_attempts` polls, and none after cancellation.
    pub async fn run(
        &self,
        operation: &Operation,
        ctx: &ClientContext,
        cancel: &CancellationToken,
    ) -> Result<Value, OperationError> {
        for attempt in 1..=self.config.max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(operation, attempt - 1)),
                _ = tokio::time::sleep(self.config.interval) => {}
            }

            let request = VendorRequest::get(&operation.poll_endpoint, ctx.credential.clone());
            let reply = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(operation, attempt - 1)),
                reply = self.transport.send(request) => reply?,
            };
            if !reply.is_success() {
                log::error!(
                    "Polling {} failed on attempt {} with status {}",
                    operation.operation_name,
                    attempt,
                    reply.status
                );
                return Err(classify_failure(&operation.model, &reply).into());
            }

            match evaluate(&reply.body) {
                PollState::Pending => {
                    log::debug!(
                        "Operation {} still running (attempt {}/{})",
                        operation.operation_name,
                        attempt,
                        self.config.max_attempts
                    );
                }
                PollState::Completed(body) => {
                    log::info!(
                        "Operation {} completed after {} polls",
                        operation.operation_name,
                        attempt
                    );
                    return Ok(body);
                }
                PollState::Failed(reason) => {
                    log::error!("Operation {} failed: {}", operation.operation_name, reason);
                    return Err(OperationError::Failed(reason));
                }
            }
        }

        log::warn!(
            "Operation {} still processing after {} polls",
            operation.operation_name,
            self.config.max_attempts
        );
        Err(OperationError::TimedOut {
            operation: operation.operation_name.clone(),
            attempts: self.config.max_attempts,
        })
    }

    fn cancelled(&self, operation: &Operation, polls: u32) -> OperationError {
        log::info!(
            "Polling of {} cancelled after {} polls",
            operation.operation_name,
            polls
        );
        OperationError::Cancelled
    }
}
