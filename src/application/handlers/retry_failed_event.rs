//! RetryFailedEventHandler - Manual reconciliation for frozen events.

use std::sync::Arc;

use crate::application::durable_buffer::DurableBuffer;
use crate::domain::foundation::{DomainError, ErrorCode};

#[derive(Debug, Clone)]
pub struct RetryFailedEventCommand {
    pub event_id: String,
}

pub struct RetryFailedEventHandler {
    buffer: Arc<DurableBuffer>,
}

impl RetryFailedEventHandler {
    pub fn new(buffer: Arc<DurableBuffer>) -> Self {
        Self { buffer }
    }

    /// Puts a failed event back in line with a fresh retry budget.
    pub async fn handle(&self, cmd: RetryFailedEventCommand) -> Result<(), DomainError> {
        if self.buffer.requeue_failed(&cmd.event_id).await {
            Ok(())
        } else {
            Err(DomainError::new(
                ErrorCode::BufferedEventNotFound,
                format!("No failed event with id {}", cmd.event_id),
            ))
        }
    }
}
