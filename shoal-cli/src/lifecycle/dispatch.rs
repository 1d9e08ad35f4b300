use std::io::Write;

use futures_util::{Stream, StreamExt};
use tracing::debug;

use shoal_core::engine::EngineError;
use shoal_core::model::{LifecycleOp, StatusEvent};
use shoal_core::{LifecycleError, Result};

use super::board::{Board, Transition};
use super::errors::{ErrorLog, ErrorRecord};

/// Consume an engine stream, applying events one at a time in arrival order.
///
/// A failing service is recorded in `errors` and the batch continues. A
/// failing stream aborts with [`LifecycleError::Operation`]; the board is left
/// as it is and closing it is up to the caller.
pub async fn drive<S, W>(
    op: LifecycleOp,
    mut events: S,
    board: &mut Board<'_, W>,
    errors: &mut ErrorLog,
) -> Result<()>
where
    S: Stream<Item = std::result::Result<StatusEvent, EngineError>> + Unpin,
    W: Write,
{
    while let Some(item) = events.next().await {
        let event = item.map_err(|source| LifecycleError::operation(op.failure_context(), source))?;
        debug!(service = %event.service, finished = event.finished, payload = ?event.payload, "status event");

        if let Transition::Failed { message } = board.apply(&event)? {
            errors.record(ErrorRecord {
                service: event.service,
                message,
            });
        }
    }
    Ok(())
}
