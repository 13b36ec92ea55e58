// ============================================================================
// Request Commands
// ============================================================================
//
// Commands whose effect is decided by a remote authority. They execute
// locally first (optimistic) and produce requests for the server; the
// server's answer then replaces the local guess of what undo must restore.
//
// Request shapes:
//   execute -> the intent
//   redo    -> the intent, refined with confirmed values once known
//   undo    -> None until the server reported what it replaced
//
// ============================================================================

pub mod cells;
pub mod compound;

pub use cells::{DeleteCellsRequestCommand, SetCellsRequestCommand};
pub use compound::CompoundRequestCommand;

use crate::command::Command;
use crate::core::{CommandError, ItemId, Result};
use crate::wire::ServerRequest;
use serde_json::Value as JsonValue;
use tracing::{Level, event};

pub trait RequestCommand: Command {
    /// Sheet the requests are addressed to.
    fn streamsheet_id(&self) -> ItemId;

    fn get_execute_request(&self) -> Result<ServerRequest>;

    fn get_redo_request(&self) -> Result<ServerRequest>;

    /// `None` while the server has not reported the state it replaced.
    fn get_undo_request(&self) -> Result<Option<ServerRequest>>;

    /// Fails if `result` cannot be merged by `handle_result`. Settles nothing.
    fn check_result(&self, result: &JsonValue) -> Result<()>;

    /// Merges the server's answer to the execute request.
    ///
    /// Only the first successful result is kept. Returns `true` if this call
    /// settled anything.
    fn handle_result(&mut self, result: &JsonValue) -> Result<bool>;

    /// Terminal for this command instance. Local state stays as it is.
    fn handle_error(&mut self, error: &CommandError) {
        event!(
            Level::WARN,
            command = %self.kind(),
            sheet = %self.streamsheet_id(),
            error = %error,
            "server request failed, keeping optimistic local state"
        );
    }

    fn is_reconciled(&self) -> bool;
}

/// Value filled in once by the server and never overwritten afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled<T>(Option<T>);

impl<T> Default for Reconciled<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T> Reconciled<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_option(value: Option<T>) -> Self {
        Self(value)
    }

    /// Stores `value` unless a value is already present. Returns whether it
    /// was stored.
    pub fn settle(&mut self, value: T) -> bool {
        if self.0.is_some() {
            return false;
        }
        self.0 = Some(value);
        true
    }

    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    pub fn is_settled(&self) -> bool {
        self.0.is_some()
    }
}

/// Applies the outcome of one server round trip to its command.
pub fn reconcile(command: &mut dyn RequestCommand, outcome: Result<JsonValue>) -> Result<bool> {
    match outcome {
        Ok(result) => command.handle_result(&result),
        Err(err) => {
            command.handle_error(&err);
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconciled_first_write_wins() {
        let mut value = Reconciled::new();
        assert!(!value.is_settled());
        assert!(value.settle(1));
        assert!(!value.settle(2));
        assert_eq!(value.get(), Some(&1));
    }
}
