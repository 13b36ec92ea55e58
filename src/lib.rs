// ============================================================================
// sheetcmd Library
// ============================================================================
//
// Command subsystem of a combined spreadsheet / node-graph document:
// reversible, serializable commands, batches of them, a registry chain that
// rebuilds them from the wire, and request commands reconciled against a
// remote authority.
//
// ============================================================================

pub mod command;
pub mod config;
pub mod core;
pub mod graph;
pub mod history;
pub mod prelude;
pub mod registry;
pub mod request;
pub mod server;
pub mod transport;
pub mod wire;

pub use command::{Command, CommandBase, CommandKind, CompoundCommand, Pass};
pub use config::CommandConfig;
pub use crate::core::{CellRef, CellValue, CommandError, ItemId, Result};
pub use graph::{Graph, SelectionModel, Viewer};
pub use history::{CommandStack, LoadReport};
pub use registry::{CommandFactory, CommandRegistry, FactoryContext};
pub use request::{CompoundRequestCommand, Reconciled, RequestCommand};
pub use server::CellAuthority;
pub use transport::{HttpTransport, RequestDispatcher, RequestEnvelope, RequestTransport};
pub use wire::{CommandDescriptor, ServerRequest};
