//! Recommended imports grouped by the side of the wire they are used on.
//!
//! `client` is what an editing host needs to build, run and undo commands.
//! `server` is what an authority needs to re-execute requests.

pub mod client {
    //! Building, executing, undoing and reconciling commands.
    pub use crate::command::{
        AddItemCommand, AttachEdgeCommand, Command, CommandBase, CompoundCommand,
        DeleteCellsCommand, DeleteItemCommand, DeletePortCommand, DetachEdgeCommand,
        SetAttributeCommand, SetCellCommand, SetCellsCommand,
    };
    pub use crate::core::{CellRef, CellValue, CommandError, ItemId, Result};
    pub use crate::graph::{CellSnapshot, EdgeEnd, Graph, SelectionModel, Viewer};
    pub use crate::history::CommandStack;
    pub use crate::registry::CommandFactory;
    pub use crate::request::{
        CompoundRequestCommand, DeleteCellsRequestCommand, RequestCommand, SetCellsRequestCommand,
    };
    pub use crate::transport::{HttpTransport, RequestDispatcher};
}

pub mod server {
    //! Re-executing requests against the authoritative document.
    pub use crate::server::CellAuthority;
    pub use crate::server::web::{SharedAuthority, router};
    pub use crate::wire::ServerRequest;
}
