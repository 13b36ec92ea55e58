pub mod error;
pub mod types;
pub mod value;

pub use error::{CommandError, Result};
pub use types::{CellRef, ItemId};
pub use value::CellValue;
