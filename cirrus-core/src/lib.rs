pub mod error;
pub mod inventory;
pub mod types;

pub use error::{CirrusError, CirrusResult};
pub use inventory::{ClusterInventory, SimInventory};
pub use types::*;
