pub mod identity;
pub mod resource;
pub mod state;

pub use resource::OverrideResource;
pub use state::OverrideState;

// Re-export core types for convenience
pub use cirrus_core::{
    error::{CirrusError, CirrusResult},
    inventory::{ClusterInventory, SimInventory},
    types::DrsBehavior,
};
