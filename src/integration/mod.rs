//! External collaborator capabilities.
//!
//! - Capability traits the engine consumes (value transfer, backed asset,
//!   receipt token)
//! - In-memory reference implementations with failure injection

pub mod capabilities;
pub mod memory;

pub use capabilities::*;
pub use memory::*;
