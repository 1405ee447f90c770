//! Storage module for persistent data management.
//!
//! ## Backends
//!
//! - **InMemoryStore**: ephemeral storage for testing
//! - **FileStore**: JSON file persistence for the local deployment
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tierstake::storage::{FileStore, StateStore};
//!
//! let store = StateStore::new(FileStore::open("/path/to/data")?);
//! store.save_engine(&engine.snapshot()?, now)?;
//! ```

pub mod backend;
pub mod state;

pub use backend::*;
pub use state::*;
