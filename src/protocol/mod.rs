//! Protocol orchestration.
//!
//! - [`engine`]: the redemption engine and its state
//! - [`events`]: append-only event log
//! - [`operations`]: operation results and views

pub mod engine;
pub mod events;
pub mod operations;
mod unwind;

pub use engine::{Collaborators, EngineSnapshot, RedemptionProtocol};
pub use events::*;
pub use operations::*;
