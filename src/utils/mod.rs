//! Utility modules for the tierstake engine.
//!
//! This module contains shared utilities used across the engine:
//! - Hashes and account addresses
//! - Fixed-point arithmetic
//! - Clock capability
//! - Constants

pub mod constants;
pub mod crypto;
pub mod math;
pub mod time;

pub use constants::*;
pub use crypto::*;
pub use math::*;
pub use time::*;
