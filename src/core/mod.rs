//! Core ledgers for the tierstake engine.
//!
//! This module contains the fundamental building blocks:
//! - Configuration and administrable parameters
//! - Tier policy table
//! - Position ledger (one open stake per owner)
//! - Treasury ledger (pooled custody, fees, yield)

pub mod config;
pub mod position;
pub mod tier;
pub mod treasury;

pub use config::*;
pub use position::*;
pub use tier::*;
pub use treasury::*;
