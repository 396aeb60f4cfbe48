//! Core discovery and ranking logic for pulse.

pub mod services;

pub use services::*;
