//! # clr-core
//! Foundation types, parameters and collaborator traits for CLR matching.

pub mod cancellation;
pub mod constants;
pub mod error;
pub mod params;
pub mod traits;
pub mod types;
