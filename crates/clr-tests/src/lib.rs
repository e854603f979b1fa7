//! Scenario and property test suite for CLR matching.
//!
//! Integration tests drive the engine end to end through its public API and
//! check the allocation invariants under randomized rounds.

pub mod helpers;
