//! Dogma attribute-effect resolution for ship fits, and a parity harness that
//! checks the engine against an external reference calculator.

pub mod cli;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod fit;
pub mod parallel;
pub mod parity;
