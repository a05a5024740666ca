//! Command implementations for the Pluvio CLI.

pub mod register;
pub mod run;
pub mod runs;
pub mod serve;
