//! Rally synchronization: schedule marches of different lengths so they land
//! together, then drive the departures live.

pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod logging;
pub mod parser;
pub mod roster;
pub mod schedule;
pub mod timeline;
pub mod web;

pub use config::EngineConfig;
pub use error::{ExitCode, RallyError};
