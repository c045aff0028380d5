//! Command-line surface: argument definitions and their handlers.

pub mod args;
pub mod commands;
