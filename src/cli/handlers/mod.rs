// src/cli/handlers/mod.rs

// One module per top-level command.

pub mod apply;
pub mod commons;
pub mod env;
pub mod project;
pub mod schema;
pub mod sheet;
pub mod stats;
pub mod verify;
