// src/lib.rs
#[macro_use]
pub mod macros;

pub mod config;
pub mod core;
pub mod csv;
pub mod error;
pub mod logging;
pub mod progress;
pub mod record;
pub mod snapshot;
pub mod store;

pub mod crawler;
pub mod diff;
pub mod merge;
pub mod report;
pub mod source;

pub mod gui;

#[cfg(feature = "cli")]
pub mod cli;
