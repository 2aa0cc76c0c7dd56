//! Core infrastructure: configuration, errors, hour-aligned time helpers.

pub mod config;
pub mod errors;
pub mod time;
