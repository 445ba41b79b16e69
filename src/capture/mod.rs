// Capture domain: window lookup and bitmap acquisition.

pub mod backend;
pub mod commands;
pub mod dummy;
pub mod error;
pub mod platform;
pub mod types;
