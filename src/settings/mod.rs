pub mod commands;
pub mod error;
pub mod store;
pub mod types;
