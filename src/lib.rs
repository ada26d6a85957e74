pub mod config;
pub mod error;
pub mod metadata;
pub mod notify;
pub mod platform;
pub mod template;
pub mod terraform;
