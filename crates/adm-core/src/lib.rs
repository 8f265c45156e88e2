pub mod config;
pub mod logging;

pub mod batch;
pub mod checksum;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod hash_cache;
pub mod manifest;
pub mod resource;
