pub mod severity;
pub mod sanitize;
pub mod errors;
pub mod record;
pub mod stream;
pub mod logger;
pub mod subscribe;
pub mod paths;
pub mod events;
pub mod translate;
pub mod config;
pub mod adapter;
pub mod env;

#[cfg(feature = "bridge")]
pub mod bridge;
