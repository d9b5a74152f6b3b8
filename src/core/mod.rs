pub mod client;
pub mod clock;
pub(crate) mod config;
pub mod error;
