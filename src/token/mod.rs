pub mod claims;
pub mod store;
