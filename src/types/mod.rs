pub mod geo;
pub mod pin;
pub(crate) mod request;
pub mod response;
