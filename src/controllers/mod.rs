pub mod pins;
pub mod session;
pub mod viewport;
