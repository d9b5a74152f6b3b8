pub mod encode;
pub mod render;
