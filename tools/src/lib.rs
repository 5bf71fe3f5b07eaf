pub mod digest;
pub mod encode;
