pub mod error;
pub mod properties;
pub mod target;
pub mod value;
