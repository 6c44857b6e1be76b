pub mod definition;
pub mod live_data;
pub mod repository;
pub mod resolver;
