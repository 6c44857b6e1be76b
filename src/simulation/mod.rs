pub mod catalog_generator;

pub use catalog_generator::{generate_random_catalog, CatalogConfig, GeneratedCatalog};
