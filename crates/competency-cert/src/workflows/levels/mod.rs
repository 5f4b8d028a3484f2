//! Score tiers: the band resolver and the catalog that configures it.

mod catalog;
mod resolver;

pub use catalog::{CatalogIssue, LevelCatalog, LevelCatalogError};
pub use resolver::{resolve, LevelBand};
