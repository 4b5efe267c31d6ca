#![forbid(unsafe_code)]

pub mod catalog;
pub mod model;

pub use catalog::{CatalogError, InMemoryCatalog, QuestionCatalog, UnitIndex};
