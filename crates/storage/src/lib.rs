#![forbid(unsafe_code)]

pub mod json_file;
mod mapping;
pub mod migrate;
pub mod progress_store;
pub mod repository;

pub use json_file::JsonFileRepository;
pub use migrate::{DocumentShape, Upgrade};
pub use progress_store::{CourseDocument, ProgressStore};
pub use repository::{DocumentRepository, InMemoryRepository, Storage, StorageError};
