include!(concat!(env!("OUT_DIR"), "/translations.rs"));

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;

pub use crate::core::memory_storage::MemoryStorage;
pub use crate::core::resolver::Resolver;
pub use crate::core::storage::{FileStorage, Storage};
pub use crate::core::validator::Validator;
