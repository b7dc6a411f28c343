// src/core/mod.rs

pub mod dotenv;
pub mod entity_manager;
pub mod index_manager;
pub mod memory_storage;
pub mod paths;
pub mod query;
pub mod resolver;
pub mod runner;
pub mod settings;
pub mod storage;
pub mod validator;
