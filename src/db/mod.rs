pub mod connection;
pub mod execution_repository;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod store;
#[cfg(test)]
pub mod testing;

pub use execution_repository::ExecutionRepository;
pub use memory::MemoryStore;
pub use store::{ExecutionStore, JobStats};
