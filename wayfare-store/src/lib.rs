pub mod app_config;
pub mod events;
pub mod memory;

pub use events::NotificationHub;
pub use memory::{in_memory_collections, MemoryStore};
