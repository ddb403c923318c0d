//! Repository collaborators for users, photoshoots, photos and comments

pub mod guard;
pub mod memory;
pub mod seed;
pub mod traits;

pub use memory::{create_memory_storage, MemoryStorageProvider};
pub use seed::seed_demo_data;
pub use traits::*;
