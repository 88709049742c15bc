//! Repository layer
//!
//! Repositories persist job status records. They provide a small,
//! focused interface (write, read, ping) without any lifecycle logic;
//! the scheduler decides what to write and when.
//!
//! All repositories are trait-based so the server can run against Redis in
//! production and against process memory in tests.

mod memory;
mod redis;
mod status;

// Re-export traits
pub use status::{StatusRepository, StoreError};

// Re-export implementations
pub use self::memory::InMemoryStatusRepository;
pub use self::redis::RedisStatusRepository;
