//! Persistence abstraction. Every mutating operation is a single atomic
//! conditional read-modify-write whose predicate carries the full
//! precondition; there are no advisory locks anywhere in the system.

/// Game state storage and retrieval operations.
pub mod game_store;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
