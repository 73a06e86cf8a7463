//! Core of a chat-hosted mafia game: stage machinery, role dealing, voting,
//! meta-polls, and the storage protocol that keeps concurrent actions
//! consistent without in-process locks.

/// Runtime configuration loading.
pub mod config;
/// Persistence layer: document model and store backends.
pub mod dao;
/// Service-level error taxonomy.
pub mod error;
/// Pure game rules.
pub mod game;
/// Effectful orchestration services.
pub mod services;
/// Outbound interfaces: chat delivery and stats.
pub mod transport;
