//! Effectful orchestration on top of the pure rules in [`crate::game`].
//! Handlers are stateless and run concurrently; every cross-actor race is
//! settled by the conditional store operations, never by in-process locks.

/// Card dealing and the pull-based reveal protocol.
pub mod dealer_service;
/// Game lifecycle: start, stop, terminal outcomes.
pub mod game_service;
/// Chat-wide meta-votes (end / skip).
pub mod poll_service;
/// Stage transitions and the deadline sweep.
pub mod scheduler;
/// Day lynch votes, night checks, and the don's order.
pub mod vote_service;

use std::sync::Arc;

use crate::config::GameConfig;
use crate::dao::game_store::GameStore;
use crate::dao::models::GameEntity;
use crate::error::ServiceError;
use crate::game::stage::Stage;
use crate::transport::{ChatTransport, StatsSink};

/// Shared handle to the host services.
pub type SharedHost = Arc<GameHost>;

/// Dependency bundle for the game services: store, transport, stats sink,
/// and configuration. Constructed once at startup and shared.
pub struct GameHost {
    store: Arc<dyn GameStore>,
    transport: Arc<dyn ChatTransport>,
    stats: Arc<dyn StatsSink>,
    config: GameConfig,
}

impl GameHost {
    /// Bundle the injected collaborators into a shared host handle.
    pub fn new(
        store: Arc<dyn GameStore>,
        transport: Arc<dyn ChatTransport>,
        stats: Arc<dyn StatsSink>,
        config: GameConfig,
    ) -> SharedHost {
        Arc::new(Self {
            store,
            transport,
            stats,
            config,
        })
    }

    /// Persistence backend.
    pub fn store(&self) -> &dyn GameStore {
        self.store.as_ref()
    }

    /// Outbound chat message delivery.
    pub fn transport(&self) -> &dyn ChatTransport {
        self.transport.as_ref()
    }

    /// Terminal outcome sink.
    pub fn stats(&self) -> &dyn StatsSink {
        self.stats.as_ref()
    }

    /// Runtime configuration.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }
}

/// Decode the stored stage code, failing loudly on unknown codes.
pub(crate) fn current_stage(game: &GameEntity) -> Result<Stage, ServiceError> {
    Stage::from_code(game.stage).ok_or_else(|| {
        ServiceError::invariant(format!(
            "game in chat {} has unknown stage code {}",
            game.chat, game.stage
        ))
    })
}
