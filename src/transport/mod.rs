//! Interfaces to the collaborators the core consumes: chat message
//! delivery and the statistics sink. The core never formats user-facing
//! text; it hands structured events outward for rendering.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::SystemTime;

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::info;

use crate::game::poll::{PollKind, PollTally};
use crate::game::role::{Faction, Role};
use crate::game::stage::Stage;

/// Identifier of a delivered chat message, usable for later edits.
pub type MessageId = i64;

/// Positional reference to a player, for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRef {
    /// 1-based player number.
    pub position: u32,
    /// Short display name.
    pub name: String,
}

/// Structured chat-wide event handed to the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A game started with this roster.
    GameStarted {
        /// Players in positional order.
        players: Vec<PlayerRef>,
    },
    /// Players still waiting to draw their card.
    RosterPending {
        /// Positions without a revealed role.
        waiting: Vec<PlayerRef>,
    },
    /// The stage advanced.
    StageChanged {
        /// Stage just entered.
        stage: Stage,
        /// Day counter after the transition.
        day_count: u32,
        /// Deadline for the new stage, if it has one.
        deadline: Option<SystemTime>,
    },
    /// Current day-vote tallies after a ballot.
    VoteTallies {
        /// Per-target voter counts, abstentions under position `0`.
        tallies: Vec<(u32, usize)>,
    },
    /// The day vote closed on a strict plurality.
    Lynched {
        /// The lynched player.
        target: PlayerRef,
    },
    /// The day vote closed without a plurality.
    NoLynch,
    /// Poll counts after a ballot or at creation.
    PollStatus {
        /// Which poll.
        kind: PollKind,
        /// Current counts and thresholds.
        tally: PollTally,
    },
    /// A poll reached quorum and fired.
    PollResolved {
        /// Which poll.
        kind: PollKind,
    },
    /// The game is over.
    GameEnded {
        /// Winning side; `None` when ended by poll.
        winner: Option<Faction>,
    },
}

/// Error delivering or editing a chat message. Fatal to the request that
/// triggered it; never retried by the core.
#[derive(Debug, Error)]
#[error("transport delivery failed: {message}")]
pub struct TransportError {
    /// Human readable description from the transport layer.
    pub message: String,
}

/// Message delivery used by the core. Implemented by the hosting bot.
pub trait ChatTransport: Send + Sync {
    /// Deliver an event to a chat and return the message id.
    fn send(
        &self,
        chat: i64,
        event: ChatEvent,
    ) -> BoxFuture<'static, Result<MessageId, TransportError>>;

    /// Edit a previously sent message in place.
    fn edit(
        &self,
        chat: i64,
        message: MessageId,
        event: ChatEvent,
    ) -> BoxFuture<'static, Result<(), TransportError>>;
}

/// Terminal result of one player's game, for external rating aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerOutcome {
    /// Actor identity.
    pub id: i64,
    /// Role the player held.
    pub role: Role,
    /// Whether the player's side won.
    pub won: bool,
}

/// Terminal result of a finished game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOutcome {
    /// Chat the game ran in.
    pub chat: i64,
    /// Winning side.
    pub winner: Faction,
    /// Per-player results for every player that held a role.
    pub players: Vec<PlayerOutcome>,
}

/// Sink for terminal outcomes. The core does not compute ratings.
pub trait StatsSink: Send + Sync {
    /// Record a finished game.
    fn record(&self, outcome: GameOutcome) -> BoxFuture<'static, ()>;
}

/// Transport that logs events through `tracing` and hands out sequential
/// message ids. Used by the standalone binary and available to tests.
#[derive(Debug, Default)]
pub struct LogTransport {
    next_message: AtomicI64,
}

impl LogTransport {
    /// Construct a transport starting at message id 1.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatTransport for LogTransport {
    fn send(
        &self,
        chat: i64,
        event: ChatEvent,
    ) -> BoxFuture<'static, Result<MessageId, TransportError>> {
        let message = self.next_message.fetch_add(1, Ordering::Relaxed) + 1;
        Box::pin(async move {
            info!(chat, message, ?event, "outbound chat event");
            Ok(message)
        })
    }

    fn edit(
        &self,
        chat: i64,
        message: MessageId,
        event: ChatEvent,
    ) -> BoxFuture<'static, Result<(), TransportError>> {
        Box::pin(async move {
            info!(chat, message, ?event, "edited chat event");
            Ok(())
        })
    }
}

/// Stats sink that logs outcomes through `tracing`.
#[derive(Debug, Default)]
pub struct LogStatsSink;

impl StatsSink for LogStatsSink {
    fn record(&self, outcome: GameOutcome) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            info!(
                chat = outcome.chat,
                winner = ?outcome.winner,
                players = outcome.players.len(),
                "game outcome recorded"
            );
        })
    }
}
