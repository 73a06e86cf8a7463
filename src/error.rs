use thiserror::Error;

use crate::dao::storage::StorageError;
use crate::transport::TransportError;

/// Why an action was not applied.
///
/// Covers both plain precondition failures and lost concurrency races; the
/// two are indistinguishable to the actor and handled identically. Always
/// recoverable, reported to the acting party only, never retried by the
/// core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// The chat has no active game.
    #[error("no active game in this chat")]
    NoActiveGame,
    /// The chat already has an active game.
    #[error("a game is already running in this chat")]
    GameAlreadyRunning,
    /// The action is not legal in the current stage.
    #[error("action not allowed in the current stage")]
    WrongStage,
    /// The actor already consumed their one action this stage.
    #[error("action already taken this stage")]
    AlreadyPlayed,
    /// The actor already drew their card.
    #[error("card already drawn")]
    AlreadyHasRole,
    /// The actor is not part of the game.
    #[error("not a participant of this game")]
    NotAParticipant,
    /// The actor is no longer alive.
    #[error("dead players cannot act")]
    NotAlive,
    /// The action belongs to another role.
    #[error("this action belongs to another role")]
    NotYourCall,
    /// The referenced target position does not exist or is dead.
    #[error("invalid target position")]
    InvalidTarget,
    /// The actor already voted in this poll.
    #[error("already voted in this poll")]
    AlreadyVoted,
    /// A poll of this kind is already open.
    #[error("a poll of this kind is already open")]
    PollAlreadyOpen,
    /// No poll of this kind is open.
    #[error("no such poll is open")]
    NoPoll,
    /// The roster size is outside the configured bounds.
    #[error("roster of {got} players is outside {min}..={max}")]
    RosterSize {
        /// Players handed over by the lobby.
        got: usize,
        /// Configured minimum.
        min: usize,
        /// Configured maximum.
        max: usize,
    },
}

/// Errors surfaced by the game services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Precondition failed or a concurrent action won the race. No state
    /// was written.
    #[error("action rejected: {0}")]
    Rejected(#[from] RejectReason),
    /// Storage backend unreachable. Fatal to this request; the atomic
    /// primitive guarantees no partial mutation was left behind.
    #[error("storage unavailable")]
    Unavailable(#[from] StorageError),
    /// Outbound message delivery failed.
    #[error("transport failed")]
    Transport(#[from] TransportError),
    /// Programming-error class: the stored document violates a structural
    /// invariant. Aborts handling of the event loudly.
    #[error("game state invariant violated: {0}")]
    Invariant(String),
}

impl ServiceError {
    /// Shorthand for invariant violations.
    pub fn invariant(message: impl Into<String>) -> Self {
        ServiceError::Invariant(message.into())
    }
}
