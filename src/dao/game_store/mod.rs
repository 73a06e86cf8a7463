/// In-process store used by tests and storage-less deployments.
pub mod memory;
#[cfg(feature = "mongo-store")]
/// MongoDB-backed store.
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;

use crate::dao::models::{GameEntity, PollEntity};
use crate::dao::storage::StorageResult;
use crate::game::poll::PollKind;
use crate::game::role::{Faction, Role};

/// Abstraction over the persistence layer for games and polls.
///
/// Every mutating method is one atomic conditional mutate-and-return
/// operation: the backend matches a document against the stated predicate,
/// applies the mutation, and returns a snapshot, with no intervening
/// observation by a concurrent caller. A predicate that does not match
/// returns `Ok(None)` — a rejection, not an error. Mutations are
/// linearizable per document; there is no ordering across documents.
pub trait GameStore: Send + Sync {
    /// Insert a fresh game unless the chat already has an active one.
    /// Returns whether the insert happened.
    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<bool>>;

    /// Load the active game for a chat.
    fn find_game(&self, chat: i64) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;

    /// Reveal the card at a 1-based position to its owner.
    ///
    /// Predicate: dealing stage, the player at `position` has id `player`
    /// and no role yet. Write-once: a repeat attempt fails the match.
    /// Returns the post-mutation snapshot.
    fn assign_role(
        &self,
        chat: i64,
        position: u32,
        player: i64,
        role: Role,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;

    /// Record a day-lynch ballot.
    ///
    /// Predicate: the given stage is current, the actor is a living
    /// participant not yet in `played`. Adds the actor to `played` and the
    /// voter position to `vote[target]` (idempotent set-append). Returns the
    /// post-mutation snapshot.
    fn record_vote(
        &self,
        chat: i64,
        stage: i32,
        actor: i64,
        voter_position: u32,
        target: u32,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;

    /// Consume a night-check action.
    ///
    /// Predicate: the given stage is current and the actor is the living
    /// holder of `role`, not yet in `played`. Adds the actor to `played`;
    /// the check itself is a pure lookup on the returned post-mutation
    /// snapshot.
    fn record_check(
        &self,
        chat: i64,
        stage: i32,
        actor: i64,
        role: Role,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;

    /// Append a target position to the don's kill order.
    ///
    /// Predicate: the given stage is current and the actor is the living
    /// don. Duplicate targets are ignored (set-append). Returns the
    /// post-mutation snapshot.
    fn push_order(
        &self,
        chat: i64,
        stage: i32,
        actor: i64,
        target: u32,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;

    /// Remember the transport id of the card-draw roster message.
    fn set_roster_message(
        &self,
        chat: i64,
        message: i64,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;

    /// Transition the stage, guarded by the expected current stage.
    ///
    /// Sets the stage and deadline, clears `played` and `vote`, and
    /// optionally increments the day counter. Returns the **pre-mutation**
    /// snapshot so the winner of a concurrent race can resolve the closing
    /// stage's votes; a caller that lost the race gets `None`.
    fn advance_stage(
        &self,
        chat: i64,
        expected: i32,
        next: i32,
        deadline: Option<SystemTime>,
        increment_day: bool,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;

    /// Flip a player's alive flag. Returns the post-mutation snapshot.
    fn set_player_alive(
        &self,
        chat: i64,
        position: u32,
        alive: bool,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;

    /// Games whose stage deadline is at or before `now`.
    fn due_games(&self, now: SystemTime) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>>;

    /// Unconditional fetch-and-delete of a chat's game.
    fn remove_game(&self, chat: i64) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;

    /// Insert a poll unless one of the same kind is already open in the
    /// chat. Returns whether the insert happened.
    fn create_poll(&self, poll: PollEntity) -> BoxFuture<'static, StorageResult<bool>>;

    /// Load an open poll.
    fn find_poll(
        &self,
        chat: i64,
        kind: PollKind,
    ) -> BoxFuture<'static, StorageResult<Option<PollEntity>>>;

    /// Record a poll ballot.
    ///
    /// Predicate: the voter is not in `votes` yet. Adds the voter and
    /// increments the counter of `side` (`None` for a pooled tally).
    /// Returns the post-mutation snapshot.
    fn record_poll_vote(
        &self,
        chat: i64,
        kind: PollKind,
        voter: i64,
        side: Option<Faction>,
    ) -> BoxFuture<'static, StorageResult<Option<PollEntity>>>;

    /// Unconditional fetch-and-delete of an open poll.
    fn remove_poll(
        &self,
        chat: i64,
        kind: PollKind,
    ) -> BoxFuture<'static, StorageResult<Option<PollEntity>>>;
}
