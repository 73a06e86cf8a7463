use std::sync::Arc;
use std::time::SystemTime;

use dashmap::{DashMap, Entry};
use futures::future::BoxFuture;

use crate::dao::game_store::GameStore;
use crate::dao::models::{GameEntity, PollEntity};
use crate::dao::storage::StorageResult;
use crate::game::poll::{PollKind, PollTally};
use crate::game::role::{Faction, Role};

/// In-process [`GameStore`] backed by [`DashMap`].
///
/// Every operation runs while holding the map entry for the document, which
/// gives the same per-document linearizability as the database backends.
/// Used by the test suite and as a fallback when no database is configured.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    games: DashMap<i64, GameEntity>,
    polls: DashMap<(i64, PollKind), PollEntity>,
}

impl MemoryGameStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a conditional mutation under the game's entry lock.
    ///
    /// `apply` checks the predicate and performs the mutation in one step,
    /// returning the snapshot to hand back, or `None` when the predicate
    /// does not match.
    fn mutate_game<F>(&self, chat: i64, apply: F) -> Option<GameEntity>
    where
        F: FnOnce(&mut GameEntity) -> Option<GameEntity>,
    {
        let mut entry = self.inner.games.get_mut(&chat)?;
        apply(entry.value_mut())
    }

    fn mutate_poll<F>(&self, chat: i64, kind: PollKind, apply: F) -> Option<PollEntity>
    where
        F: FnOnce(&mut PollEntity) -> Option<PollEntity>,
    {
        let mut entry = self.inner.polls.get_mut(&(chat, kind))?;
        apply(entry.value_mut())
    }
}

impl GameStore for MemoryGameStore {
    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(match store.inner.games.entry(game.chat) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(game);
                    true
                }
            })
        })
    }

    fn find_game(&self, chat: i64) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.games.get(&chat).map(|game| game.clone())) })
    }

    fn assign_role(
        &self,
        chat: i64,
        position: u32,
        player: i64,
        role: Role,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store.mutate_game(chat, |game| {
                use crate::game::stage::Stage;
                if game.stage != Stage::Dealing.code() || position == 0 {
                    return None;
                }
                let slot = game.players.get_mut(position as usize - 1)?;
                if slot.id != player || slot.role.is_some() {
                    return None;
                }
                slot.role = Some(role);
                Some(game.clone())
            }))
        })
    }

    fn record_vote(
        &self,
        chat: i64,
        stage: i32,
        actor: i64,
        voter_position: u32,
        target: u32,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store.mutate_game(chat, |game| {
                if game.stage != stage
                    || !game.is_living_participant(actor)
                    || game.played.contains(&actor)
                {
                    return None;
                }
                game.played.push(actor);
                let voters = game.vote.entry(target.to_string()).or_default();
                if !voters.contains(&voter_position) {
                    voters.push(voter_position);
                }
                Some(game.clone())
            }))
        })
    }

    fn record_check(
        &self,
        chat: i64,
        stage: i32,
        actor: i64,
        role: Role,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store.mutate_game(chat, |game| {
                let holds_role = game
                    .players
                    .iter()
                    .any(|player| player.id == actor && player.alive && player.role == Some(role));
                if game.stage != stage || !holds_role || game.played.contains(&actor) {
                    return None;
                }
                game.played.push(actor);
                Some(game.clone())
            }))
        })
    }

    fn push_order(
        &self,
        chat: i64,
        stage: i32,
        actor: i64,
        target: u32,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store.mutate_game(chat, |game| {
                let is_don = game
                    .players
                    .iter()
                    .any(|player| player.id == actor && player.alive && player.role == Some(Role::Don));
                if game.stage != stage || !is_don {
                    return None;
                }
                if !game.order.contains(&target) {
                    game.order.push(target);
                }
                Some(game.clone())
            }))
        })
    }

    fn set_roster_message(
        &self,
        chat: i64,
        message: i64,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store.mutate_game(chat, |game| {
                game.roster_message = Some(message);
                Some(game.clone())
            }))
        })
    }

    fn advance_stage(
        &self,
        chat: i64,
        expected: i32,
        next: i32,
        deadline: Option<SystemTime>,
        increment_day: bool,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store.mutate_game(chat, |game| {
                if game.stage != expected {
                    return None;
                }
                let before = game.clone();
                game.stage = next;
                game.next_stage_time = deadline;
                game.played.clear();
                game.vote.clear();
                if increment_day {
                    game.day_count += 1;
                }
                Some(before)
            }))
        })
    }

    fn set_player_alive(
        &self,
        chat: i64,
        position: u32,
        alive: bool,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store.mutate_game(chat, |game| {
                if position == 0 {
                    return None;
                }
                let slot = game.players.get_mut(position as usize - 1)?;
                slot.alive = alive;
                Some(game.clone())
            }))
        })
    }

    fn due_games(&self, now: SystemTime) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .games
                .iter()
                .filter(|game| matches!(game.next_stage_time, Some(at) if at <= now))
                .map(|game| game.clone())
                .collect())
        })
    }

    fn remove_game(&self, chat: i64) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.games.remove(&chat).map(|(_, game)| game)) })
    }

    fn create_poll(&self, poll: PollEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(match store.inner.polls.entry((poll.chat, poll.kind)) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(poll);
                    true
                }
            })
        })
    }

    fn find_poll(
        &self,
        chat: i64,
        kind: PollKind,
    ) -> BoxFuture<'static, StorageResult<Option<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .polls
                .get(&(chat, kind))
                .map(|poll| poll.clone()))
        })
    }

    fn record_poll_vote(
        &self,
        chat: i64,
        kind: PollKind,
        voter: i64,
        side: Option<Faction>,
    ) -> BoxFuture<'static, StorageResult<Option<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store.mutate_poll(chat, kind, |poll| {
                if poll.votes.contains(&voter) {
                    return None;
                }
                match (&mut poll.tally, side) {
                    (PollTally::Pooled { count, .. }, None) => *count += 1,
                    (PollTally::Split { peace, .. }, Some(Faction::Peace)) => peace.count += 1,
                    (PollTally::Split { mafia, .. }, Some(Faction::Mafia)) => mafia.count += 1,
                    _ => return None,
                }
                poll.votes.push(voter);
                Some(poll.clone())
            }))
        })
    }

    fn remove_poll(
        &self,
        chat: i64,
        kind: PollKind,
    ) -> BoxFuture<'static, StorageResult<Option<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .polls
                .remove(&(chat, kind))
                .map(|(_, poll)| poll))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::PlayerEntity;
    use crate::game::stage::Stage;

    fn roster(count: usize) -> Vec<PlayerEntity> {
        (0..count)
            .map(|index| PlayerEntity {
                id: 100 + index as i64,
                name: format!("p{index}"),
                full_name: format!("Player {index}"),
                alive: true,
                role: None,
            })
            .collect()
    }

    fn game(chat: i64, count: usize) -> GameEntity {
        GameEntity::new(chat, roster(count), crate::game::role::build_deck(count))
    }

    #[tokio::test]
    async fn create_game_is_unique_per_chat() {
        let store = MemoryGameStore::new();
        assert!(store.create_game(game(1, 9)).await.unwrap());
        assert!(!store.create_game(game(1, 9)).await.unwrap());
        assert!(store.create_game(game(2, 9)).await.unwrap());
    }

    #[tokio::test]
    async fn assign_role_is_write_once() {
        let store = MemoryGameStore::new();
        store.create_game(game(1, 9)).await.unwrap();

        let first = store
            .assign_role(1, 3, 102, Role::Sheriff)
            .await
            .unwrap()
            .expect("first reveal accepted");
        assert_eq!(first.players[2].role, Some(Role::Sheriff));

        let second = store.assign_role(1, 3, 102, Role::Peace).await.unwrap();
        assert!(second.is_none(), "second reveal must not match");

        let stored = store.find_game(1).await.unwrap().unwrap();
        assert_eq!(stored.players[2].role, Some(Role::Sheriff));
    }

    #[tokio::test]
    async fn record_vote_rejects_repeat_actor() {
        let store = MemoryGameStore::new();
        let mut g = game(1, 9);
        g.stage = Stage::Vote.code();
        store.create_game(g).await.unwrap();

        let stage = Stage::Vote.code();
        let first = store.record_vote(1, stage, 100, 1, 2).await.unwrap();
        assert!(first.is_some());
        let second = store.record_vote(1, stage, 100, 1, 3).await.unwrap();
        assert!(second.is_none());

        let stored = store.find_game(1).await.unwrap().unwrap();
        assert_eq!(stored.vote.get("2").map(Vec::len), Some(1));
        assert!(stored.vote.get("3").is_none());
        assert_eq!(stored.played, vec![100]);
    }

    #[tokio::test]
    async fn record_check_rejects_a_second_attempt_in_the_same_stage() {
        let store = MemoryGameStore::new();
        let mut g = game(1, 9);
        g.stage = Stage::DonCheck.code();
        g.players[0].role = Some(Role::Don);
        store.create_game(g).await.unwrap();

        let stage = Stage::DonCheck.code();
        let first = store
            .record_check(1, stage, 100, Role::Don)
            .await
            .unwrap()
            .expect("first check accepted");
        assert_eq!(first.played, vec![100]);

        // Same actor, same stage: the `played` guard must fail the match
        // and leave the set untouched.
        let second = store.record_check(1, stage, 100, Role::Don).await.unwrap();
        assert!(second.is_none());

        let stored = store.find_game(1).await.unwrap().unwrap();
        assert_eq!(stored.played, vec![100]);
    }

    #[tokio::test]
    async fn set_player_alive_rejects_out_of_range_positions() {
        let store = MemoryGameStore::new();
        store.create_game(game(1, 9)).await.unwrap();

        assert!(store.set_player_alive(1, 10, false).await.unwrap().is_none());
        assert!(store.set_player_alive(1, 0, false).await.unwrap().is_none());

        let stored = store.find_game(1).await.unwrap().unwrap();
        assert_eq!(stored.players.len(), 9);
        assert!(stored.players.iter().all(|player| player.alive));
    }

    #[tokio::test]
    async fn advance_stage_is_guarded_by_expected_stage() {
        let store = MemoryGameStore::new();
        store.create_game(game(1, 9)).await.unwrap();

        let pre = store
            .advance_stage(1, Stage::Dealing.code(), Stage::DonOrder.code(), None, false)
            .await
            .unwrap();
        assert_eq!(pre.unwrap().stage, Stage::Dealing.code());

        // A concurrent sweep that still expects the old stage must not match.
        let lost = store
            .advance_stage(1, Stage::Dealing.code(), Stage::DonOrder.code(), None, false)
            .await
            .unwrap();
        assert!(lost.is_none());

        let stored = store.find_game(1).await.unwrap().unwrap();
        assert_eq!(stored.stage, Stage::DonOrder.code());
        assert!(stored.played.is_empty());
    }

    #[tokio::test]
    async fn poll_votes_are_counted_once_per_actor() {
        let store = MemoryGameStore::new();
        let poll = PollEntity {
            chat: 1,
            kind: PollKind::End,
            creator: 100,
            check_roles: false,
            votes: vec![100],
            tally: PollTally::pooled(9),
        };
        assert!(store.create_poll(poll).await.unwrap());

        let first = store
            .record_poll_vote(1, PollKind::End, 101, None)
            .await
            .unwrap()
            .expect("new voter accepted");
        assert_eq!(first.votes, vec![100, 101]);

        let repeat = store.record_poll_vote(1, PollKind::End, 101, None).await.unwrap();
        assert!(repeat.is_none());

        let stored = store.find_poll(1, PollKind::End).await.unwrap().unwrap();
        assert!(matches!(stored.tally, PollTally::Pooled { count: 2, .. }));
    }

    #[tokio::test]
    async fn remove_game_is_fetch_and_delete() {
        let store = MemoryGameStore::new();
        store.create_game(game(1, 9)).await.unwrap();
        assert!(store.remove_game(1).await.unwrap().is_some());
        assert!(store.remove_game(1).await.unwrap().is_none());
        assert!(store.find_game(1).await.unwrap().is_none());
    }
}
