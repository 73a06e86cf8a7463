use std::time::SystemTime;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::dao::models::GameEntity;
use crate::error::ServiceError;
use crate::game;
use crate::game::stage::Stage;
use crate::game::vote::{LynchOutcome, resolve_lynch};
use crate::services::{GameHost, SharedHost, current_stage, game_service};
use crate::transport::{ChatEvent, PlayerRef};

/// Advance a game out of the stage captured in `game`.
///
/// The store operation is guarded by that expected stage, so of all
/// concurrent callers (a completing action and the deadline sweep, say)
/// exactly one wins; the rest observe `None` and drop out with nothing
/// written. The winner resolves the closing stage's side effects: when the
/// day vote closes, the recorded ballots are resolved against the returned
/// pre-image.
///
/// Returns the pre-transition snapshot, or `None` when the race was lost.
pub async fn advance(
    host: &GameHost,
    game: &GameEntity,
) -> Result<Option<GameEntity>, ServiceError> {
    let stage = current_stage(game)?;
    let next = stage.next();
    let deadline = host
        .config()
        .stage_duration(next.stage)
        .map(|duration| SystemTime::now() + duration);

    let Some(before) = host
        .store()
        .advance_stage(
            game.chat,
            stage.code(),
            next.stage.code(),
            deadline,
            next.wraps_day,
        )
        .await?
    else {
        debug!(chat = game.chat, ?stage, "stage already advanced; skipping");
        return Ok(None);
    };

    if stage == Stage::Vote && close_vote(host, &before).await? {
        // The lynch ended the game; nothing left to announce.
        return Ok(Some(before));
    }

    host.transport()
        .send(
            game.chat,
            ChatEvent::StageChanged {
                stage: next.stage,
                day_count: before.day_count + u32::from(next.wraps_day),
                deadline,
            },
        )
        .await?;

    Ok(Some(before))
}

/// Resolve the day vote recorded in the closing stage's pre-image.
/// Returns whether the game reached a terminal condition.
async fn close_vote(host: &GameHost, before: &GameEntity) -> Result<bool, ServiceError> {
    match resolve_lynch(&before.vote) {
        LynchOutcome::NoLynch => {
            host.transport()
                .send(before.chat, ChatEvent::NoLynch)
                .await?;
            Ok(false)
        }
        LynchOutcome::Lynched(position) => {
            let Some(after) = host
                .store()
                .set_player_alive(before.chat, position, false)
                .await?
            else {
                // The game vanished underneath us (end poll); nothing to do.
                return Ok(false);
            };
            let target = after
                .player_at(position)
                .map(|player| PlayerRef {
                    position,
                    name: player.name.clone(),
                })
                .ok_or_else(|| {
                    ServiceError::invariant(format!(
                        "lynch target {position} out of range in chat {}",
                        before.chat
                    ))
                })?;
            host.transport()
                .send(before.chat, ChatEvent::Lynched { target })
                .await?;

            if let Some(winner) = game::winner(&after.players) {
                game_service::stop_game(host, before.chat, Some(winner)).await?;
                return Ok(true);
            }
            Ok(false)
        }
    }
}

/// One pass over every game whose deadline elapsed.
///
/// Idempotent: a game that a completing action advanced in the meantime no
/// longer matches the expected-stage predicate and is skipped. Per-game
/// failures are logged and do not abort the pass.
pub async fn sweep_once(host: &GameHost, now: SystemTime) -> Result<usize, ServiceError> {
    let due = host.store().due_games(now).await?;
    let mut advanced = 0;
    for game in due {
        match advance(host, &game).await {
            Ok(Some(_)) => advanced += 1,
            Ok(None) => {}
            Err(err) => warn!(chat = game.chat, error = %err, "sweep failed to advance game"),
        }
    }
    Ok(advanced)
}

/// Periodic deadline sweep with an explicit lifecycle.
///
/// [`StageSweeper::start`] spawns the loop; [`StageSweeper::stop`] signals
/// it and waits for the task to drain.
pub struct StageSweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl StageSweeper {
    /// Spawn the sweep loop on the host's configured interval.
    pub fn start(host: SharedHost) -> Self {
        let (shutdown, mut rx) = watch::channel(false);
        let period = host.config().sweep_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period = ?period, "deadline sweep started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = sweep_once(&host, SystemTime::now()).await {
                            warn!(error = %err, "deadline sweep pass failed");
                        }
                    }
                    _ = rx.changed() => break,
                }
            }
            info!("deadline sweep stopped");
        });

        Self { shutdown, handle }
    }

    /// Signal the loop and wait for it to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dao::game_store::GameStore;
    use crate::services::game_service::{self, start_game};
    use crate::services::testkit::{participants, test_host};

    async fn started_game(kit: &crate::services::testkit::TestHost, chat: i64) -> GameEntity {
        start_game(&kit.host, chat, participants(9)).await.unwrap();
        kit.store.find_game(chat).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn advance_moves_to_the_next_stage_and_resets_played() {
        let kit = test_host();
        let game = started_game(&kit, 1).await;

        let before = advance(&kit.host, &game).await.unwrap().unwrap();
        assert_eq!(before.stage, Stage::Dealing.code());

        let after = kit.store.find_game(1).await.unwrap().unwrap();
        assert_eq!(after.stage, Stage::DonOrder.code());
        assert!(after.played.is_empty());
        assert!(after.next_stage_time.is_some());
    }

    #[tokio::test]
    async fn advance_is_idempotent_under_a_stale_snapshot() {
        let kit = test_host();
        let game = started_game(&kit, 1).await;

        assert!(advance(&kit.host, &game).await.unwrap().is_some());
        // Same stale snapshot again: the expected-stage predicate fails.
        assert!(advance(&kit.host, &game).await.unwrap().is_none());

        let stored = kit.store.find_game(1).await.unwrap().unwrap();
        assert_eq!(stored.stage, Stage::DonOrder.code());
    }

    #[tokio::test]
    async fn sweep_advances_each_overdue_game_exactly_once() {
        let kit = test_host();
        let game = started_game(&kit, 1).await;

        // Move past dealing into a timed stage, then pretend its deadline
        // elapsed.
        advance(&kit.host, &game).await.unwrap();
        let overdue = SystemTime::now() + Duration::from_secs(600);

        let count = sweep_once(&kit.host, overdue).await.unwrap();
        assert_eq!(count, 1);
        let stored = kit.store.find_game(1).await.unwrap().unwrap();
        assert_eq!(stored.stage, Stage::Discussion.code());
    }

    #[tokio::test]
    async fn sweep_ignores_games_whose_deadline_has_not_elapsed() {
        let kit = test_host();
        let game = started_game(&kit, 1).await;
        advance(&kit.host, &game).await.unwrap();

        let count = sweep_once(&kit.host, SystemTime::now()).await.unwrap();
        assert_eq!(count, 0, "fresh deadline is not due yet");
        let stored = kit.store.find_game(1).await.unwrap().unwrap();
        assert_eq!(stored.stage, Stage::DonOrder.code());
    }

    #[tokio::test]
    async fn day_count_increments_on_wrap() {
        let kit = test_host();
        start_game(&kit.host, 1, participants(9)).await.unwrap();

        // Walk the cycle: Dealing -> DonOrder -> Discussion -> Vote ->
        // DonCheck -> SheriffCheck -> Discussion (day 1).
        for _ in 0..6 {
            let game = kit.store.find_game(1).await.unwrap().unwrap();
            advance(&kit.host, &game).await.unwrap();
        }
        let game = kit.store.find_game(1).await.unwrap().unwrap();
        assert_eq!(game.stage, Stage::Discussion.code());
        assert_eq!(game.day_count, 1);
    }

    #[tokio::test]
    async fn sweeper_lifecycle_starts_and_stops() {
        let kit = test_host();
        let sweeper = StageSweeper::start(kit.host.clone());
        sweeper.stop().await;
    }

    #[tokio::test]
    async fn closing_the_vote_applies_the_strict_plurality_rule() {
        let kit = test_host();
        start_game(&kit.host, 1, participants(9)).await.unwrap();

        // Deal everything, then walk to the vote stage.
        let game = kit.store.find_game(1).await.unwrap().unwrap();
        for (index, player) in game.players.iter().enumerate() {
            kit.store
                .assign_role(1, index as u32 + 1, player.id, game.cards[index])
                .await
                .unwrap();
        }
        let game = kit.store.find_game(1).await.unwrap().unwrap();
        advance(&kit.host, &game).await.unwrap(); // Dealing -> DonOrder
        let game = kit.store.find_game(1).await.unwrap().unwrap();
        advance(&kit.host, &game).await.unwrap(); // DonOrder -> Discussion
        let game = kit.store.find_game(1).await.unwrap().unwrap();
        advance(&kit.host, &game).await.unwrap(); // Discussion -> Vote

        // Ballots [2, 2, 3, 0]: two votes for position 2, one for 3, one abstain.
        let game = kit.store.find_game(1).await.unwrap().unwrap();
        let stage = game.stage;
        kit.store.record_vote(1, stage, 100, 1, 2).await.unwrap();
        kit.store.record_vote(1, stage, 103, 4, 2).await.unwrap();
        kit.store.record_vote(1, stage, 101, 2, 3).await.unwrap();
        kit.store.record_vote(1, stage, 102, 3, 0).await.unwrap();

        let game = kit.store.find_game(1).await.unwrap().unwrap();
        advance(&kit.host, &game).await.unwrap(); // Vote closes.

        let stored = kit.store.find_game(1).await.unwrap().unwrap();
        assert!(!stored.players[1].alive, "position 2 is lynched");
        assert!(
            kit.transport
                .sent()
                .iter()
                .any(|(_, event)| matches!(event, ChatEvent::Lynched { target } if target.position == 2)),
            "lynch announced"
        );
    }

    #[tokio::test]
    async fn game_service_stop_is_reachable_from_vote_close() {
        // Covered end to end in game_service tests; here we only pin the
        // no-lynch path.
        let kit = test_host();
        start_game(&kit.host, 1, participants(9)).await.unwrap();
        let game = kit.store.find_game(1).await.unwrap().unwrap();
        advance(&kit.host, &game).await.unwrap(); // -> DonOrder
        let game = kit.store.find_game(1).await.unwrap().unwrap();
        advance(&kit.host, &game).await.unwrap(); // -> Discussion
        let game = kit.store.find_game(1).await.unwrap().unwrap();
        advance(&kit.host, &game).await.unwrap(); // -> Vote
        let game = kit.store.find_game(1).await.unwrap().unwrap();
        advance(&kit.host, &game).await.unwrap(); // Vote closes with no ballots.

        assert!(
            kit.transport
                .sent()
                .iter()
                .any(|(_, event)| matches!(event, ChatEvent::NoLynch)),
            "empty vote resolves to no lynch"
        );
        let _ = game_service::stop_game(&kit.host, 1, None).await;
    }
}
