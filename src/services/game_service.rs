use tracing::info;

use crate::dao::models::{GameEntity, PlayerEntity};
use crate::error::{RejectReason, ServiceError};
use crate::game::poll::PollKind;
use crate::game::role::{Faction, build_deck};
use crate::services::{GameHost, dealer_service};
use crate::transport::{ChatEvent, GameOutcome, PlayerOutcome, PlayerRef};

/// Roster entry handed over by the lobby at game start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Actor identity in the chat platform.
    pub id: i64,
    /// Short display name (handle).
    pub name: String,
    /// Full display name.
    pub full_name: String,
}

/// Start a game in a chat with the roster fixed by the lobby.
///
/// Positions are assigned from the roster order and never change afterwards.
/// A chat can only host one active game; a concurrent second start loses the
/// insert race and is rejected.
pub async fn start_game(
    host: &GameHost,
    chat: i64,
    roster: Vec<Participant>,
) -> Result<(), ServiceError> {
    let config = host.config();
    if roster.len() < config.min_players || roster.len() > config.max_players {
        return Err(RejectReason::RosterSize {
            got: roster.len(),
            min: config.min_players,
            max: config.max_players,
        }
        .into());
    }

    let players: Vec<PlayerEntity> = roster
        .into_iter()
        .map(|participant| PlayerEntity {
            id: participant.id,
            name: participant.name,
            full_name: participant.full_name,
            alive: true,
            role: None,
        })
        .collect();
    let cards = build_deck(players.len());
    if cards.len() != players.len() {
        return Err(ServiceError::invariant(format!(
            "deck of {} cards for {} players",
            cards.len(),
            players.len()
        )));
    }

    let refs: Vec<PlayerRef> = players
        .iter()
        .enumerate()
        .map(|(index, player)| PlayerRef {
            position: index as u32 + 1,
            name: player.name.clone(),
        })
        .collect();

    let game = GameEntity::new(chat, players, cards);
    if !host.store().create_game(game).await? {
        return Err(RejectReason::GameAlreadyRunning.into());
    }
    info!(chat, players = refs.len(), "game started");

    host.transport()
        .send(chat, ChatEvent::GameStarted { players: refs })
        .await?;
    dealer_service::publish_roster(host, chat).await?;
    Ok(())
}

/// Tear a game down and announce the result.
///
/// `winner` is `None` when the game was abandoned through an end poll; a
/// decided game also feeds the outcome to the stats sink. The game document
/// is removed first, so of several concurrent enders exactly one performs
/// the teardown.
pub async fn stop_game(
    host: &GameHost,
    chat: i64,
    winner: Option<Faction>,
) -> Result<(), ServiceError> {
    let Some(game) = host.store().remove_game(chat).await? else {
        return Err(RejectReason::NoActiveGame.into());
    };
    // Open polls die with the game.
    host.store().remove_poll(chat, PollKind::End).await?;
    host.store().remove_poll(chat, PollKind::Skip).await?;
    info!(chat, ?winner, "game stopped");

    if let Some(winner) = winner {
        let players: Vec<PlayerOutcome> = game
            .players
            .iter()
            .filter_map(|player| {
                player.role.map(|role| PlayerOutcome {
                    id: player.id,
                    role,
                    won: role.faction() == winner,
                })
            })
            .collect();
        host.stats()
            .record(GameOutcome {
                chat,
                winner,
                players,
            })
            .await;
    }

    host.transport()
        .send(chat, ChatEvent::GameEnded { winner })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::game_store::GameStore;
    use crate::game::role::Role;
    use crate::game::stage::Stage;
    use crate::services::testkit::{participants, test_host};

    #[tokio::test]
    async fn start_creates_a_dealing_game_with_a_full_deck() {
        let kit = test_host();
        start_game(&kit.host, 1, participants(9)).await.unwrap();

        let game = kit.store.find_game(1).await.unwrap().unwrap();
        assert_eq!(game.stage, Stage::Dealing.code());
        assert_eq!(game.players.len(), 9);
        assert_eq!(game.cards.len(), 9);
        assert!(game.players.iter().all(|player| player.role.is_none()));
        assert!(game.next_stage_time.is_none(), "dealing has no deadline");
        assert!(
            kit.transport
                .sent()
                .iter()
                .any(|(_, event)| matches!(event, ChatEvent::GameStarted { players } if players.len() == 9))
        );
    }

    #[tokio::test]
    async fn second_start_in_the_same_chat_is_rejected() {
        let kit = test_host();
        start_game(&kit.host, 1, participants(9)).await.unwrap();

        let err = start_game(&kit.host, 1, participants(9)).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Rejected(RejectReason::GameAlreadyRunning)
        ));
    }

    #[tokio::test]
    async fn undersized_roster_is_rejected() {
        let kit = test_host();
        let err = start_game(&kit.host, 1, participants(3)).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Rejected(RejectReason::RosterSize { got: 3, .. })
        ));
        assert!(kit.store.find_game(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stop_without_a_game_is_rejected() {
        let kit = test_host();
        let err = stop_game(&kit.host, 1, None).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Rejected(RejectReason::NoActiveGame)
        ));
    }

    #[tokio::test]
    async fn decided_stop_records_the_outcome() {
        let kit = test_host();
        start_game(&kit.host, 1, participants(9)).await.unwrap();

        // Deal everything so the outcome carries per-player roles.
        let game = kit.store.find_game(1).await.unwrap().unwrap();
        for (index, player) in game.players.iter().enumerate() {
            kit.store
                .assign_role(1, index as u32 + 1, player.id, game.cards[index])
                .await
                .unwrap();
        }

        stop_game(&kit.host, 1, Some(Faction::Peace)).await.unwrap();

        assert!(kit.store.find_game(1).await.unwrap().is_none());
        let outcomes = kit.stats.outcomes();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].winner, Faction::Peace);
        assert_eq!(outcomes[0].players.len(), 9);
        let don = outcomes[0]
            .players
            .iter()
            .find(|player| player.role == Role::Don)
            .unwrap();
        assert!(!don.won);
        assert!(
            kit.transport.sent().iter().any(|(_, event)| matches!(
                event,
                ChatEvent::GameEnded {
                    winner: Some(Faction::Peace)
                }
            ))
        );
    }

    #[tokio::test]
    async fn abandoned_stop_skips_the_stats_sink() {
        let kit = test_host();
        start_game(&kit.host, 1, participants(9)).await.unwrap();
        stop_game(&kit.host, 1, None).await.unwrap();

        assert!(kit.stats.outcomes().is_empty());
        assert!(
            kit.transport
                .sent()
                .iter()
                .any(|(_, event)| matches!(event, ChatEvent::GameEnded { winner: None }))
        );
    }
}
