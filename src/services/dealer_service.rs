use tracing::debug;

use crate::error::{RejectReason, ServiceError};
use crate::game::role::Role;
use crate::game::stage::Stage;
use crate::services::{GameHost, current_stage, scheduler};
use crate::transport::{ChatEvent, PlayerRef};

/// Reveal the acting player's card.
///
/// The deck is fixed at game start, so reading the card and then writing it
/// through the conditional reveal is safe: the predicate re-checks the stage
/// and the write-once slot, and a lost race changes nothing. The returned
/// role is for the actor's eyes only; the chat-wide roster message never
/// carries it.
pub async fn draw_card(host: &GameHost, chat: i64, actor: i64) -> Result<Role, ServiceError> {
    let game = host
        .store()
        .find_game(chat)
        .await?
        .ok_or(RejectReason::NoActiveGame)?;
    if current_stage(&game)? != Stage::Dealing {
        return Err(RejectReason::WrongStage.into());
    }
    let index = game
        .player_index(actor)
        .ok_or(RejectReason::NotAParticipant)?;
    if game.players[index].role.is_some() {
        return Err(RejectReason::AlreadyHasRole.into());
    }
    let position = index as u32 + 1;
    let card = *game
        .cards
        .get(index)
        .ok_or_else(|| ServiceError::invariant(format!("no card at position {position} in chat {chat}")))?;

    let Some(after) = host
        .store()
        .assign_role(chat, position, actor, card)
        .await?
    else {
        // Lost the race against a concurrent reveal or a stage change.
        debug!(chat, actor, "card reveal lost its race");
        return Err(RejectReason::AlreadyHasRole.into());
    };

    if after.all_roles_dealt() {
        // Last card drawn: the deal is over and the first night begins.
        scheduler::advance(host, &after).await?;
    } else {
        publish_roster(host, chat).await?;
    }
    Ok(card)
}

/// Publish or refresh the chat-wide roster of players still waiting to draw.
///
/// The first publication sends a fresh message and remembers its id; later
/// calls edit that message in place.
pub(crate) async fn publish_roster(host: &GameHost, chat: i64) -> Result<(), ServiceError> {
    let Some(game) = host.store().find_game(chat).await? else {
        return Ok(());
    };
    let waiting: Vec<PlayerRef> = game
        .undealt_positions()
        .into_iter()
        .filter_map(|position| {
            game.player_at(position).map(|player| PlayerRef {
                position,
                name: player.name.clone(),
            })
        })
        .collect();
    let event = ChatEvent::RosterPending { waiting };

    match game.roster_message {
        Some(message) => host.transport().edit(chat, message, event).await?,
        None => {
            let message = host.transport().send(chat, event).await?;
            host.store().set_roster_message(chat, message).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::game_store::GameStore;
    use crate::services::game_service::start_game;
    use crate::services::testkit::{participants, test_host};

    #[tokio::test]
    async fn dealing_reveals_every_card_and_only_the_last_draw_advances() {
        let kit = test_host();
        start_game(&kit.host, 1, participants(9)).await.unwrap();
        let game = kit.store.find_game(1).await.unwrap().unwrap();

        for (index, player) in game.players.iter().enumerate() {
            let role = draw_card(&kit.host, 1, player.id).await.unwrap();
            assert_eq!(role, game.cards[index], "card matches the fixed deck");

            let stored = kit.store.find_game(1).await.unwrap().unwrap();
            if index + 1 < game.players.len() {
                assert_eq!(stored.stage, Stage::Dealing.code(), "deal still open");
            } else {
                assert_eq!(stored.stage, Stage::DonOrder.code(), "last draw closes the deal");
            }
        }
    }

    #[tokio::test]
    async fn second_draw_by_the_same_player_is_rejected() {
        let kit = test_host();
        start_game(&kit.host, 1, participants(9)).await.unwrap();

        draw_card(&kit.host, 1, 100).await.unwrap();
        let err = draw_card(&kit.host, 1, 100).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Rejected(RejectReason::AlreadyHasRole)
        ));
    }

    #[tokio::test]
    async fn strangers_cannot_draw() {
        let kit = test_host();
        start_game(&kit.host, 1, participants(9)).await.unwrap();

        let err = draw_card(&kit.host, 1, 999).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Rejected(RejectReason::NotAParticipant)
        ));
    }

    #[tokio::test]
    async fn drawing_outside_the_deal_is_rejected() {
        let kit = test_host();
        start_game(&kit.host, 1, participants(9)).await.unwrap();
        let game = kit.store.find_game(1).await.unwrap().unwrap();
        scheduler::advance(&kit.host, &game).await.unwrap();

        let err = draw_card(&kit.host, 1, 100).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Rejected(RejectReason::WrongStage)
        ));
    }

    #[tokio::test]
    async fn roster_message_is_sent_once_and_edited_afterwards() {
        let kit = test_host();
        start_game(&kit.host, 1, participants(9)).await.unwrap();

        // start_game publishes the initial roster.
        let sends_before = kit.transport.sent().len();
        draw_card(&kit.host, 1, 100).await.unwrap();
        draw_card(&kit.host, 1, 101).await.unwrap();

        assert_eq!(
            kit.transport.sent().len(),
            sends_before,
            "draws edit the existing roster message"
        );
        let edits = kit.transport.edited();
        assert_eq!(edits.len(), 2);
        let (_, _, last) = edits.last().unwrap();
        let ChatEvent::RosterPending { waiting } = last else {
            panic!("expected a roster refresh");
        };
        assert_eq!(waiting.len(), 7);
        assert!(waiting.iter().all(|player| player.position > 2));
    }
}
