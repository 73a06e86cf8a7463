use tracing::debug;

use crate::dao::models::GameEntity;
use crate::error::{RejectReason, ServiceError};
use crate::game::role::Role;
use crate::game::stage::Stage;
use crate::game::vote::{ABSTAIN, tally};
use crate::services::{GameHost, current_stage, scheduler};
use crate::transport::ChatEvent;

/// What a night check revealed. For the checking player's eyes only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckReply {
    /// The don checked a position for the sheriff card.
    DonSawSheriff {
        /// Checked position.
        position: u32,
        /// Whether that player is the sheriff.
        is_sheriff: bool,
    },
    /// The sheriff checked a position for a mafia-side card.
    SheriffSawMafia {
        /// Checked position.
        position: u32,
        /// Whether that player is on the mafia side.
        is_mafia: bool,
    },
}

/// Cast a day-lynch ballot for `target`, or abstain with target `0`.
///
/// Each living player votes once per day; the stage closes early once every
/// living player has voted.
pub async fn cast_vote(
    host: &GameHost,
    chat: i64,
    actor: i64,
    target: u32,
) -> Result<(), ServiceError> {
    let game = host
        .store()
        .find_game(chat)
        .await?
        .ok_or(RejectReason::NoActiveGame)?;
    if current_stage(&game)? != Stage::Vote {
        return Err(RejectReason::WrongStage.into());
    }
    let voter_position = living_position(&game, actor)?;
    if target != ABSTAIN {
        let valid = game
            .player_at(target)
            .is_some_and(|player| player.alive);
        if !valid || target == voter_position {
            return Err(RejectReason::InvalidTarget.into());
        }
    }

    let Some(after) = host
        .store()
        .record_vote(chat, game.stage, actor, voter_position, target)
        .await?
    else {
        debug!(chat, actor, "day ballot lost its race");
        return Err(ballot_miss_reason(host, chat, actor).await?.into());
    };

    host.transport()
        .send(
            chat,
            ChatEvent::VoteTallies {
                tallies: tally(&after.vote),
            },
        )
        .await?;

    if Stage::Vote.completed(&after) {
        // Everyone voted: close the stage now instead of waiting out the
        // deadline. The advance resolves the lynch from the pre-image.
        scheduler::advance(host, &after).await?;
    }
    Ok(())
}

/// Perform the acting role's night check on `target`.
///
/// One check per night; the answer goes back to the actor, nothing is
/// announced chat-wide. Once the living holder has checked, the stage closes
/// early.
pub async fn check_player(
    host: &GameHost,
    chat: i64,
    actor: i64,
    target: u32,
) -> Result<CheckReply, ServiceError> {
    let game = host
        .store()
        .find_game(chat)
        .await?
        .ok_or(RejectReason::NoActiveGame)?;
    let stage = current_stage(&game)?;
    let role = stage.checking_role().ok_or(RejectReason::WrongStage)?;
    require_role(&game, actor, role)?;
    let checked = game
        .player_at(target)
        .ok_or(RejectReason::InvalidTarget)?;
    let checked_role = checked.role;

    if host
        .store()
        .record_check(chat, game.stage, actor, role)
        .await?
        .is_none()
    {
        debug!(chat, actor, "night check lost its race");
        return Err(RejectReason::AlreadyPlayed.into());
    }

    let reply = match role {
        Role::Don => CheckReply::DonSawSheriff {
            position: target,
            is_sheriff: checked_role == Some(Role::Sheriff),
        },
        _ => CheckReply::SheriffSawMafia {
            position: target,
            is_mafia: matches!(checked_role, Some(Role::Mafia | Role::Don)),
        },
    };

    // The holder acted, so the stage is done; re-read for the updated
    // `played` set.
    if let Some(after) = host.store().find_game(chat).await?
        && stage.completed(&after)
    {
        scheduler::advance(host, &after).await?;
    }
    Ok(reply)
}

/// Append a position to the don's designated kill order.
///
/// The order is advisory and never enforced against later kills; duplicates
/// are ignored.
pub async fn add_order(
    host: &GameHost,
    chat: i64,
    actor: i64,
    target: u32,
) -> Result<Vec<u32>, ServiceError> {
    let game = host
        .store()
        .find_game(chat)
        .await?
        .ok_or(RejectReason::NoActiveGame)?;
    if current_stage(&game)? != Stage::DonOrder {
        return Err(RejectReason::WrongStage.into());
    }
    require_role(&game, actor, Role::Don)?;
    if game.player_at(target).is_none() {
        return Err(RejectReason::InvalidTarget.into());
    }

    let Some(after) = host
        .store()
        .push_order(chat, game.stage, actor, target)
        .await?
    else {
        debug!(chat, actor, "order append lost its race");
        return Err(RejectReason::WrongStage.into());
    };
    Ok(after.order)
}

/// Close the don's order stage explicitly.
///
/// Only the living don may end it early; everyone else waits for the
/// deadline sweep. A lost race against the sweep is not an error.
pub async fn finish_order(host: &GameHost, chat: i64, actor: i64) -> Result<(), ServiceError> {
    let game = host
        .store()
        .find_game(chat)
        .await?
        .ok_or(RejectReason::NoActiveGame)?;
    if current_stage(&game)? != Stage::DonOrder {
        return Err(RejectReason::WrongStage.into());
    }
    require_role(&game, actor, Role::Don)?;

    scheduler::advance(host, &game).await?;
    Ok(())
}

/// Explain a ballot whose predicate no longer matched.
///
/// The write can miss for more than one reason: the actor already voted, or
/// the stage closed (or the game ended) between the legality check and the
/// write. Re-read the current state so the actor is told which it was.
async fn ballot_miss_reason(
    host: &GameHost,
    chat: i64,
    actor: i64,
) -> Result<RejectReason, ServiceError> {
    let Some(game) = host.store().find_game(chat).await? else {
        return Ok(RejectReason::NoActiveGame);
    };
    if current_stage(&game)? != Stage::Vote {
        return Ok(RejectReason::WrongStage);
    }
    if !game.is_living_participant(actor) {
        return Ok(RejectReason::NotAlive);
    }
    Ok(RejectReason::AlreadyPlayed)
}

/// 1-based position of a living participant.
fn living_position(game: &GameEntity, actor: i64) -> Result<u32, ServiceError> {
    let position = game
        .player_position(actor)
        .ok_or(RejectReason::NotAParticipant)?;
    if !game.is_living_participant(actor) {
        return Err(RejectReason::NotAlive.into());
    }
    Ok(position)
}

/// Check that the actor is the living holder of `role`.
fn require_role(game: &GameEntity, actor: i64, role: Role) -> Result<(), ServiceError> {
    let index = game
        .player_index(actor)
        .ok_or(RejectReason::NotAParticipant)?;
    let player = &game.players[index];
    if player.role != Some(role) {
        return Err(RejectReason::NotYourCall.into());
    }
    if !player.alive {
        return Err(RejectReason::NotAlive.into());
    }
    Ok(())
}
