use tracing::{debug, info};

use crate::dao::models::{GameEntity, PollEntity};
use crate::error::{RejectReason, ServiceError};
use crate::game::poll::{PollKind, PollTally};
use crate::game::role::Faction;
use crate::game::stage::Stage;
use crate::services::{GameHost, current_stage, game_service, scheduler};
use crate::transport::ChatEvent;

/// Open a chat-wide meta-poll.
///
/// Polls are legal during the deal and the day discussion only. A poll
/// opened during discussion splits its quorum by faction; during the deal,
/// while roles are secret, everyone is pooled together. The creator's ballot
/// is pre-counted.
pub async fn open_poll(
    host: &GameHost,
    chat: i64,
    actor: i64,
    kind: PollKind,
) -> Result<(), ServiceError> {
    let game = host
        .store()
        .find_game(chat)
        .await?
        .ok_or(RejectReason::NoActiveGame)?;
    let stage = current_stage(&game)?;
    if !stage.allows_polls() {
        return Err(RejectReason::WrongStage.into());
    }
    require_living(&game, actor)?;

    let check_roles = stage == Stage::Discussion;
    let tally = if check_roles {
        let (peace, mafia) = living_sides(&game);
        PollTally::split(peace, mafia, actor_side(&game, actor) == Faction::Mafia)
    } else {
        PollTally::pooled(game.players.iter().filter(|player| player.alive).count())
    };

    let poll = PollEntity {
        chat,
        kind,
        creator: actor,
        check_roles,
        votes: vec![actor],
        tally: tally.clone(),
    };
    if !host.store().create_poll(poll).await? {
        return Err(RejectReason::PollAlreadyOpen.into());
    }
    info!(chat, kind = kind.as_str(), "poll opened");

    host.transport()
        .send(chat, ChatEvent::PollStatus { kind, tally: tally.clone() })
        .await?;
    if tally.satisfied() {
        resolve(host, chat, kind).await?;
    }
    Ok(())
}

/// Cast a ballot in an open poll.
///
/// One ballot per actor per poll; on a split quorum the ballot lands on the
/// actor's own side. The ballot that completes the quorum also fires the
/// poll's effect.
pub async fn vote_poll(
    host: &GameHost,
    chat: i64,
    actor: i64,
    kind: PollKind,
) -> Result<(), ServiceError> {
    let game = host
        .store()
        .find_game(chat)
        .await?
        .ok_or(RejectReason::NoActiveGame)?;
    require_living(&game, actor)?;
    let poll = host
        .store()
        .find_poll(chat, kind)
        .await?
        .ok_or(RejectReason::NoPoll)?;
    let side = poll.check_roles.then(|| actor_side(&game, actor));

    let Some(after) = host
        .store()
        .record_poll_vote(chat, kind, actor, side)
        .await?
    else {
        debug!(chat, actor, kind = kind.as_str(), "poll ballot lost its race");
        return Err(RejectReason::AlreadyVoted.into());
    };

    host.transport()
        .send(
            chat,
            ChatEvent::PollStatus {
                kind,
                tally: after.tally.clone(),
            },
        )
        .await?;
    if after.tally.satisfied() {
        resolve(host, chat, kind).await?;
    }
    Ok(())
}

/// Fire a satisfied poll's effect.
///
/// The poll document is removed first, so of several concurrent resolvers
/// exactly one performs the effect; the rest return quietly.
async fn resolve(host: &GameHost, chat: i64, kind: PollKind) -> Result<(), ServiceError> {
    if host.store().remove_poll(chat, kind).await?.is_none() {
        return Ok(());
    }
    host.transport()
        .send(chat, ChatEvent::PollResolved { kind })
        .await?;

    match kind {
        PollKind::End => match game_service::stop_game(host, chat, None).await {
            // The game may already be gone; the poll's goal is met either way.
            Err(ServiceError::Rejected(RejectReason::NoActiveGame)) | Ok(()) => Ok(()),
            Err(err) => Err(err),
        },
        PollKind::Skip => {
            if let Some(game) = host.store().find_game(chat).await? {
                scheduler::advance(host, &game).await?;
            }
            Ok(())
        }
    }
}

/// Faction the actor's ballot counts toward. Undealt roles side with town.
fn actor_side(game: &GameEntity, actor: i64) -> Faction {
    game.player_index(actor)
        .and_then(|index| game.players[index].role)
        .map(|role| role.faction())
        .unwrap_or(Faction::Peace)
}

/// Living peace-side and mafia-side head counts.
fn living_sides(game: &GameEntity) -> (usize, usize) {
    let mut peace = 0;
    let mut mafia = 0;
    for player in game.players.iter().filter(|player| player.alive) {
        match player.role.map(|role| role.faction()) {
            Some(Faction::Mafia) => mafia += 1,
            _ => peace += 1,
        }
    }
    (peace, mafia)
}

fn require_living(game: &GameEntity, actor: i64) -> Result<(), ServiceError> {
    if game.player_index(actor).is_none() {
        return Err(RejectReason::NotAParticipant.into());
    }
    if !game.is_living_participant(actor) {
        return Err(RejectReason::NotAlive.into());
    }
    Ok(())
}
