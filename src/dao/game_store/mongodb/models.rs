use indexmap::IndexMap;
use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::{GameEntity, PlayerEntity, PollEntity};
use crate::game::poll::{PollKind, PollTally};
use crate::game::role::Role;

/// Game document as stored in the `games` collection, keyed by chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    chat: i64,
    stage: i32,
    day_count: u32,
    players: Vec<PlayerEntity>,
    cards: Vec<Role>,
    order: Vec<u32>,
    vote: IndexMap<String, Vec<u32>>,
    played: Vec<i64>,
    next_stage_time: Option<DateTime>,
    #[serde(default)]
    roster_message: Option<i64>,
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            chat: value.chat,
            stage: value.stage,
            day_count: value.day_count,
            players: value.players,
            cards: value.cards,
            order: value.order,
            vote: value.vote,
            played: value.played,
            next_stage_time: value.next_stage_time.map(DateTime::from_system_time),
            roster_message: value.roster_message,
        }
    }
}

impl From<MongoGameDocument> for GameEntity {
    fn from(value: MongoGameDocument) -> Self {
        Self {
            chat: value.chat,
            stage: value.stage,
            day_count: value.day_count,
            players: value.players,
            cards: value.cards,
            order: value.order,
            vote: value.vote,
            played: value.played,
            next_stage_time: value.next_stage_time.map(DateTime::to_system_time),
            roster_message: value.roster_message,
        }
    }
}

/// Poll document as stored in the `polls` collection, keyed by
/// `"{chat}:{kind}"` so the unique `_id` enforces one poll per kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPollDocument {
    #[serde(rename = "_id")]
    id: String,
    chat: i64,
    kind: PollKind,
    creator: i64,
    check_roles: bool,
    votes: Vec<i64>,
    tally: PollTally,
}

impl From<PollEntity> for MongoPollDocument {
    fn from(value: PollEntity) -> Self {
        Self {
            id: poll_id(value.chat, value.kind),
            chat: value.chat,
            kind: value.kind,
            creator: value.creator,
            check_roles: value.check_roles,
            votes: value.votes,
            tally: value.tally,
        }
    }
}

impl From<MongoPollDocument> for PollEntity {
    fn from(value: MongoPollDocument) -> Self {
        Self {
            chat: value.chat,
            kind: value.kind,
            creator: value.creator,
            check_roles: value.check_roles,
            votes: value.votes,
            tally: value.tally,
        }
    }
}

pub fn poll_id(chat: i64, kind: PollKind) -> String {
    format!("{chat}:{}", kind.as_str())
}

pub fn game_id(chat: i64) -> Document {
    doc! {"_id": chat}
}

pub fn poll_doc_id(chat: i64, kind: PollKind) -> Document {
    doc! {"_id": poll_id(chat, kind)}
}
