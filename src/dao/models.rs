use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::game::poll::{PollKind, PollTally};
use crate::game::role::Role;

/// One participant of a game, positionally referenced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Actor identity in the chat platform.
    pub id: i64,
    /// Short display name (handle).
    pub name: String,
    /// Full display name.
    pub full_name: String,
    /// Whether the player is still in the game.
    pub alive: bool,
    /// Revealed role; unset until the player draws their card. Write-once.
    pub role: Option<Role>,
}

/// Aggregate game document persisted by the storage layer.
///
/// One document per active game, keyed by chat. Positions are 1-based
/// ("player #3"); position `0` in the vote map encodes an abstention.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Chat the game runs in; unique active-game key.
    pub chat: i64,
    /// Current stage code (see [`crate::game::stage::Stage`]).
    pub stage: i32,
    /// Full day cycles completed so far.
    pub day_count: u32,
    /// Participants in the order fixed at game start.
    pub players: Vec<PlayerEntity>,
    /// Shuffled deck, same length as `players`, indexed by position.
    pub cards: Vec<Role>,
    /// Don's designated kill order (positions); empty means improvised.
    pub order: Vec<u32>,
    /// Target position (stringified) to the set of voter positions.
    pub vote: IndexMap<String, Vec<u32>>,
    /// Actors that consumed their one action in the current stage.
    pub played: Vec<i64>,
    /// Deadline after which the sweep force-advances the stage.
    pub next_stage_time: Option<SystemTime>,
    /// Transport id of the published card-draw roster message.
    pub roster_message: Option<i64>,
}

impl GameEntity {
    /// Fresh game in the dealing stage for an ordered roster and deck.
    pub fn new(chat: i64, players: Vec<PlayerEntity>, cards: Vec<Role>) -> Self {
        Self {
            chat,
            stage: crate::game::stage::Stage::Dealing.code(),
            day_count: 0,
            players,
            cards,
            order: Vec::new(),
            vote: IndexMap::new(),
            played: Vec::new(),
            next_stage_time: None,
            roster_message: None,
        }
    }

    /// Zero-based index of the participant with this actor id.
    pub fn player_index(&self, id: i64) -> Option<usize> {
        self.players.iter().position(|player| player.id == id)
    }

    /// 1-based position of the participant with this actor id.
    pub fn player_position(&self, id: i64) -> Option<u32> {
        self.player_index(id).map(|index| index as u32 + 1)
    }

    /// Participant at a 1-based position.
    pub fn player_at(&self, position: u32) -> Option<&PlayerEntity> {
        if position == 0 {
            return None;
        }
        self.players.get(position as usize - 1)
    }

    /// Whether this actor is a living participant.
    pub fn is_living_participant(&self, id: i64) -> bool {
        self.players
            .iter()
            .any(|player| player.id == id && player.alive)
    }

    /// Living holder of a role, if any.
    pub fn living_holder(&self, role: Role) -> Option<&PlayerEntity> {
        self.players
            .iter()
            .find(|player| player.alive && player.role == Some(role))
    }

    /// Whether every player has drawn their card.
    pub fn all_roles_dealt(&self) -> bool {
        self.players.iter().all(|player| player.role.is_some())
    }

    /// 1-based positions of players still waiting to draw.
    pub fn undealt_positions(&self) -> Vec<u32> {
        self.players
            .iter()
            .enumerate()
            .filter(|(_, player)| player.role.is_none())
            .map(|(index, _)| index as u32 + 1)
            .collect()
    }
}

/// Chat-wide meta-vote document, keyed by `(chat, kind)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollEntity {
    /// Chat the poll belongs to.
    pub chat: i64,
    /// Poll kind; at most one open poll of each kind per chat.
    pub kind: PollKind,
    /// Actor who opened the poll. Their ballot is pre-counted.
    pub creator: i64,
    /// Whether the quorum is split by faction.
    pub check_roles: bool,
    /// Actors who already voted; guards against double counting.
    pub votes: Vec<i64>,
    /// Running counts and thresholds.
    pub tally: PollTally,
}
