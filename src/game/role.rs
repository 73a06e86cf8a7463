use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Card a player can hold during a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Ordinary townsperson with no night action.
    Peace,
    /// Rank-and-file mafia member.
    Mafia,
    /// Mafia leader; checks one player per night and sets the kill order.
    Don,
    /// Town investigator; checks one player per night.
    Sheriff,
}

impl Role {
    /// Stable string tag used in persisted documents and store predicates.
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Peace => "peace",
            Role::Mafia => "mafia",
            Role::Don => "don",
            Role::Sheriff => "sheriff",
        }
    }

    /// Side this role wins with.
    pub const fn faction(self) -> Faction {
        match self {
            Role::Mafia | Role::Don => Faction::Mafia,
            Role::Peace | Role::Sheriff => Faction::Peace,
        }
    }
}

/// The two sides competing in a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    /// Town side: peace players plus the sheriff.
    Peace,
    /// Mafia side: mafia players plus the don.
    Mafia,
}

/// Number of plain mafia cards dealt for `players` participants.
///
/// The don is dealt separately, so the mafia side ends up with
/// `players / 3` members in total.
pub fn mafia_count(players: usize) -> usize {
    (players / 3).saturating_sub(1)
}

/// Build the shuffled deck for `players` participants.
///
/// The deck always contains exactly one don, one sheriff, [`mafia_count`]
/// mafia cards, and peace cards for the remainder; its length equals
/// `players`.
pub fn build_deck(players: usize) -> Vec<Role> {
    let mafia = mafia_count(players);
    let mut deck = Vec::with_capacity(players);
    deck.push(Role::Don);
    deck.push(Role::Sheriff);
    deck.extend(std::iter::repeat_n(Role::Mafia, mafia));
    deck.extend(std::iter::repeat_n(Role::Peace, players - deck.len()));

    let mut rng = rand::rng();
    deck.shuffle(&mut rng);
    deck
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(deck: &[Role], role: Role) -> usize {
        deck.iter().filter(|card| **card == role).count()
    }

    #[test]
    fn deck_composition_holds_for_all_sizes() {
        for players in 4..=30 {
            let deck = build_deck(players);
            assert_eq!(deck.len(), players, "deck length for {players} players");
            assert_eq!(count(&deck, Role::Don), 1);
            assert_eq!(count(&deck, Role::Sheriff), 1);
            assert_eq!(count(&deck, Role::Mafia), players / 3 - 1);
            assert_eq!(
                count(&deck, Role::Peace),
                players - 2 - (players / 3 - 1),
            );
        }
    }

    #[test]
    fn nine_player_deck_has_two_mafia_and_five_peace() {
        let deck = build_deck(9);
        assert_eq!(count(&deck, Role::Mafia), 2);
        assert_eq!(count(&deck, Role::Don), 1);
        assert_eq!(count(&deck, Role::Sheriff), 1);
        assert_eq!(count(&deck, Role::Peace), 5);
    }

    #[test]
    fn factions_split_roles_as_expected() {
        assert_eq!(Role::Don.faction(), Faction::Mafia);
        assert_eq!(Role::Mafia.faction(), Faction::Mafia);
        assert_eq!(Role::Sheriff.faction(), Faction::Peace);
        assert_eq!(Role::Peace.faction(), Faction::Peace);
    }
}
