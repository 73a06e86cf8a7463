//! Pure game rules: roles and deck arithmetic, the stage graph, vote
//! resolution, poll quorums, and the win condition. Nothing in here touches
//! storage or transport.

/// Poll kinds and quorum arithmetic.
pub mod poll;
/// Role set and deck construction.
pub mod role;
/// Stage graph and completion predicates.
pub mod stage;
/// Day-vote resolution.
pub mod vote;

use crate::dao::models::PlayerEntity;
use crate::game::role::Faction;

/// Terminal condition over the current roster, if one is reached.
///
/// Peace wins once the mafia side is eliminated; mafia wins once it matches
/// or outnumbers the rest of the living players.
pub fn winner(players: &[PlayerEntity]) -> Option<Faction> {
    let mut mafia = 0usize;
    let mut peace = 0usize;
    let mut undealt = 0usize;
    for player in players.iter().filter(|player| player.alive) {
        match player.role.map(|role| role.faction()) {
            Some(Faction::Mafia) => mafia += 1,
            Some(Faction::Peace) => peace += 1,
            // Undealt roles count as town, and while any card is still in
            // the deck the mafia cannot be declared eliminated.
            None => {
                peace += 1;
                undealt += 1;
            }
        }
    }

    if mafia == 0 && undealt == 0 {
        Some(Faction::Peace)
    } else if mafia >= peace {
        Some(Faction::Mafia)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::role::Role;

    fn player(id: i64, role: Role, alive: bool) -> PlayerEntity {
        PlayerEntity {
            id,
            name: format!("p{id}"),
            full_name: format!("Player {id}"),
            alive,
            role: Some(role),
        }
    }

    #[test]
    fn no_winner_while_mafia_is_outnumbered() {
        let players = vec![
            player(1, Role::Don, true),
            player(2, Role::Mafia, true),
            player(3, Role::Sheriff, true),
            player(4, Role::Peace, true),
            player(5, Role::Peace, true),
        ];
        assert_eq!(winner(&players), None);
    }

    #[test]
    fn peace_wins_when_mafia_side_is_gone() {
        let players = vec![
            player(1, Role::Don, false),
            player(2, Role::Mafia, false),
            player(3, Role::Sheriff, true),
            player(4, Role::Peace, true),
        ];
        assert_eq!(winner(&players), Some(Faction::Peace));
    }

    #[test]
    fn mafia_wins_on_parity() {
        let players = vec![
            player(1, Role::Don, true),
            player(2, Role::Mafia, true),
            player(3, Role::Sheriff, true),
            player(4, Role::Peace, true),
            player(5, Role::Peace, false),
        ];
        assert_eq!(winner(&players), Some(Faction::Mafia));
    }
}
