use crate::dao::models::GameEntity;
use crate::game::role::Role;

/// Phase of the game cycle, stored as a small signed code.
///
/// Negative stages are one-off setup phases, `0`/`1` are the day phases, and
/// higher positive codes are the sequential night check phases. Code `-2` is
/// reserved: completing the deal jumps straight from `-3` to `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Cards are being drawn; ends only once every player holds a role.
    Dealing,
    /// The don submits the kill order and ends the stage explicitly.
    DonOrder,
    /// Open day discussion.
    Discussion,
    /// Day lynch vote.
    Vote,
    /// Night: the don looks for the sheriff.
    DonCheck,
    /// Night: the sheriff looks for the mafia.
    SheriffCheck,
}

/// Where a stage transition lands, and whether it closes a full day cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextStage {
    /// Stage entered by the transition.
    pub stage: Stage,
    /// True when the transition wraps back to the day start.
    pub wraps_day: bool,
}

impl Stage {
    /// Stored stage code for this phase.
    pub const fn code(self) -> i32 {
        match self {
            Stage::Dealing => -3,
            Stage::DonOrder => -1,
            Stage::Discussion => 0,
            Stage::Vote => 1,
            Stage::DonCheck => 2,
            Stage::SheriffCheck => 3,
        }
    }

    /// Decode a stored stage code. Unknown codes are an invariant violation
    /// for the caller to surface.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -3 => Some(Stage::Dealing),
            -1 => Some(Stage::DonOrder),
            0 => Some(Stage::Discussion),
            1 => Some(Stage::Vote),
            2 => Some(Stage::DonCheck),
            3 => Some(Stage::SheriffCheck),
            _ => None,
        }
    }

    /// Successor in the stage graph.
    ///
    /// Dealing skips the reserved `-2` slot and advances by two codes at
    /// once; the last night check wraps back to discussion and closes the
    /// day cycle.
    pub const fn next(self) -> NextStage {
        let (stage, wraps_day) = match self {
            Stage::Dealing => (Stage::DonOrder, false),
            Stage::DonOrder => (Stage::Discussion, false),
            Stage::Discussion => (Stage::Vote, false),
            Stage::Vote => (Stage::DonCheck, false),
            Stage::DonCheck => (Stage::SheriffCheck, false),
            Stage::SheriffCheck => (Stage::Discussion, true),
        };
        NextStage { stage, wraps_day }
    }

    /// Whether meta-polls (end / skip) may be opened during this stage.
    pub const fn allows_polls(self) -> bool {
        matches!(self, Stage::Dealing | Stage::Discussion)
    }

    /// Role whose holder acts during this stage, if it is a check stage.
    pub const fn checking_role(self) -> Option<Role> {
        match self {
            Stage::DonCheck => Some(Role::Don),
            Stage::SheriffCheck => Some(Role::Sheriff),
            _ => None,
        }
    }

    /// Whether every action required to close this stage has been taken.
    ///
    /// Stages that only end on a deadline (or an explicit trigger) never
    /// report completion here.
    pub fn completed(self, game: &GameEntity) -> bool {
        match self {
            Stage::Dealing => game.all_roles_dealt(),
            Stage::DonOrder | Stage::Discussion => false,
            Stage::Vote => game
                .players
                .iter()
                .filter(|player| player.alive)
                .all(|player| game.played.contains(&player.id)),
            Stage::DonCheck | Stage::SheriffCheck => {
                // A dead holder leaves the stage to run out its deadline.
                let role = match self.checking_role() {
                    Some(role) => role,
                    None => return false,
                };
                match game.living_holder(role) {
                    Some(holder) => game.played.contains(&holder.id),
                    None => false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for stage in [
            Stage::Dealing,
            Stage::DonOrder,
            Stage::Discussion,
            Stage::Vote,
            Stage::DonCheck,
            Stage::SheriffCheck,
        ] {
            assert_eq!(Stage::from_code(stage.code()), Some(stage));
        }
        assert_eq!(Stage::from_code(-2), None);
        assert_eq!(Stage::from_code(4), None);
    }

    #[test]
    fn dealing_advances_by_two_codes() {
        let next = Stage::Dealing.next();
        assert_eq!(next.stage, Stage::DonOrder);
        assert_eq!(next.stage.code() - Stage::Dealing.code(), 2);
        assert!(!next.wraps_day);
    }

    #[test]
    fn day_cycle_wraps_after_sheriff_check() {
        assert_eq!(Stage::Discussion.next().stage, Stage::Vote);
        assert_eq!(Stage::Vote.next().stage, Stage::DonCheck);
        assert_eq!(Stage::DonCheck.next().stage, Stage::SheriffCheck);
        let wrap = Stage::SheriffCheck.next();
        assert_eq!(wrap.stage, Stage::Discussion);
        assert!(wrap.wraps_day);
    }

    #[test]
    fn polls_are_legal_only_while_dealing_or_discussing() {
        assert!(Stage::Dealing.allows_polls());
        assert!(Stage::Discussion.allows_polls());
        assert!(!Stage::Vote.allows_polls());
        assert!(!Stage::DonCheck.allows_polls());
    }
}
