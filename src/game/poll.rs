use serde::{Deserialize, Serialize};

/// Kind of chat-wide meta-vote. At most one poll of each kind per chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollKind {
    /// End the game without a winner.
    End,
    /// Skip the current stage.
    Skip,
}

impl PollKind {
    /// Stable string tag used in persisted documents and store predicates.
    pub const fn as_str(self) -> &'static str {
        match self {
            PollKind::End => "end",
            PollKind::Skip => "skip",
        }
    }
}

/// Running count and threshold for one side of a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideTally {
    /// Ballots recorded so far.
    pub count: u32,
    /// Threshold derived from the side's live head count at creation.
    pub required: u32,
}

/// Quorum bookkeeping for a poll.
///
/// Polls opened while roles are known split the quorum by faction; polls
/// opened during the deal pool everyone together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollTally {
    /// Single threshold over all players.
    Pooled {
        /// Ballots recorded so far.
        count: u32,
        /// Two thirds of the player count.
        required: u32,
    },
    /// Independent thresholds per faction.
    Split {
        /// Town side; resolves once `count` reaches `required`.
        peace: SideTally,
        /// Mafia side; resolves only once `count` strictly exceeds `required`.
        mafia: SideTally,
    },
}

impl PollTally {
    /// Pooled tally for `players` participants with one ballot pre-counted.
    pub fn pooled(players: usize) -> Self {
        PollTally::Pooled {
            count: 1,
            required: two_thirds(players),
        }
    }

    /// Split tally for the given live head counts with the creator's ballot
    /// pre-counted on their own side.
    pub fn split(peace_alive: usize, mafia_alive: usize, creator_is_mafia: bool) -> Self {
        PollTally::Split {
            peace: SideTally {
                count: u32::from(!creator_is_mafia),
                required: two_thirds(peace_alive),
            },
            mafia: SideTally {
                count: u32::from(creator_is_mafia),
                required: two_thirds(mafia_alive),
            },
        }
    }

    /// Whether every relevant threshold has been met.
    ///
    /// The comparison is asymmetric on purpose: the mafia side must strictly
    /// exceed its threshold while the peace side only needs to reach it.
    pub fn satisfied(&self) -> bool {
        match self {
            PollTally::Pooled { count, required } => count >= required,
            PollTally::Split { peace, mafia } => {
                peace.count >= peace.required && mafia.count > mafia.required
            }
        }
    }
}

/// Two thirds of `total`, rounded down.
fn two_thirds(total: usize) -> u32 {
    (2 * total / 3) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pooled_threshold_is_two_thirds_of_everyone() {
        let tally = PollTally::pooled(9);
        assert_eq!(
            tally,
            PollTally::Pooled {
                count: 1,
                required: 6
            }
        );
        assert!(!tally.satisfied());
        assert!(
            PollTally::Pooled {
                count: 6,
                required: 6
            }
            .satisfied()
        );
    }

    #[test]
    fn split_quorum_is_asymmetric() {
        // 9 live players partitioned 3 mafia / 6 peace.
        let base = PollTally::split(6, 3, false);
        let PollTally::Split { peace, mafia } = base else {
            panic!("expected split tally");
        };
        assert_eq!(peace.required, 4);
        assert_eq!(mafia.required, 2);

        // Peace resolves at >= 4, mafia only at > 2 (i.e. >= 3).
        let met = |peace_count, mafia_count| {
            PollTally::Split {
                peace: SideTally {
                    count: peace_count,
                    required: 4,
                },
                mafia: SideTally {
                    count: mafia_count,
                    required: 2,
                },
            }
            .satisfied()
        };
        assert!(!met(4, 2));
        assert!(!met(3, 3));
        assert!(met(4, 3));
        assert!(met(6, 3));
    }

    #[test]
    fn creator_ballot_lands_on_their_side() {
        let PollTally::Split { peace, mafia } = PollTally::split(6, 3, true) else {
            panic!("expected split tally");
        };
        assert_eq!(peace.count, 0);
        assert_eq!(mafia.count, 1);
    }
}
