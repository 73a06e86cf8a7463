use indexmap::IndexMap;

/// Target position reserved for abstaining.
pub const ABSTAIN: u32 = 0;

/// Deterministic result of closing a day vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LynchOutcome {
    /// The player at this position is lynched.
    Lynched(u32),
    /// No target reached a strict plurality.
    NoLynch,
}

/// Resolve the recorded day vote.
///
/// The rule is strict plurality: the non-abstain target whose voter set is
/// strictly larger than every other target's is lynched. Ties, empty votes,
/// and all-abstain votes resolve to no lynch. Total: every distribution has
/// exactly one outcome.
pub fn resolve_lynch(vote: &IndexMap<String, Vec<u32>>) -> LynchOutcome {
    let mut best: Option<(u32, usize)> = None;
    let mut tied = false;

    for (target, voters) in vote {
        let Ok(position) = target.parse::<u32>() else {
            continue;
        };
        if position == ABSTAIN || voters.is_empty() {
            continue;
        }
        match best {
            Some((_, count)) if voters.len() > count => {
                best = Some((position, voters.len()));
                tied = false;
            }
            Some((_, count)) if voters.len() == count => tied = true,
            Some(_) => {}
            None => best = Some((position, voters.len())),
        }
    }

    match best {
        Some((position, _)) if !tied => LynchOutcome::Lynched(position),
        _ => LynchOutcome::NoLynch,
    }
}

/// Per-target voter counts in recording order, abstentions included.
pub fn tally(vote: &IndexMap<String, Vec<u32>>) -> Vec<(u32, usize)> {
    vote.iter()
        .filter_map(|(target, voters)| {
            target.parse::<u32>().ok().map(|pos| (pos, voters.len()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ballot(entries: &[(u32, &[u32])]) -> IndexMap<String, Vec<u32>> {
        entries
            .iter()
            .map(|(target, voters)| (target.to_string(), voters.to_vec()))
            .collect()
    }

    #[test]
    fn strict_plurality_with_abstain() {
        // Players vote positions [2, 2, 3, 0]: two for 2, one for 3, one abstain.
        let vote = ballot(&[(2, &[1, 4]), (3, &[2]), (0, &[3])]);
        assert_eq!(resolve_lynch(&vote), LynchOutcome::Lynched(2));
        assert_eq!(tally(&vote), vec![(2, 2), (3, 1), (0, 1)]);
    }

    #[test]
    fn tie_resolves_to_no_lynch() {
        let vote = ballot(&[(2, &[1, 4]), (3, &[2, 5]), (0, &[3])]);
        assert_eq!(resolve_lynch(&vote), LynchOutcome::NoLynch);
    }

    #[test]
    fn all_abstain_resolves_to_no_lynch() {
        let vote = ballot(&[(0, &[1, 2, 3])]);
        assert_eq!(resolve_lynch(&vote), LynchOutcome::NoLynch);
    }

    #[test]
    fn empty_vote_resolves_to_no_lynch() {
        assert_eq!(resolve_lynch(&IndexMap::new()), LynchOutcome::NoLynch);
    }

    #[test]
    fn single_vote_is_enough_for_plurality() {
        let vote = ballot(&[(5, &[1])]);
        assert_eq!(resolve_lynch(&vote), LynchOutcome::Lynched(5));
    }
}
