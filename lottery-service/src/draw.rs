//! Winner selection.

use rand::Rng;

/// How many invitations a draw issues: the free seats, capped by the
/// number of people waiting. `None` capacity means everyone waiting wins.
pub fn invite_count(max_attendees: Option<u32>, issued_invites: usize, waiting: usize) -> usize {
    match max_attendees {
        Some(max) => (max as usize).saturating_sub(issued_invites).min(waiting),
        None => waiting,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub winners: Vec<String>,
    /// Everyone not selected, in waiting-list order.
    pub remaining: Vec<String>,
}

/// Picks `count` entries uniformly at random without replacement.
///
/// Partial Fisher–Yates over positions, so duplicate user ids in the
/// waiting list are treated as separate entries.
pub fn select_winners<R: Rng + ?Sized>(waiting_list: &[String], count: usize, rng: &mut R) -> Selection {
    let count = count.min(waiting_list.len());
    let mut positions: Vec<usize> = (0..waiting_list.len()).collect();

    for i in 0..count {
        let j = rng.gen_range(i..positions.len());
        positions.swap(i, j);
    }

    let mut chosen = vec![false; waiting_list.len()];
    let winners = positions[..count]
        .iter()
        .map(|&p| {
            chosen[p] = true;
            waiting_list[p].clone()
        })
        .collect();

    let remaining = waiting_list
        .iter()
        .zip(&chosen)
        .filter(|(_, &picked)| !picked)
        .map(|(user, _)| user.clone())
        .collect();

    Selection { winners, remaining }
}
