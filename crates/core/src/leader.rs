//! Leader resolution
//!
//! Ranking is derived fresh from the participant list on every call and is
//! never cached alongside it.

use crate::models::Participant;

/// Participants ordered by drinks, highest first.
///
/// The sort is stable, so equal counts keep insertion order: whoever was
/// added earlier ranks higher.
pub fn ranking(people: &[Participant]) -> Vec<&Participant> {
    let mut ranked: Vec<&Participant> = people.iter().collect();
    ranked.sort_by(|a, b| b.drinks.cmp(&a.drinks));
    ranked
}

/// The rank-0 participant, if anyone is in the session
pub fn leader(people: &[Participant]) -> Option<&Participant> {
    // First maximum in insertion order; same answer as ranking()[0]
    people
        .iter()
        .fold(None, |best: Option<&Participant>, p| match best {
            Some(b) if b.drinks >= p.drinks => Some(b),
            _ => Some(p),
        })
}

/// Whether `username` belongs to the current leader
pub fn is_leader(people: &[Participant], username: &str) -> bool {
    leader(people).is_some_and(|p| p.is_user(username))
}
