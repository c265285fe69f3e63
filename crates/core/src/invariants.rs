//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use std::collections::HashSet;

use crate::models::{Participant, Session};

/// Validate that a session record is internally consistent
pub fn assert_session_invariants(session: &Session) {
    // Current and archived are mutually exclusive
    debug_assert!(
        !(session.is_current && session.archived_at.is_some()),
        "Session {} is current but has archived_at {:?}",
        session.id,
        session.archived_at
    );

    assert_participant_invariants(&session.people);
}

/// Validate a participant list: unique ids, each username at most once
pub fn assert_participant_invariants(people: &[Participant]) {
    let mut ids = HashSet::new();
    let mut usernames = HashSet::new();

    for person in people {
        debug_assert!(
            ids.insert(person.id),
            "Participant id {} appears more than once",
            person.id
        );

        if let Some(username) = &person.username {
            debug_assert!(
                usernames.insert(username.as_str()),
                "Username {} appears in more than one participant",
                username
            );
        }
    }
}

/// Validate that the store holds at most one current session
pub fn assert_single_current(current_count: u32) {
    debug_assert!(
        current_count <= 1,
        "{} sessions are flagged current, expected 0 or 1",
        current_count
    );
}
