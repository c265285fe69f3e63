//! Mutation pipeline
//!
//! Every state change goes through here. A mutation is a pure function from
//! the full participant list to a full new list; the result is written back
//! as one whole-record replace. There is no per-field patch and no version
//! check, so two clients committing from the same snapshot overwrite each
//! other and the last write wins.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::invariants::assert_participant_invariants;
use crate::mirror::SessionMirror;
use crate::models::{Participant, Session, SessionUpdate, UserIdentity};
use crate::storage::SessionRepository;

/// Run a transform against a participant list
pub fn apply_mutation<F>(people: &[Participant], transform: F) -> Result<Vec<Participant>>
where
    F: FnOnce(&[Participant]) -> Result<Vec<Participant>>,
{
    let next = transform(people)?;
    assert_participant_invariants(&next);
    Ok(next)
}

/// Append the acting identity. Rejected if that username already has an
/// entry.
pub fn join(people: &[Participant], identity: &UserIdentity) -> Result<Vec<Participant>> {
    if people.iter().any(|p| p.is_user(&identity.username)) {
        return Err(Error::PermissionDenied(format!(
            "{} is already in this session",
            identity.username
        )));
    }
    let mut next = people.to_vec();
    next.push(Participant::for_identity(identity));
    Ok(next)
}

/// Append a guest by name
pub fn add_guest(people: &[Participant], name: &str) -> Result<Vec<Participant>> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidOperation("name must not be empty".into()));
    }
    let mut next = people.to_vec();
    next.push(Participant::guest(name.to_string()));
    Ok(next)
}

pub fn remove(people: &[Participant], person_id: Uuid) -> Result<Vec<Participant>> {
    if !people.iter().any(|p| p.id == person_id) {
        return Err(Error::NotFound(format!("participant {}", person_id)));
    }
    Ok(people.iter().filter(|p| p.id != person_id).cloned().collect())
}

/// `drinks = max(0, round(drinks + delta, 0.5))` for one participant
pub fn adjust(people: &[Participant], person_id: Uuid, delta: f64) -> Result<Vec<Participant>> {
    if !delta.is_finite() {
        return Err(Error::InvalidOperation(format!("invalid delta {}", delta)));
    }
    let mut found = false;
    let next = people
        .iter()
        .map(|p| {
            if p.id != person_id {
                return Ok(p.clone());
            }
            found = true;
            let drinks = p
                .drinks
                .adjusted(delta)
                .ok_or_else(|| Error::InvalidOperation(format!("invalid delta {}", delta)))?;
            Ok(Participant {
                drinks,
                ..p.clone()
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if !found {
        return Err(Error::NotFound(format!("participant {}", person_id)));
    }
    Ok(next)
}

/// Write a full new snapshot and, on success, replace the mirror with it.
///
/// `base` is the session the new list was derived from. When present, all
/// its mutable fields are overwritten in one update keyed by its id, so a
/// base archived in the meantime fails instead of spawning a new session.
/// Without a base a new current session is inserted. On failure the error
/// is logged and returned and the mirror is untouched.
pub fn commit<R: SessionRepository + ?Sized>(
    repo: &R,
    mirror: &SessionMirror,
    base: Option<&Session>,
    people: Vec<Participant>,
    last_roll_time: Option<DateTime<Utc>>,
) -> Result<Session> {
    let committed = match base {
        Some(session) => {
            let update = SessionUpdate {
                people,
                last_updated: Utc::now(),
                last_roll_time,
            };
            repo.update_session(session.id, &update)
                .map(|()| session.with_update(&update))
        }
        None => {
            let session = Session::new_current(people, last_roll_time);
            info!(session_id = %session.id, "Creating current session");
            repo.insert_session(&session)
        }
    };

    match committed {
        Ok(session) => {
            debug!(session_id = %session.id, people = session.people.len(), "Snapshot committed");
            mirror.replace(session.clone());
            Ok(session)
        }
        Err(e) => {
            error!(error = %e, "Failed to commit session snapshot");
            Err(e)
        }
    }
}
