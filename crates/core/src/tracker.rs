//! Client-side session tracker
//!
//! Ties one client's mirror, identity and repository together and exposes
//! the user-facing operations. Every mutation reads the mirror, derives a
//! full new participant list and commits it through the pipeline.
//! Authorization and precondition checks run first and never reach the
//! repository when they fail.

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cooldown::CooldownStatus;
use crate::dice::DiceRoll;
use crate::error::{Error, Result};
use crate::leader;
use crate::mirror::SessionMirror;
use crate::models::{Participant, Session, UserIdentity};
use crate::pipeline::{self, apply_mutation};
use crate::stats::UserStats;
use crate::storage::SessionRepository;

pub struct Tracker<R> {
    repo: R,
    mirror: SessionMirror,
    identity: Option<UserIdentity>,
}

impl<R: SessionRepository> Tracker<R> {
    pub fn new(repo: R, mirror: SessionMirror) -> Self {
        Self {
            repo,
            mirror,
            identity: None,
        }
    }

    /// Initial read of the current session into the mirror. Absence means
    /// no active session and an empty participant list.
    pub fn load(&self) -> Result<()> {
        match self.repo.current_session()? {
            Some(session) => {
                info!(session_id = %session.id, people = session.people.len(), "Loaded current session");
                self.mirror.replace(session);
            }
            None => {
                info!("No current session");
                self.mirror.clear();
            }
        }
        Ok(())
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn mirror(&self) -> &SessionMirror {
        &self.mirror
    }

    pub fn identity(&self) -> Option<&UserIdentity> {
        self.identity.as_ref()
    }

    pub fn set_identity(&mut self, identity: Option<UserIdentity>) {
        self.identity = identity;
    }

    pub fn people(&self) -> Vec<Participant> {
        self.mirror.people()
    }

    pub fn leader(&self) -> Option<Participant> {
        leader::leader(&self.mirror.people()).cloned()
    }

    pub fn ranking(&self) -> Vec<Participant> {
        leader::ranking(&self.mirror.people())
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn cooldown_at(&self, now: DateTime<Utc>) -> CooldownStatus {
        CooldownStatus::evaluate(self.mirror.last_roll_time(), now)
    }

    fn mutate<F>(&self, transform: F) -> Result<Session>
    where
        F: FnOnce(&[Participant]) -> Result<Vec<Participant>>,
    {
        let snapshot = self.mirror.snapshot();
        let people = snapshot.as_ref().map(|s| s.people.as_slice()).unwrap_or(&[]);
        let last_roll_time = snapshot.as_ref().and_then(|s| s.last_roll_time);
        let next = apply_mutation(people, transform)?;
        pipeline::commit(
            &self.repo,
            &self.mirror,
            snapshot.as_ref(),
            next,
            last_roll_time,
        )
    }

    fn require_identity(&self) -> Result<&UserIdentity> {
        self.identity
            .as_ref()
            .ok_or_else(|| Error::Precondition("log in or create an account first".into()))
    }

    /// Add the logged-in user to the session
    pub fn join(&self) -> Result<Session> {
        let identity = self.require_identity()?.clone();
        self.mutate(|people| pipeline::join(people, &identity))
    }

    /// Add a guest by name
    pub fn add_person(&self, name: &str) -> Result<Session> {
        self.mutate(|people| pipeline::add_guest(people, name))
    }

    pub fn remove_person(&self, person_id: Uuid) -> Result<Session> {
        self.mutate(|people| pipeline::remove(people, person_id))
    }

    pub fn adjust_drinks(&self, person_id: Uuid, delta: f64) -> Result<Session> {
        self.mutate(|people| pipeline::adjust(people, person_id, delta))
    }

    /// Check that the logged-in user may roll right now. Returns the
    /// session the check ran against.
    pub fn authorize_roll(&self, now: DateTime<Utc>) -> Result<Session> {
        let snapshot = self.mirror.snapshot();
        let status = CooldownStatus::evaluate(
            snapshot.as_ref().and_then(|s| s.last_roll_time),
            now,
        );
        if !status.can_roll() {
            return Err(Error::CooldownActive {
                remaining: status.remaining,
            });
        }

        let Some(session) = snapshot.filter(|s| !s.people.is_empty()) else {
            return Err(Error::Precondition("nobody is in the session".into()));
        };
        let may_roll = self
            .identity
            .as_ref()
            .is_some_and(|identity| leader::is_leader(&session.people, &identity.username));
        if may_roll {
            return Ok(session);
        }

        let top = leader::leader(&session.people)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        Err(Error::PermissionDenied(format!(
            "only {} (the leader) can roll the dice",
            top
        )))
    }

    /// Roll the dice now
    pub fn roll<G, F>(&self, rng: &mut G, on_frame: F) -> Result<(DiceRoll, Session)>
    where
        G: Rng + ?Sized,
        F: FnMut(u8),
    {
        self.roll_at(Utc::now(), rng, on_frame)
    }

    /// Authorize against `now`, play every frame through `on_frame`, then
    /// commit the authorized session's participant list with a fresh
    /// `last_roll_time`.
    ///
    /// Once authorized the sequence always runs to the end and commits. If
    /// the session was archived meanwhile the commit fails and nothing new
    /// is created.
    pub fn roll_at<G, F>(
        &self,
        now: DateTime<Utc>,
        rng: &mut G,
        mut on_frame: F,
    ) -> Result<(DiceRoll, Session)>
    where
        G: Rng + ?Sized,
        F: FnMut(u8),
    {
        let authorized = match self.authorize_roll(now) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Roll rejected");
                return Err(e);
            }
        };

        let roll = DiceRoll::generate(rng);
        for frame in &roll.frames {
            on_frame(*frame);
        }

        let session = pipeline::commit(
            &self.repo,
            &self.mirror,
            Some(&authorized),
            authorized.people.clone(),
            Some(Utc::now()),
        )?;
        info!(face = roll.face, "Dice rolled");
        Ok((roll, session))
    }

    /// Archive the current session and clear the local view
    pub fn archive_current(&self) -> Result<()> {
        let Some(session) = self.mirror.snapshot() else {
            return Err(Error::Precondition("there is no current session".into()));
        };

        let archived_at = Utc::now();
        if let Err(e) = self.repo.archive_session(session.id, archived_at) {
            error!(session_id = %session.id, error = %e, "Failed to archive session");
            return Err(e);
        }

        info!(session_id = %session.id, "Session archived");
        self.mirror.clear();
        Ok(())
    }

    /// End the session. Nothing to archive when nobody is in it.
    pub fn end_session(&self) -> Result<()> {
        if self.mirror.people().is_empty() {
            return Err(Error::Precondition("no active session to end".into()));
        }
        self.archive_current()
    }

    /// Archive whatever is current (if anything) and start from an empty
    /// view; the next mutation creates a fresh session
    pub fn start_new_session(&self) -> Result<()> {
        if self.mirror.is_empty() {
            return Ok(());
        }
        self.archive_current()
    }

    /// Past sessions, newest first
    pub fn history(&self, limit: u32) -> Result<Vec<Session>> {
        self.repo.archived_sessions(limit)
    }

    pub fn stats(&self, username: &str) -> Result<UserStats> {
        let archived = self.repo.all_archived_sessions()?;
        let current = self.mirror.snapshot();
        Ok(UserStats::collect(username, &archived, current.as_ref()))
    }
}
