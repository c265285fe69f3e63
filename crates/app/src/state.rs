//! Application state management

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use nightcap_core::dice::FRAME_INTERVAL;
use nightcap_core::{
    identity, CooldownStatus, Error, IdentityCache, Result, Session, Storage, Tracker,
    UserIdentity,
};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Config;

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "nightcap", "nightcap").ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine data directory",
        ))
    })
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("nightcap.toml"))
}

pub fn default_database_path() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().join("nightcap.db"))
}

/// Everything one console client works with
pub struct AppState<R> {
    pub tracker: Tracker<R>,
    cache: IdentityCache,
    cooldown: watch::Receiver<CooldownStatus>,
    pub export_dir: PathBuf,
    pub history_limit: u32,
    /// Delay between dice frames
    pub frame_interval: Duration,
    /// Last history listing, so `export N` can name an entry
    pub history: Vec<Session>,
}

impl<R: Storage> AppState<R> {
    pub fn new(
        tracker: Tracker<R>,
        cache: IdentityCache,
        cooldown: watch::Receiver<CooldownStatus>,
        config: &Config,
    ) -> Self {
        Self {
            tracker,
            cache,
            cooldown,
            export_dir: config.export_dir(),
            history_limit: config.client.history_limit,
            frame_interval: FRAME_INTERVAL,
            history: Vec::new(),
        }
    }

    /// Pick up the identity remembered on this device, if any
    pub fn restore_identity(&mut self) {
        match self.cache.load() {
            Ok(Some(user)) => {
                info!(username = %user.username, "Restored identity");
                self.tracker.set_identity(Some(user));
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Ignoring unreadable identity cache"),
        }
    }

    pub fn identity(&self) -> Option<&UserIdentity> {
        self.tracker.identity()
    }

    pub fn login(&mut self, username: &str) -> Result<UserIdentity> {
        let user = identity::login(self.tracker.repo(), username)?;
        self.remember(user)
    }

    pub fn register(&mut self, username: &str, display_name: &str) -> Result<UserIdentity> {
        let user = identity::register(self.tracker.repo(), username, display_name)?;
        self.remember(user)
    }

    fn remember(&mut self, user: UserIdentity) -> Result<UserIdentity> {
        self.cache.save(&user)?;
        self.tracker.set_identity(Some(user.clone()));
        Ok(user)
    }

    pub fn logout(&mut self) -> Result<()> {
        self.cache.clear()?;
        self.tracker.set_identity(None);
        Ok(())
    }

    /// Latest status published by the cooldown ticker
    pub fn cooldown(&self) -> CooldownStatus {
        *self.cooldown.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightcap_core::{Database, SessionMirror};

    fn state(dir: &std::path::Path) -> AppState<Database> {
        let tracker = Tracker::new(Database::open_in_memory().unwrap(), SessionMirror::new());
        let cache = IdentityCache::with_path(dir.join("identity.json"));
        let (_tx, rx) = watch::channel(CooldownStatus::IDLE);
        AppState::new(tracker, cache, rx, &Config::default())
    }

    #[test]
    fn test_login_survives_restart_until_logout() {
        let dir = tempfile::tempdir().unwrap();

        let mut first = state(dir.path());
        first.register("Ann", "Ann A").unwrap();
        assert_eq!(first.identity().map(|u| u.username.as_str()), Some("ann"));

        let mut second = state(dir.path());
        second.restore_identity();
        assert_eq!(second.identity().map(|u| u.display_name.as_str()), Some("Ann A"));

        second.logout().unwrap();
        assert!(second.identity().is_none());

        let mut third = state(dir.path());
        third.restore_identity();
        assert!(third.identity().is_none());
    }

    #[test]
    fn test_failed_login_keeps_previous_identity() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = state(dir.path());
        app.register("ann", "Ann").unwrap();

        assert!(matches!(app.login("ghost"), Err(Error::NotFound(_))));
        assert_eq!(app.identity().map(|u| u.username.as_str()), Some("ann"));
    }
}
