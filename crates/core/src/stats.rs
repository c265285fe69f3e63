//! Per-user totals across past and current sessions

use std::fmt;

use crate::models::Session;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserStats {
    pub total_drinks: f64,
    pub sessions_participated: u32,
}

impl UserStats {
    /// Sum a user's drinks over every archived session plus the current one
    pub fn collect(username: &str, archived: &[Session], current: Option<&Session>) -> Self {
        let mut stats = UserStats {
            total_drinks: 0.0,
            sessions_participated: 0,
        };

        for session in archived.iter().chain(current) {
            if let Some(person) = session.people.iter().find(|p| p.is_user(username)) {
                stats.total_drinks += person.drinks.as_f64();
                stats.sessions_participated += 1;
            }
        }

        stats
    }

    pub fn average_per_session(&self) -> f64 {
        if self.sessions_participated == 0 {
            0.0
        } else {
            self.total_drinks / f64::from(self.sessions_participated)
        }
    }
}

impl fmt::Display for UserStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total drinks: {}, sessions: {}, average: {:.1}",
            self.total_drinks,
            self.sessions_participated,
            self.average_per_session()
        )
    }
}
