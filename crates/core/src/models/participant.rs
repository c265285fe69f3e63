//! Participant model and the half-drink counter

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use super::UserIdentity;

/// A non-negative drink tally with half-drink granularity.
///
/// Stored as a count of halves so the value can never go below zero or
/// drift off the 0.5 grid. On the wire and in storage it is a plain number
/// (`2`, `2.5`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Drinks(u32);

impl Drinks {
    pub const ZERO: Drinks = Drinks(0);

    pub fn from_halves(halves: u32) -> Self {
        Self(halves)
    }

    pub fn halves(self) -> u32 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 2.0
    }

    /// Round an arbitrary number onto the half grid, flooring at zero.
    /// Returns `None` for NaN or infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let halves = (value * 2.0).round().max(0.0);
        if halves > f64::from(u32::MAX) {
            return None;
        }
        Some(Self(halves as u32))
    }

    /// `max(0, round(self + delta, 0.5))`
    pub fn adjusted(self, delta: f64) -> Option<Self> {
        Self::from_f64(self.as_f64() + delta)
    }
}

impl fmt::Display for Drinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 2 == 0 {
            write!(f, "{}", self.0 / 2)
        } else {
            write!(f, "{}.5", self.0 / 2)
        }
    }
}

impl Serialize for Drinks {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 % 2 == 0 {
            serializer.serialize_u32(self.0 / 2)
        } else {
            serializer.serialize_f64(self.as_f64())
        }
    }
}

impl<'de> Deserialize<'de> for Drinks {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if value < 0.0 {
            return Err(serde::de::Error::custom(format!(
                "drink count must not be negative, got {}",
                value
            )));
        }
        Drinks::from_f64(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid drink count {}", value)))
    }
}

/// One row of the tally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    /// Display name shown in the leaderboard and the export
    pub name: String,
    /// Linked account, absent for manually added guests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub drinks: Drinks,
}

impl Participant {
    /// A guest added by name, not linked to any account
    pub fn guest(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            username: None,
            drinks: Drinks::ZERO,
        }
    }

    /// A participant joining under their own identity
    pub fn for_identity(identity: &UserIdentity) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: identity.display_name.clone(),
            username: Some(identity.username.clone()),
            drinks: Drinks::ZERO,
        }
    }

    pub fn is_user(&self, username: &str) -> bool {
        self.username.as_deref() == Some(username)
    }
}
