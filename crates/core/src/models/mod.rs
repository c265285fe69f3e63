//! Data models for Nightcap

mod participant;
mod session;
mod user;

pub use participant::*;
pub use session::*;
pub use user::*;
