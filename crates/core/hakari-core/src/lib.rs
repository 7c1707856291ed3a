//! Hakari Session Core
//!
//! Per-guild voice-session lifecycle state machine for the Hakari bot:
//! at most one session per guild, a looping playback driver with a
//! bounded or unbounded cycle count, an idle-channel watchdog, and a
//! single idempotent teardown path that every end-of-session trigger
//! converges on.
//!
//! All voice I/O sits behind the [`VoiceGateway`] trait; the Discord
//! adaptor implements it on songbird, tests use an in-memory fake.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod manager;
pub mod reply;
pub mod store;

pub use config::SessionTiming;
pub use error::{HakariError, Result};
pub use gateway::VoiceGateway;
pub use manager::SessionManager;
pub use reply::{Ack, Rejection, RejectionKind};
pub use store::{Session, SessionStore};
