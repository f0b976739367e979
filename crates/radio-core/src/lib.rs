//! Controller core for a single-board internet radio.
//!
//! Button sampling, the persisted station catalog and the playback session
//! live here.  Nothing in this crate touches real hardware, the network or an
//! async runtime; those collaborators are reached through the traits in
//! [`input`], [`engine`], [`catalog`] and [`session`].

pub mod assets;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod input;
pub mod platform;
pub mod protocol;
pub mod session;
pub mod throttle;
pub mod wifi;

pub use catalog::{Station, StationCatalog};
pub use protocol::Intent;
pub use session::PlaybackSession;
