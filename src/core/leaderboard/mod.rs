// src/core/leaderboard/mod.rs

//! The leaderboard query service consumed by the informational commands.
//!
//! Implementations answer with ready-to-send chat text. Network trouble must
//! be reported as a [`QueryFailure`] carrying a readable message; anything
//! else (for example a payload in an unexpected shape) is `Unexpected`.
//!
//! [`QueryFailure`]: crate::core::QueryFailure

pub mod speedrun;

use crate::core::RelayError;
use crate::core::commands::place::Place;
use async_trait::async_trait;

pub use speedrun::SpeedrunCom;

#[async_trait]
pub trait Leaderboard: Send + Sync {
    /// Describes the run holding `place`, or says nobody holds it.
    async fn rank_lookup(&self, place: Place) -> Result<String, RelayError>;

    /// Describes the personal best of `user`. `user` has already been
    /// checked to be a plain word.
    async fn user_lookup(&self, user: &str) -> Result<String, RelayError>;

    /// Describes the most recently dated run on the leaderboard.
    async fn latest_run(&self) -> Result<String, RelayError>;

    /// Whether the leaderboard backend is reachable.
    async fn up_check(&self) -> bool;
}

/// Formats a run time in seconds the way the leaderboard displays it:
/// `MM:SS`, with hours and milliseconds only when present.
pub fn format_run_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let (hours, rem) = (total_ms / 3_600_000, total_ms % 3_600_000);
    let (minutes, rem) = (rem / 60_000, rem % 60_000);
    let (secs, millis) = (rem / 1000, rem % 1000);

    let mut out = if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    };
    if millis > 0 {
        out.push_str(&format!(".{millis:03}"));
    }
    out
}
