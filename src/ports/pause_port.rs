//! Deliberate blocking waits: retry backoff, request pacing, error cooldown.

use std::time::Duration;

pub trait PausePort: Send + Sync {
    fn pause(&self, duration: Duration);
}
