//! The server's no-play timeout: a per-prompt deadline that gets refreshed
//! every time a prompt is (re-)issued, and checked against the wait
//! primitive's shared timer.

use std::time::Duration;

use tokio::time::Instant;

/// Server-configurable no-play timeout, default 5 seconds.
#[derive(Debug, Clone, Copy)]
pub struct NoPlayTimeout(pub Duration);

impl Default for NoPlayTimeout {
    fn default() -> Self {
        Self(Duration::from_secs(5))
    }
}

/// The deadline for the currently outstanding prompt, if any.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn after(timeout: NoPlayTimeout) -> Self {
        Self(Some(Instant::now() + timeout.0))
    }

    /// An expired deadline — the next `select!` round should act immediately.
    pub fn now() -> Self {
        Self(Some(Instant::now()))
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }

    /// The instant the loop's timer branch should wake at, or a distant
    /// future instant when there is nothing to wait for (so the branch is
    /// effectively parked without needing an `Option` in the `select!`).
    pub fn instant_or_far_future(&self) -> Instant {
        self.0.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600))
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }
}
