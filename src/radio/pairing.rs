//! Pairing window lifecycle.
//!
//! ```text
//!            open()                    policy satisfied / deadline / close()
//!  Closed ───────────▶ Open{deadline} ─────────────────────────────────────▶ Closed
//! ```
//!
//! The window is a plain deadline compared against the monotonic clock on
//! every poll.  The requested duration is clamped to the configured maximum,
//! so a window always closes within `max_window_ms` even when no node ever
//! shows up.

use log::info;

use crate::config::{PairingConfig, PairingPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Closed,
    Open {
        opened_ms: u64,
        deadline_ms: u64,
        admitted: u8,
    },
}

/// Why an open window closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Expired,
    /// The pairing policy's node count was reached.
    Satisfied,
    Manual,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::Satisfied => "complete",
            Self::Manual => "stopped",
        }
    }
}

pub struct PairingWindow {
    state: WindowState,
    policy: PairingPolicy,
    default_ms: u32,
    max_ms: u32,
}

impl PairingWindow {
    pub fn new(cfg: &PairingConfig) -> Self {
        Self {
            state: WindowState::Closed,
            policy: cfg.policy,
            default_ms: cfg.default_window_ms,
            max_ms: cfg.max_window_ms,
        }
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, WindowState::Open { .. })
    }

    pub fn policy(&self) -> PairingPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: PairingPolicy) {
        self.policy = policy;
    }

    /// Open (or re-arm) the window.  `None` or zero selects the default
    /// duration.  Returns the effective duration.
    pub fn open(&mut self, now_ms: u64, duration_ms: Option<u32>) -> u32 {
        let requested = duration_ms.filter(|d| *d > 0).unwrap_or(self.default_ms);
        let duration = requested.min(self.max_ms);
        self.state = WindowState::Open {
            opened_ms: now_ms,
            deadline_ms: now_ms + u64::from(duration),
            admitted: 0,
        };
        info!("pairing: window open for {} ms ({:?})", duration, self.policy);
        duration
    }

    /// Idempotent.  Returns `true` if the window was open.
    pub fn close(&mut self) -> bool {
        let was_open = self.is_open();
        self.state = WindowState::Closed;
        was_open
    }

    /// Deadline check.  Call once per tick.
    pub fn poll(&mut self, now_ms: u64) -> Option<CloseReason> {
        if let WindowState::Open { deadline_ms, .. } = self.state {
            if now_ms >= deadline_ms {
                self.state = WindowState::Closed;
                info!("pairing: window expired");
                return Some(CloseReason::Expired);
            }
        }
        None
    }

    /// Count an admitted node and close if the policy is satisfied.
    pub fn record_admission(&mut self) -> Option<CloseReason> {
        let WindowState::Open { admitted, .. } = &mut self.state else {
            return None;
        };
        *admitted = admitted.saturating_add(1);
        let done = match self.policy {
            PairingPolicy::SingleNode => true,
            PairingPolicy::ExpectedCount(n) => *admitted >= n,
            PairingPolicy::UntilTimeout => false,
        };
        if done {
            self.state = WindowState::Closed;
            info!("pairing: window closed, policy satisfied");
            return Some(CloseReason::Satisfied);
        }
        None
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        match self.state {
            WindowState::Open { deadline_ms, .. } => deadline_ms.saturating_sub(now_ms),
            WindowState::Closed => 0,
        }
    }
}
