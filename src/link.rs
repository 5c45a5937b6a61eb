//! Uplink connection manager.
//!
//! ```text
//!                 begin            poll: connected
//!  Disconnected ─────────▶ Connecting ─────────────▶ Connected
//!      ▲   │                   │ fail / timeout          │ lost
//!      │   │ no creds          ▼                         │
//!      │   └──────────▶ Offline ◀── failures > max       │
//!      └─────────────── backoff ◀────────────────────────┘
//! ```
//!
//! Every step is a non-blocking poll against the [`WifiPort`].  Backoff and
//! the offline probe are plain deadlines on the monotonic clock.

use core::fmt;

use log::{info, warn};

use crate::app::ports::{ConfigError, ConnectPoll, StoragePort, WifiPort};
use crate::config::{LinkConfig, WifiCredentials};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    /// No credentials, or too many consecutive failures.  Probed slowly.
    Offline,
}

impl LinkState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Offline => "offline",
        }
    }
}

/// A state change observed by one call.
pub type Transition = (LinkState, LinkState);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionError {
    /// Credentials are only accepted while the link is down.
    LinkBusy,
    Storage(ConfigError),
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinkBusy => write!(f, "link busy"),
            Self::Storage(e) => write!(f, "credentials not saved: {e}"),
        }
    }
}

pub struct LinkManager<W: WifiPort> {
    wifi: W,
    cfg: LinkConfig,
    state: LinkState,
    creds: Option<WifiCredentials>,
    failures: u8,
    next_attempt_ms: u64,
    attempt_started_ms: u64,
    last_backoff_ms: u32,
}

impl<W: WifiPort> LinkManager<W> {
    pub fn new(wifi: W, cfg: &LinkConfig) -> Self {
        Self {
            wifi,
            cfg: *cfg,
            state: LinkState::Disconnected,
            creds: None,
            failures: 0,
            next_attempt_ms: 0,
            attempt_started_ms: 0,
            last_backoff_ms: 0,
        }
    }

    pub fn wifi(&self) -> &W {
        &self.wifi
    }

    pub fn wifi_mut(&mut self) -> &mut W {
        &mut self.wifi
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// RSSI in dBm while connected.
    pub fn signal_strength(&self) -> Option<i8> {
        if self.is_connected() { self.wifi.rssi() } else { None }
    }

    pub fn has_credentials(&self) -> bool {
        self.creds.is_some()
    }

    pub fn failures(&self) -> u8 {
        self.failures
    }

    /// Most recent backoff interval; zero after a successful connect.
    pub fn last_backoff_ms(&self) -> u32 {
        self.last_backoff_ms
    }

    pub fn next_attempt_ms(&self) -> u64 {
        self.next_attempt_ms
    }

    /// Load stored credentials.  Returns `true` if any were found.
    pub fn restore_credentials(&mut self, storage: &impl StoragePort) -> bool {
        match WifiCredentials::load(storage) {
            Ok(Some(c)) => {
                info!("link: stored credentials for '{}'", c.ssid);
                self.creds = Some(c);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("link: stored credentials unreadable: {e}");
                false
            }
        }
    }

    /// First connect attempt after boot.
    pub fn start(&mut self, now_ms: u64) -> Option<Transition> {
        let from = self.state;
        if self.creds.is_none() {
            info!("link: no credentials, offline until provisioned");
            self.state = LinkState::Offline;
        } else {
            self.attempt(now_ms);
        }
        self.edge(from)
    }

    /// Accept new credentials and reconnect with them immediately.
    pub fn provision(
        &mut self,
        creds: WifiCredentials,
        now_ms: u64,
        storage: &mut impl StoragePort,
    ) -> Result<Option<Transition>, ProvisionError> {
        if matches!(self.state, LinkState::Connected | LinkState::Connecting) {
            return Err(ProvisionError::LinkBusy);
        }
        creds.store(storage).map_err(ProvisionError::Storage)?;
        info!("link: provisioned '{}'", creds.ssid);
        self.creds = Some(creds);
        self.failures = 0;
        self.last_backoff_ms = 0;

        let from = self.state;
        self.attempt(now_ms);
        Ok(self.edge(from))
    }

    /// Advance the state machine.  Call once per tick.
    pub fn poll(&mut self, now_ms: u64) -> Option<Transition> {
        let from = self.state;
        match self.state {
            LinkState::Disconnected => {
                if self.creds.is_none() {
                    self.state = LinkState::Offline;
                } else if now_ms >= self.next_attempt_ms {
                    self.attempt(now_ms);
                }
            }
            LinkState::Connecting => match self.wifi.poll_connect() {
                ConnectPoll::Connected => {
                    self.state = LinkState::Connected;
                    self.failures = 0;
                    self.last_backoff_ms = 0;
                    info!("link: connected, rssi {:?}", self.wifi.rssi());
                }
                ConnectPoll::Failed => self.fail(now_ms),
                ConnectPoll::Pending => {
                    let elapsed = now_ms.saturating_sub(self.attempt_started_ms);
                    if elapsed >= u64::from(self.cfg.connect_timeout_ms) {
                        warn!("link: connect timed out after {elapsed} ms");
                        self.wifi.disconnect();
                        self.fail(now_ms);
                    }
                }
            },
            LinkState::Connected => {
                if !self.wifi.is_connected() {
                    warn!("link: connection lost");
                    self.state = LinkState::Disconnected;
                    self.failures = 0;
                    self.last_backoff_ms = self.cfg.base_backoff_ms;
                    self.next_attempt_ms = now_ms + u64::from(self.cfg.base_backoff_ms);
                }
            }
            LinkState::Offline => {
                if self.creds.is_some() && now_ms >= self.next_attempt_ms {
                    info!("link: offline probe");
                    self.attempt(now_ms);
                }
            }
        }
        self.edge(from)
    }

    fn attempt(&mut self, now_ms: u64) {
        let Some(creds) = self.creds.as_ref() else {
            self.state = LinkState::Offline;
            return;
        };
        match self.wifi.begin_connect(creds) {
            Ok(()) => {
                self.state = LinkState::Connecting;
                self.attempt_started_ms = now_ms;
            }
            Err(e) => {
                warn!("link: connect start failed: {e}");
                self.fail(now_ms);
            }
        }
    }

    fn fail(&mut self, now_ms: u64) {
        self.failures = self.failures.saturating_add(1);
        if self.failures > self.cfg.max_failures {
            self.state = LinkState::Offline;
            self.next_attempt_ms = now_ms + u64::from(self.cfg.offline_probe_ms);
            warn!(
                "link: {} consecutive failures, offline for {} ms",
                self.failures, self.cfg.offline_probe_ms
            );
            return;
        }
        let shift = u32::from(self.failures - 1).min(31);
        let backoff = self
            .cfg
            .base_backoff_ms
            .checked_shl(shift)
            .unwrap_or(u32::MAX)
            .min(self.cfg.max_backoff_ms);
        self.last_backoff_ms = backoff;
        self.next_attempt_ms = now_ms + u64::from(backoff);
        self.state = LinkState::Disconnected;
        warn!("link: attempt {} failed, retry in {} ms", self.failures, backoff);
    }

    fn edge(&self, from: LinkState) -> Option<Transition> {
        (from != self.state).then_some((from, self.state))
    }
}
