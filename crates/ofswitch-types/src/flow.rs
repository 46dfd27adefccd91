//! Flow entries and their aging timers.

use crate::FlowKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Timeout value meaning "never expire".
pub const FLOW_PERMANENT: u16 = 0;

/// Which timer made a flow expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryReason {
    /// No packet matched the flow for `idle_timeout` seconds.
    IdleTimeout,
    /// The flow reached its `hard_timeout` regardless of traffic.
    HardTimeout,
}

impl fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExpiryReason::IdleTimeout => "idle_timeout",
            ExpiryReason::HardTimeout => "hard_timeout",
        };
        f.write_str(s)
    }
}

/// A forwarding rule: a match key plus its timers and counters.
///
/// A flow is created by the caller and handed to a table, which then owns it
/// until it is deleted, expired, replaced or the table is destroyed.
#[derive(Debug, Clone)]
pub struct Flow {
    pub key: FlowKey,
    pub priority: u16,
    /// Seconds without traffic before the flow expires; 0 disables.
    pub idle_timeout: u16,
    /// Seconds after creation before the flow expires; 0 disables.
    pub hard_timeout: u16,
    /// Opaque controller-assigned identifier.
    pub cookie: u64,
    created: Instant,
    used: Instant,
    packet_count: u64,
    byte_count: u64,
}

impl Flow {
    /// Creates a permanent flow for `key`, timestamped now.
    pub fn new(key: FlowKey) -> Self {
        Self::new_at(key, Instant::now())
    }

    /// Creates a permanent flow for `key` as if it was installed at `now`.
    pub fn new_at(key: FlowKey, now: Instant) -> Self {
        Self {
            key,
            priority: 0,
            idle_timeout: FLOW_PERMANENT,
            hard_timeout: FLOW_PERMANENT,
            cookie: 0,
            created: now,
            used: now,
            packet_count: 0,
            byte_count: 0,
        }
    }

    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_idle_timeout(mut self, seconds: u16) -> Self {
        self.idle_timeout = seconds;
        self
    }

    pub fn with_hard_timeout(mut self, seconds: u16) -> Self {
        self.hard_timeout = seconds;
        self
    }

    pub fn with_cookie(mut self, cookie: u64) -> Self {
        self.cookie = cookie;
        self
    }

    /// Records a packet of `bytes` length hitting this flow at `now`.
    pub fn touch(&mut self, now: Instant, bytes: u64) {
        if now > self.used {
            self.used = now;
        }
        self.packet_count += 1;
        self.byte_count += bytes;
    }

    pub fn created(&self) -> Instant {
        self.created
    }

    pub fn last_used(&self) -> Instant {
        self.used
    }

    pub fn packet_count(&self) -> u64 {
        self.packet_count
    }

    pub fn byte_count(&self) -> u64 {
        self.byte_count
    }

    /// Returns true if neither timer is armed.
    pub fn is_permanent(&self) -> bool {
        self.idle_timeout == FLOW_PERMANENT && self.hard_timeout == FLOW_PERMANENT
    }

    /// Evaluates both timers against `now`.
    ///
    /// The hard timeout takes precedence when both have fired.
    pub fn expiry_at(&self, now: Instant) -> Option<ExpiryReason> {
        if self.hard_timeout != FLOW_PERMANENT
            && now >= self.created + Duration::from_secs(self.hard_timeout.into())
        {
            return Some(ExpiryReason::HardTimeout);
        }
        if self.idle_timeout != FLOW_PERMANENT
            && now >= self.used + Duration::from_secs(self.idle_timeout.into())
        {
            return Some(ExpiryReason::IdleTimeout);
        }
        None
    }

    /// Evaluates both timers against the current time.
    pub fn expiry(&self) -> Option<ExpiryReason> {
        self.expiry_at(Instant::now())
    }
}
