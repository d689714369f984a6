use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Meeting platforms the classifier can recognise
///
/// Declaration order is the signature priority order: when a remote endpoint
/// matches several platforms, the earliest variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Platform {
    #[default]
    #[serde(alias = "none")]
    None,
    #[serde(alias = "teams")]
    Teams,
    #[serde(alias = "webex", alias = "Webex")]
    WebEx,
    #[serde(alias = "zoom")]
    Zoom,
}

impl Platform {
    /// Platforms that can appear in a signature table, in priority order
    pub const DETECTABLE: [Platform; 3] = [Platform::Teams, Platform::WebEx, Platform::Zoom];

    pub fn name(&self) -> &'static str {
        match self {
            Platform::None => "None",
            Platform::Teams => "Teams",
            Platform::WebEx => "WebEx",
            Platform::Zoom => "Zoom",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Packet counters for the current (or most recent) session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrafficCounters {
    pub inbound: u64,
    pub outbound: u64,
    pub total: u64,
}

impl TrafficCounters {
    pub fn record(&mut self, inbound: bool) {
        if inbound {
            self.inbound += 1;
        } else {
            self.outbound += 1;
        }
        self.total += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One contiguous meeting with a single platform and remote endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeetingSession {
    pub platform: Platform,
    pub remote: Ipv4Addr,
    pub started_at: DateTime<Local>,
    pub last_activity: DateTime<Local>,
}

impl MeetingSession {
    pub fn new(platform: Platform, remote: Ipv4Addr, now: DateTime<Local>) -> Self {
        Self {
            platform,
            remote,
            started_at: now,
            last_activity: now,
        }
    }

    /// Silence since the last counted datagram; negative clock steps count as zero
    pub fn idle_for(&self, now: DateTime<Local>) -> std::time::Duration {
        now.signed_duration_since(self.last_activity)
            .to_std()
            .unwrap_or_default()
    }
}

/// Notification emitted on every classifier state transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MeetingEvent {
    Started {
        platform: Platform,
        remote: Ipv4Addr,
        at: DateTime<Local>,
    },
    Ended {
        platform: Platform,
        remote: Ipv4Addr,
        started_at: DateTime<Local>,
        at: DateTime<Local>,
        counters: TrafficCounters,
    },
}

impl MeetingEvent {
    pub fn platform(&self) -> Platform {
        match self {
            MeetingEvent::Started { platform, .. } | MeetingEvent::Ended { platform, .. } => *platform,
        }
    }

    pub fn remote(&self) -> Ipv4Addr {
        match self {
            MeetingEvent::Started { remote, .. } | MeetingEvent::Ended { remote, .. } => *remote,
        }
    }

    pub fn at(&self) -> DateTime<Local> {
        match self {
            MeetingEvent::Started { at, .. } | MeetingEvent::Ended { at, .. } => *at,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, MeetingEvent::Started { .. })
    }
}

/// Point-in-time view of the classifier for status consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeetingStatus {
    pub active: bool,
    pub platform: Platform,
    pub remote: Option<Ipv4Addr>,
    pub started_at: Option<DateTime<Local>>,
    pub last_activity: Option<DateTime<Local>>,
    pub counters: TrafficCounters,
}
