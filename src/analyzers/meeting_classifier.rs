// MeetingClassifier: Idle/Active state machine over relevant UDP datagrams
// Packets are the only way a session starts, the periodic check the only way it ends.
// Time is always passed in so transitions are deterministic.

use chrono::{DateTime, Local};
use log::{debug, info};
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::models::{CapturedDatagram, MeetingEvent, MeetingSession, MeetingStatus, Platform, TrafficCounters};

use super::signatures::SignatureTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeetingState {
    Idle,
    Active(MeetingSession),
}

/// Stateful meeting detector
///
/// Counters are per session: they are cleared when a session starts and keep
/// their final values after it ends until the next one starts.
///
/// # Example
///
/// ```rust
/// # use meeting_watcher::analyzers::{MeetingClassifier, SignatureTable, default_signatures};
/// # use std::net::Ipv4Addr;
/// # use std::time::Duration;
/// let table = SignatureTable::from_config(&default_signatures()).unwrap();
/// let classifier = MeetingClassifier::new(table, Ipv4Addr::new(10, 0, 0, 5), Duration::from_secs(30));
/// assert!(!classifier.is_active());
/// ```
#[derive(Debug, Clone)]
pub struct MeetingClassifier {
    signatures: SignatureTable,
    local: Ipv4Addr,
    idle_timeout: Duration,
    state: MeetingState,
    counters: TrafficCounters,
    last_remote: Option<Ipv4Addr>,
    last_platform: Platform,
}

impl MeetingClassifier {
    pub fn new(signatures: SignatureTable, local: Ipv4Addr, idle_timeout: Duration) -> Self {
        Self {
            signatures,
            local,
            idle_timeout,
            state: MeetingState::Idle,
            counters: TrafficCounters::default(),
            last_remote: None,
            last_platform: Platform::None,
        }
    }

    /// Feeds one relevant datagram; returns `Started` if it opened a session
    pub fn on_datagram(&mut self, datagram: &CapturedDatagram, now: DateTime<Local>) -> Option<MeetingEvent> {
        let remote = datagram.remote_address(self.local);
        let remote_port = datagram.remote_port(self.local);
        let inbound = datagram.header.is_inbound(self.local);

        match &mut self.state {
            MeetingState::Idle => {
                let platform = self.signatures.classify(remote, remote_port)?;

                info!("{platform} meeting started with {remote}");
                self.state = MeetingState::Active(MeetingSession::new(platform, remote, now));
                self.counters.reset();
                self.counters.record(inbound);
                self.last_remote = Some(remote);
                self.last_platform = platform;

                Some(MeetingEvent::Started {
                    platform,
                    remote,
                    at: now,
                })
            }
            MeetingState::Active(session) => {
                let same_remote = remote == session.remote;
                if same_remote
                    || self
                        .signatures
                        .matches_platform(session.platform, remote, remote_port)
                {
                    session.last_activity = now;
                    self.counters.record(inbound);
                } else {
                    debug!(
                        "Ignoring {remote} during {} meeting with {}",
                        session.platform, session.remote
                    );
                }
                None
            }
        }
    }

    /// Periodic idle check; returns `Ended` if the session timed out
    ///
    /// Calling it again while the session is still within the timeout, or
    /// while idle, changes nothing.
    pub fn check_meeting_status(&mut self, now: DateTime<Local>) -> Option<MeetingEvent> {
        let MeetingState::Active(session) = &self.state else {
            return None;
        };

        let idle = session.idle_for(now);
        if idle <= self.idle_timeout {
            return None;
        }

        let event = MeetingEvent::Ended {
            platform: session.platform,
            remote: session.remote,
            started_at: session.started_at,
            at: now,
            counters: self.counters,
        };
        info!(
            "{} meeting with {} ended after {}s of silence ({} packets)",
            session.platform,
            session.remote,
            idle.as_secs(),
            self.counters.total
        );

        self.state = MeetingState::Idle;
        Some(event)
    }

    pub fn state(&self) -> &MeetingState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, MeetingState::Active(_))
    }

    pub fn session(&self) -> Option<&MeetingSession> {
        match &self.state {
            MeetingState::Active(session) => Some(session),
            MeetingState::Idle => None,
        }
    }

    pub fn counters(&self) -> TrafficCounters {
        self.counters
    }

    /// Platform of the active session, or `None` while idle
    pub fn meeting_type(&self) -> Platform {
        self.session().map_or(Platform::None, |session| session.platform)
    }

    /// Platform of the current or most recent session
    pub fn last_platform(&self) -> Platform {
        self.last_platform
    }

    /// Remote address of the current or most recent session
    pub fn last_remote(&self) -> Option<Ipv4Addr> {
        self.last_remote
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn status(&self) -> MeetingStatus {
        let session = self.session();
        MeetingStatus {
            active: session.is_some(),
            platform: self.meeting_type(),
            remote: self.last_remote,
            started_at: session.map(|s| s.started_at),
            last_activity: session.map(|s| s.last_activity),
            counters: self.counters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::signatures::SignatureConfig;
    use crate::models::{Ipv4Header, PortPair};

    const LOCAL: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);
    const TEAMS: Ipv4Addr = Ipv4Addr::new(52, 113, 10, 20);

    fn classifier() -> MeetingClassifier {
        let table = SignatureTable::from_config(&[
            SignatureConfig {
                platform: Platform::Teams,
                networks: vec!["52.112.0.0/14".to_string()],
                ports: vec![],
            },
            SignatureConfig {
                platform: Platform::Zoom,
                networks: vec![],
                ports: vec!["8801-8810".to_string()],
            },
        ])
        .unwrap();
        MeetingClassifier::new(table, LOCAL, Duration::from_secs(30))
    }

    fn datagram(source: Ipv4Addr, destination: Ipv4Addr, remote_port: Option<u16>) -> CapturedDatagram {
        let header = Ipv4Header {
            version_ihl: 0x45,
            differentiated_services: 0,
            total_length: 200,
            identification: 0,
            flags_fragment: 0,
            ttl: 64,
            protocol: 17,
            checksum: 0,
            source: u32::from(source),
            destination: u32::from(destination),
        };
        let ports = remote_port.map(|port| {
            if destination == LOCAL {
                PortPair { source: port, destination: 50000 }
            } else {
                PortPair { source: 50000, destination: port }
            }
        });
        CapturedDatagram { header, ports }
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    #[test]
    fn test_unmatched_traffic_keeps_idle() {
        let mut c = classifier();
        let now = Local::now();

        assert_eq!(c.on_datagram(&datagram(LOCAL, Ipv4Addr::new(8, 8, 8, 8), Some(53)), now), None);
        assert!(!c.is_active());
        assert_eq!(c.counters(), TrafficCounters::default());
        assert_eq!(c.last_remote(), None);
    }

    #[test]
    fn test_start_resets_then_counts() {
        let mut c = classifier();
        let now = Local::now();

        let event = c.on_datagram(&datagram(TEAMS, LOCAL, None), now);
        assert_eq!(
            event,
            Some(MeetingEvent::Started {
                platform: Platform::Teams,
                remote: TEAMS,
                at: now
            })
        );
        assert_eq!(c.meeting_type(), Platform::Teams);
        assert_eq!(c.counters(), TrafficCounters { inbound: 1, outbound: 0, total: 1 });

        assert_eq!(c.on_datagram(&datagram(LOCAL, TEAMS, None), now + secs(1)), None);
        assert_eq!(c.counters(), TrafficCounters { inbound: 1, outbound: 1, total: 2 });
        assert_eq!(c.session().unwrap().last_activity, now + secs(1));
    }

    #[test]
    fn test_active_ignores_unrelated_remote() {
        let mut c = classifier();
        let now = Local::now();
        c.on_datagram(&datagram(TEAMS, LOCAL, None), now);

        // Zoom traffic while a Teams meeting is running
        let zoom = datagram(LOCAL, Ipv4Addr::new(3, 7, 35, 1), Some(8801));
        assert_eq!(c.on_datagram(&zoom, now + secs(5)), None);
        assert_eq!(c.counters().total, 1);
        assert_eq!(c.session().unwrap().last_activity, now);

        // Another Teams relay counts toward the same meeting
        let other_relay = datagram(Ipv4Addr::new(52, 114, 1, 1), LOCAL, None);
        c.on_datagram(&other_relay, now + secs(6));
        assert_eq!(c.counters().total, 2);
        assert_eq!(c.session().unwrap().remote, TEAMS);
    }

    #[test]
    fn test_overlapping_signature_still_extends_session() {
        let mut c = classifier();
        let now = Local::now();
        let zoom = Ipv4Addr::new(3, 7, 35, 1);
        c.on_datagram(&datagram(LOCAL, zoom, Some(8801)), now);

        // Inside the Teams range, but also on a Zoom port
        let overlap = datagram(Ipv4Addr::new(52, 113, 9, 9), LOCAL, Some(8802));
        assert_eq!(c.on_datagram(&overlap, now + secs(20)), None);
        assert_eq!(c.meeting_type(), Platform::Zoom);
        assert_eq!(c.counters().total, 2);
        assert_eq!(c.session().unwrap().last_activity, now + secs(20));
        assert_eq!(c.check_meeting_status(now + secs(45)), None);
    }

    #[test]
    fn test_idle_timeout_ends_session_once() {
        let mut c = classifier();
        let start = Local::now();
        c.on_datagram(&datagram(TEAMS, LOCAL, None), start);

        let event = c.check_meeting_status(start + secs(40));
        assert!(matches!(
            event,
            Some(MeetingEvent::Ended { platform: Platform::Teams, remote, counters, .. })
                if remote == TEAMS && counters.total == 1
        ));
        assert!(!c.is_active());
        assert_eq!(c.meeting_type(), Platform::None);
        assert_eq!(c.last_remote(), Some(TEAMS));
        assert_eq!(c.last_platform(), Platform::Teams);

        assert_eq!(c.check_meeting_status(start + secs(41)), None);
    }

    #[test]
    fn test_checks_within_timeout_are_noops() {
        let mut c = classifier();
        let start = Local::now();
        c.on_datagram(&datagram(TEAMS, LOCAL, None), start);

        assert_eq!(c.check_meeting_status(start + secs(10)), None);
        assert_eq!(c.check_meeting_status(start + secs(30)), None);
        assert!(c.is_active());
    }

    #[test]
    fn test_new_session_after_end_resets_counters() {
        let mut c = classifier();
        let start = Local::now();
        c.on_datagram(&datagram(TEAMS, LOCAL, None), start);
        c.on_datagram(&datagram(LOCAL, TEAMS, None), start + secs(1));
        c.check_meeting_status(start + secs(60));
        assert_eq!(c.counters().total, 2);

        let zoom = Ipv4Addr::new(3, 7, 35, 1);
        let event = c.on_datagram(&datagram(LOCAL, zoom, Some(8805)), start + secs(70));
        assert!(matches!(event, Some(MeetingEvent::Started { platform: Platform::Zoom, .. })));
        assert_eq!(c.counters(), TrafficCounters { inbound: 0, outbound: 1, total: 1 });
        assert_eq!(c.status().remote, Some(zoom));
    }
}
