// MeetingMonitor: locked classifier shared by the capture thread and the tick
// Publishes meeting events in transition order.

use chrono::{DateTime, Local};
use log::warn;
use std::net::Ipv4Addr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::collectors::TrafficHandler;
use crate::models::{CapturedDatagram, MeetingEvent, MeetingStatus, Platform};

use super::meeting_classifier::MeetingClassifier;

/// Thread-safe front of the classifier shared by the capture and tick paths
///
/// All reads and writes of session state and counters go through one mutex.
/// Events are published while that mutex is held, so subscribers always see
/// `Started` and `Ended` in transition order.
pub struct MeetingMonitor {
    classifier: Mutex<MeetingClassifier>,
    events: UnboundedSender<MeetingEvent>,
}

impl MeetingMonitor {
    /// Creates the monitor and the receiving end of its event stream
    pub fn new(classifier: MeetingClassifier) -> (Self, UnboundedReceiver<MeetingEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let monitor = Self {
            classifier: Mutex::new(classifier),
            events,
        };
        (monitor, receiver)
    }

    fn lock(&self) -> MutexGuard<'_, MeetingClassifier> {
        self.classifier.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: Option<MeetingEvent>) {
        if let Some(event) = event {
            if self.events.send(event).is_err() {
                warn!("Meeting event dropped: no subscriber");
            }
        }
    }

    pub fn received_udp(&self, datagram: &CapturedDatagram) {
        self.received_udp_at(datagram, Local::now());
    }

    pub fn received_udp_at(&self, datagram: &CapturedDatagram, now: DateTime<Local>) {
        let mut classifier = self.lock();
        let event = classifier.on_datagram(datagram, now);
        self.publish(event);
    }

    /// Periodic idle check, driven once per tick by the caller
    pub fn check_meeting_status(&self) {
        self.check_meeting_status_at(Local::now());
    }

    pub fn check_meeting_status_at(&self, now: DateTime<Local>) {
        let mut classifier = self.lock();
        let event = classifier.check_meeting_status(now);
        self.publish(event);
    }

    pub fn udp_inbound(&self) -> u64 {
        self.lock().counters().inbound
    }

    pub fn udp_outbound(&self) -> u64 {
        self.lock().counters().outbound
    }

    pub fn udp_total(&self) -> u64 {
        self.lock().counters().total
    }

    pub fn meeting_type(&self) -> Platform {
        self.lock().meeting_type()
    }

    /// Remote address of the current or most recent meeting
    pub fn ip(&self) -> Option<Ipv4Addr> {
        self.lock().last_remote()
    }

    pub fn is_active(&self) -> bool {
        self.lock().is_active()
    }

    pub fn is_teams_meeting(&self) -> bool {
        self.meeting_type() == Platform::Teams
    }

    pub fn is_webex_meeting(&self) -> bool {
        self.meeting_type() == Platform::WebEx
    }

    pub fn is_zoom_meeting(&self) -> bool {
        self.meeting_type() == Platform::Zoom
    }

    /// Consistent snapshot of state and counters taken under one lock
    pub fn status(&self) -> MeetingStatus {
        self.lock().status()
    }
}

impl TrafficHandler for MeetingMonitor {
    fn handle(&self, datagram: &CapturedDatagram) {
        self.received_udp(datagram);
    }
}
