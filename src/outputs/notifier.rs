use log::warn;
use std::sync::Arc;

use crate::models::MeetingEvent;

use super::actuator::{Actuator, IndicatorColor};
use super::session_log::SessionLog;

/// Routes meeting events to the indicator and the session log
///
/// Failures of either collaborator are logged and never stop monitoring.
pub struct MeetingNotifier {
    actuator: Arc<dyn Actuator>,
    session_log: Option<SessionLog>,
}

impl MeetingNotifier {
    pub fn new(actuator: Arc<dyn Actuator>, session_log: Option<SessionLog>) -> Self {
        Self {
            actuator,
            session_log,
        }
    }

    pub async fn notify(&self, event: &MeetingEvent) {
        let result = match event {
            MeetingEvent::Started { platform, .. } => {
                self.actuator.turn_on(IndicatorColor::for_platform(*platform)).await
            }
            MeetingEvent::Ended { .. } => self.actuator.turn_off().await,
        };
        if let Err(e) = result {
            warn!("Failed to update indicator: {e:#}");
        }

        if let Some(log) = &self.session_log {
            if let Err(e) = log.append(event) {
                warn!("{e:#}");
            }
        }
    }

    /// Switches the indicator off, used on shutdown while a meeting is active
    pub async fn shutdown(&self) {
        if let Err(e) = self.actuator.turn_off().await {
            warn!("Failed to turn indicator off: {e:#}");
        }
    }
}
