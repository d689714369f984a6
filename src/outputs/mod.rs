pub mod actuator;
pub mod notifier;
pub mod session_log;

pub use actuator::{Actuator, IndicatorColor, LogActuator};
pub use notifier::MeetingNotifier;
pub use session_log::SessionLog;
