pub mod meeting_classifier;
pub mod meeting_monitor;
pub mod signatures;

pub use meeting_classifier::{MeetingClassifier, MeetingState};
pub use meeting_monitor::MeetingMonitor;
pub use signatures::{
    PortRange, Signature, SignatureConfig, SignatureError, SignatureTable, default_signatures,
};
