pub mod ip_header;
pub mod meeting;

pub use ip_header::{CapturedDatagram, DecodeError, IPV4_HEADER_LEN, Ipv4Header, PortPair};
pub use meeting::{MeetingEvent, MeetingSession, MeetingStatus, Platform, TrafficCounters};
