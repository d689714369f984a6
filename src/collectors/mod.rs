pub mod errors;
pub mod local_context;
pub mod packet_collector;
pub mod platform;
pub mod traffic_filter;

pub use errors::{CaptureError, StartupError};
pub use local_context::{DEFAULT_SUBNET_PREFIX_LEN, LocalNetworkContext};
pub use packet_collector::{
    CaptureHandle, CaptureSummary, MAX_DATAGRAM_SIZE, PacketCollector, PacketSource, TrafficHandler,
};
pub use traffic_filter::{Relevance, is_relevant};
