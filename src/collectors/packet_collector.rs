// PacketCollector: receive, decode, filter and forward loop
// Runs until its source reports the capture handle was closed.

use log::{debug, info, trace, warn};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;

use crate::models::CapturedDatagram;

use super::errors::{CaptureError, StartupError};
use super::local_context::LocalNetworkContext;
use super::platform::{self, DatalinkSource};
use super::traffic_filter::{self, Relevance};

/// Largest IPv4 datagram a receive can deliver
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Anything that can fill a buffer with one captured IPv4 datagram per call
///
/// Implementations block until a datagram is available and report
/// `CaptureError::Closed` once their `CaptureHandle` has been closed.
pub trait PacketSource: Send {
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError>;
}

/// Consumer of relevant datagrams, called on the capture thread
///
/// The loop waits for `handle` to return before receiving again, so a slow
/// handler slows capture down.
pub trait TrafficHandler: Send + Sync {
    fn handle(&self, datagram: &CapturedDatagram);
}

/// Close signal shared between the capture loop and whoever stops it
#[derive(Debug, Clone, Default)]
pub struct CaptureHandle {
    closed: Arc<AtomicBool>,
}

impl CaptureHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes the capture; safe to call repeatedly and while a receive is in flight
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("Stopping packet capture");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Totals reported when the capture loop exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureSummary {
    pub received: u64,
    pub decode_failures: u64,
    pub relevant: u64,
    pub transient_faults: u64,
}

/// Receive, decode, filter, forward; until the source reports it was closed
pub struct PacketCollector<S: PacketSource> {
    source: S,
    context: LocalNetworkContext,
    summary: CaptureSummary,
}

impl PacketCollector<DatalinkSource> {
    /// Opens the production capture channel for `context`
    ///
    /// Fails before anything is captured if the interface cannot be found or
    /// the process lacks the privileges for promiscuous capture.
    pub fn open(context: LocalNetworkContext, handle: CaptureHandle) -> Result<Self, StartupError> {
        if let Err(e) = platform::check_packet_capture_support() {
            warn!("{e}");
        }

        let source = DatalinkSource::open(context.address(), handle)?;
        Ok(Self::new(source, context))
    }
}

impl<S: PacketSource> PacketCollector<S> {
    pub fn new(source: S, context: LocalNetworkContext) -> Self {
        Self {
            source,
            context,
            summary: CaptureSummary::default(),
        }
    }

    pub fn context(&self) -> &LocalNetworkContext {
        &self.context
    }

    /// Runs the receive loop on the calling thread until the source is closed
    pub fn run<H: TrafficHandler + ?Sized>(mut self, handler: &H) -> CaptureSummary {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        info!("Capturing UDP traffic for {}", self.context.address());

        loop {
            match self.source.recv(&mut buf) {
                Ok(len) => {
                    let len = len.min(buf.len());
                    self.process(&buf[..len], handler);
                }
                Err(CaptureError::Closed) => break,
                Err(CaptureError::Receive(e)) => {
                    self.summary.transient_faults += 1;
                    warn!("Error receiving packet: {e}");
                }
            }
        }

        info!(
            "Packet capture stopped: {} received, {} relevant, {} undecodable, {} receive errors",
            self.summary.received,
            self.summary.relevant,
            self.summary.decode_failures,
            self.summary.transient_faults
        );
        self.summary
    }

    /// Moves the loop onto a blocking worker thread
    pub fn spawn<H>(self, handler: Arc<H>) -> JoinHandle<CaptureSummary>
    where
        S: 'static,
        H: TrafficHandler + 'static,
    {
        tokio::task::spawn_blocking(move || self.run(handler.as_ref()))
    }

    fn process<H: TrafficHandler + ?Sized>(&mut self, buf: &[u8], handler: &H) {
        self.summary.received += 1;

        let datagram = match CapturedDatagram::decode(buf) {
            Ok(datagram) => datagram,
            Err(_) => {
                self.summary.decode_failures += 1;
                return;
            }
        };

        match traffic_filter::relevance(&datagram.header, &self.context) {
            Relevance::Relevant => {
                self.summary.relevant += 1;
                trace!(
                    "Relevant UDP {} -> {}",
                    datagram.header.source_address(),
                    datagram.header.destination_address()
                );
                handler.handle(&datagram);
            }
            verdict => {
                if log::log_enabled!(log::Level::Trace) {
                    trace!(
                        "Skipping {} -> {}: {:?}",
                        datagram.header.source_address(),
                        datagram.header.destination_address(),
                        verdict
                    );
                }
            }
        }

        if self.summary.received % 100_000 == 0 {
            debug!("{} datagrams received so far", self.summary.received);
        }
    }
}
