// DatalinkSource: promiscuous pnet capture on the interface owning the local address
// Strips the link header and polls the capture handle on every read timeout.

use log::{debug, info};
use pnet::datalink::{self, Channel::Ethernet, DataLinkReceiver, NetworkInterface};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::collectors::errors::{CaptureError, StartupError};
use crate::collectors::packet_collector::{CaptureHandle, MAX_DATAGRAM_SIZE, PacketSource};

/// 802.1Q tag control field plus the inner ethertype
const VLAN_TAG_LEN: usize = 4;

/// Ethernet II header plus an optional 802.1Q tag
const LINK_HEADER_ALLOWANCE: usize = 14 + VLAN_TAG_LEN;

/// How long a blocked receive waits before re-checking the capture handle
const CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Framing of what the channel delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayer {
    Ethernet,
    /// Point-to-point and tunnel interfaces deliver bare IP packets
    RawIp,
}

impl LinkLayer {
    pub fn for_interface(interface: &NetworkInterface) -> Self {
        if interface.mac.is_none() || interface.is_point_to_point() {
            LinkLayer::RawIp
        } else {
            LinkLayer::Ethernet
        }
    }

    /// IPv4 bytes inside `frame`, or `None` for any other kind of frame
    pub fn ipv4_payload<'a>(&self, frame: &'a [u8]) -> Option<&'a [u8]> {
        match self {
            LinkLayer::Ethernet => {
                let ethernet = EthernetPacket::new(frame)?;
                let header_len = EthernetPacket::minimum_packet_size();
                match ethernet.get_ethertype() {
                    EtherTypes::Ipv4 => frame.get(header_len..),
                    // One 802.1Q tag: the inner ethertype follows the tag control field
                    EtherTypes::Vlan => {
                        let inner = frame.get(header_len + 2..header_len + VLAN_TAG_LEN)?;
                        if inner != [0x08, 0x00] {
                            return None;
                        }
                        frame.get(header_len + VLAN_TAG_LEN..)
                    }
                    _ => None,
                }
            }
            LinkLayer::RawIp => match frame.first() {
                Some(byte) if byte >> 4 == 4 => Some(frame),
                _ => None,
            },
        }
    }
}

/// Promiscuous link-layer capture on the interface that owns the local address
///
/// Sees traffic in both directions. The underlying socket is closed when the
/// source is dropped, which happens as soon as the capture loop observes the
/// closed handle.
pub struct DatalinkSource {
    rx: Box<dyn DataLinkReceiver>,
    link: LinkLayer,
    handle: CaptureHandle,
}

impl DatalinkSource {
    pub fn open(local: Ipv4Addr, handle: CaptureHandle) -> Result<Self, StartupError> {
        let interface = find_interface(local).ok_or(StartupError::InterfaceNotFound(local))?;

        let config = datalink::Config {
            read_buffer_size: MAX_DATAGRAM_SIZE + LINK_HEADER_ALLOWANCE,
            read_timeout: Some(CLOSE_POLL_INTERVAL),
            promiscuous: true,
            ..Default::default()
        };

        let rx = match datalink::channel(&interface, config) {
            Ok(Ethernet(_tx, rx)) => rx,
            Ok(_) => return Err(StartupError::UnsupportedChannel(interface.name.clone())),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                return Err(StartupError::PermissionDenied {
                    interface: interface.name.clone(),
                    required: super::required_capabilities(),
                });
            }
            Err(e) => {
                return Err(StartupError::Channel {
                    interface: interface.name.clone(),
                    source: e,
                });
            }
        };

        let link = LinkLayer::for_interface(&interface);
        info!(
            "Opened promiscuous capture on {} ({:?} framing)",
            interface.name, link
        );

        Ok(Self { rx, link, handle })
    }
}

impl PacketSource for DatalinkSource {
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
        loop {
            if self.handle.is_closed() {
                return Err(CaptureError::Closed);
            }

            match self.rx.next() {
                Ok(frame) => {
                    let Some(payload) = self.link.ipv4_payload(frame) else {
                        continue;
                    };
                    let len = payload.len().min(buf.len());
                    buf[..len].copy_from_slice(&payload[..len]);
                    return Ok(len);
                }
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                    continue;
                }
                Err(e) => {
                    if self.handle.is_closed() {
                        return Err(CaptureError::Closed);
                    }
                    return Err(CaptureError::Receive(e));
                }
            }
        }
    }
}

fn find_interface(local: Ipv4Addr) -> Option<NetworkInterface> {
    let interface = datalink::interfaces()
        .into_iter()
        .find(|iface| iface.ips.iter().any(|net| net.ip() == IpAddr::V4(local)));

    if let Some(iface) = &interface {
        debug!("Address {} belongs to interface {}", local, iface.name);
    }
    interface
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn ethernet_frame(ethertype: [u8; 2], payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0xff; 6];
        frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 1]);
        frame.extend_from_slice(&ethertype);
        frame.extend_from_slice(payload);
        frame
    }

    #[test]
    fn test_ethernet_ipv4_payload() {
        let ip = [0x45u8, 0, 0, 20];
        let frame = ethernet_frame([0x08, 0x00], &ip);
        assert_eq!(LinkLayer::Ethernet.ipv4_payload(&frame), Some(&ip[..]));
    }

    #[test]
    fn test_ethernet_skips_other_ethertypes() {
        let arp = ethernet_frame([0x08, 0x06], &[0u8; 28]);
        assert_eq!(LinkLayer::Ethernet.ipv4_payload(&arp), None);

        let ipv6 = ethernet_frame([0x86, 0xdd], &[0x60u8; 40]);
        assert_eq!(LinkLayer::Ethernet.ipv4_payload(&ipv6), None);

        assert_eq!(LinkLayer::Ethernet.ipv4_payload(&[0u8; 4]), None);
    }

    #[test]
    fn test_ethernet_strips_one_vlan_tag() {
        let ip = [0x45u8, 0, 0, 20];
        let mut tagged = vec![0x00, 0x64, 0x08, 0x00];
        tagged.extend_from_slice(&ip);
        let frame = ethernet_frame([0x81, 0x00], &tagged);
        assert_eq!(LinkLayer::Ethernet.ipv4_payload(&frame), Some(&ip[..]));

        let tagged_ipv6 = ethernet_frame([0x81, 0x00], &[0x00, 0x64, 0x86, 0xdd, 0x60, 0, 0, 0]);
        assert_eq!(LinkLayer::Ethernet.ipv4_payload(&tagged_ipv6), None);

        let truncated_tag = ethernet_frame([0x81, 0x00], &[0x00, 0x64]);
        assert_eq!(LinkLayer::Ethernet.ipv4_payload(&truncated_tag), None);
    }

    enum Step {
        Frame(Vec<u8>),
        Fail(io::ErrorKind),
        /// Closes the handle as if `stop()` ran during this read, then fails
        CloseThenFail(io::ErrorKind),
    }

    struct FakeReceiver {
        script: VecDeque<Step>,
        handle: CaptureHandle,
        frame: Vec<u8>,
    }

    impl DataLinkReceiver for FakeReceiver {
        fn next(&mut self) -> io::Result<&[u8]> {
            match self.script.pop_front() {
                Some(Step::Frame(bytes)) => {
                    self.frame = bytes;
                    Ok(&self.frame)
                }
                Some(Step::Fail(kind)) => Err(io::Error::from(kind)),
                Some(Step::CloseThenFail(kind)) => {
                    self.handle.close();
                    Err(io::Error::from(kind))
                }
                None => Err(io::Error::from(io::ErrorKind::TimedOut)),
            }
        }
    }

    fn source(steps: Vec<Step>) -> DatalinkSource {
        let handle = CaptureHandle::new();
        let rx = FakeReceiver {
            script: steps.into(),
            handle: handle.clone(),
            frame: Vec::new(),
        };
        DatalinkSource {
            rx: Box::new(rx),
            link: LinkLayer::Ethernet,
            handle,
        }
    }

    fn close_mid_receive(kind: io::ErrorKind) -> (Result<usize, CaptureError>, Result<usize, CaptureError>) {
        let mut source = source(vec![
            Step::Frame(ethernet_frame([0x08, 0x00], &[0x45, 0, 0, 20])),
            Step::Fail(io::ErrorKind::TimedOut),
            Step::CloseThenFail(kind),
        ]);
        let mut buf = [0u8; 64];
        let first = source.recv(&mut buf);
        let second = source.recv(&mut buf);
        (first, second)
    }

    #[test]
    fn test_close_during_receive_ends_at_next_timeout() {
        let (first, second) = close_mid_receive(io::ErrorKind::TimedOut);
        assert_eq!(first.unwrap(), 4);
        assert!(matches!(second, Err(CaptureError::Closed)));
    }

    #[test]
    fn test_receive_error_after_close_is_not_a_fault() {
        let (first, second) = close_mid_receive(io::ErrorKind::BrokenPipe);
        assert_eq!(first.unwrap(), 4);
        assert!(matches!(second, Err(CaptureError::Closed)));
    }

    #[test]
    fn test_receive_error_while_open_is_reported() {
        let mut source = source(vec![
            Step::Frame(ethernet_frame([0x08, 0x06], &[0u8; 28])),
            Step::Fail(io::ErrorKind::BrokenPipe),
        ]);
        let mut buf = [0u8; 64];
        assert!(matches!(source.recv(&mut buf), Err(CaptureError::Receive(_))));
        assert!(!source.handle.is_closed());
    }

    #[test]
    fn test_raw_ip_checks_version() {
        let v4 = [0x45u8, 0, 0, 20];
        assert_eq!(LinkLayer::RawIp.ipv4_payload(&v4), Some(&v4[..]));
        assert_eq!(LinkLayer::RawIp.ipv4_payload(&[0x60u8, 0, 0, 0]), None);
        assert_eq!(LinkLayer::RawIp.ipv4_payload(&[]), None);
    }
}
