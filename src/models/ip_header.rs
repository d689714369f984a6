// Ipv4Header: fixed 20-byte IPv4 header decoding
// Turns a raw captured buffer into a typed header, or an explicit DecodeError.
// Option bytes are never interpreted; only the fixed part of the header is read.

use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::{Ipv4Packet, MutableIpv4Packet};
use pnet::packet::udp::UdpPacket;
use serde::Serialize;
use std::net::Ipv4Addr;
use thiserror::Error;

/// Length of an IPv4 header without options
pub const IPV4_HEADER_LEN: usize = 20;

/// Why a captured buffer could not be turned into an `Ipv4Header`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("buffer holds {len} bytes, an IPv4 header needs {IPV4_HEADER_LEN}")]
    Truncated { len: usize },

    #[error("IP version {version} is not IPv4")]
    NotIpv4 { version: u8 },
}

/// Fixed part of an IPv4 header with every field in host byte order
///
/// Packed fields are kept exactly as they appear on the wire
/// (version + IHL in one byte, flags + fragment offset in one word) so a
/// decoded header can be re-encoded byte for byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ipv4Header {
    pub version_ihl: u8,
    pub differentiated_services: u8,
    pub total_length: u16,
    pub identification: u16,
    pub flags_fragment: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: i16,
    pub source: u32,
    pub destination: u32,
}

impl Ipv4Header {
    /// Decodes the first 20 bytes of `buf`
    ///
    /// `buf` must already be cut to the valid length of the receive; anything
    /// shorter than a full header is rejected instead of being zero-filled.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let packet = Ipv4Packet::new(buf).ok_or(DecodeError::Truncated { len: buf.len() })?;

        let version = packet.get_version();
        if version != 4 {
            return Err(DecodeError::NotIpv4 { version });
        }

        Ok(Self {
            version_ihl: (version << 4) | packet.get_header_length(),
            differentiated_services: (packet.get_dscp() << 2) | packet.get_ecn(),
            total_length: packet.get_total_length(),
            identification: packet.get_identification(),
            flags_fragment: (u16::from(packet.get_flags()) << 13) | packet.get_fragment_offset(),
            ttl: packet.get_ttl(),
            protocol: packet.get_next_level_protocol().0,
            checksum: packet.get_checksum() as i16,
            source: u32::from(packet.get_source()),
            destination: u32::from(packet.get_destination()),
        })
    }

    /// Writes the header back into its 20-byte wire form
    pub fn encode(&self) -> [u8; IPV4_HEADER_LEN] {
        let mut buf = [0u8; IPV4_HEADER_LEN];
        if let Some(mut packet) = MutableIpv4Packet::new(&mut buf) {
            packet.set_version(self.version_ihl >> 4);
            packet.set_header_length(self.version_ihl & 0x0f);
            packet.set_dscp(self.differentiated_services >> 2);
            packet.set_ecn(self.differentiated_services & 0x03);
            packet.set_total_length(self.total_length);
            packet.set_identification(self.identification);
            packet.set_flags((self.flags_fragment >> 13) as u8);
            packet.set_fragment_offset(self.flags_fragment & 0x1fff);
            packet.set_ttl(self.ttl);
            packet.set_next_level_protocol(IpNextHeaderProtocol(self.protocol));
            packet.set_checksum(self.checksum as u16);
            packet.set_source(self.source_address());
            packet.set_destination(self.destination_address());
        }
        buf
    }

    pub fn version(&self) -> u8 {
        self.version_ihl >> 4
    }

    /// Header length in bytes as announced by the IHL nibble
    pub fn header_len(&self) -> usize {
        usize::from(self.version_ihl & 0x0f) * 4
    }

    pub fn source_address(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.source)
    }

    pub fn destination_address(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.destination)
    }

    pub fn is_tcp(&self) -> bool {
        self.protocol == IpNextHeaderProtocols::Tcp.0
    }

    pub fn is_udp(&self) -> bool {
        self.protocol == IpNextHeaderProtocols::Udp.0
    }

    /// Destination in 224.0.0.0/4
    pub fn is_multicast(&self) -> bool {
        self.destination_address().is_multicast()
    }

    /// Destination is the limited broadcast address 255.255.255.255
    pub fn is_broadcast(&self) -> bool {
        self.destination_address().is_broadcast()
    }

    pub fn is_inbound(&self, local: Ipv4Addr) -> bool {
        self.destination_address() == local
    }
}

/// UDP source and destination ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortPair {
    pub source: u16,
    pub destination: u16,
}

/// A decoded header plus whatever transport information was cheaply available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapturedDatagram {
    pub header: Ipv4Header,
    pub ports: Option<PortPair>,
}

impl CapturedDatagram {
    /// Decodes the header and, for UDP, the port pair that follows it
    ///
    /// Missing or short UDP headers leave `ports` empty; only the IPv4
    /// header itself can fail the decode.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let header = Ipv4Header::decode(buf)?;

        let ports = if header.is_udp() {
            let offset = header.header_len().max(IPV4_HEADER_LEN);
            buf.get(offset..)
                .and_then(UdpPacket::new)
                .map(|udp| PortPair {
                    source: udp.get_source(),
                    destination: udp.get_destination(),
                })
        } else {
            None
        };

        Ok(Self { header, ports })
    }

    /// Address of the peer that is not `local`
    pub fn remote_address(&self, local: Ipv4Addr) -> Ipv4Addr {
        if self.header.is_inbound(local) {
            self.header.source_address()
        } else {
            self.header.destination_address()
        }
    }

    /// Port used by the peer that is not `local`
    pub fn remote_port(&self, local: Ipv4Addr) -> Option<u16> {
        self.ports.map(|ports| {
            if self.header.is_inbound(local) {
                ports.source
            } else {
                ports.destination
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header(protocol: u8, destination: Ipv4Addr) -> Ipv4Header {
        Ipv4Header {
            version_ihl: 0x45,
            differentiated_services: 0xb8,
            total_length: 1200,
            identification: 0xbeef,
            flags_fragment: 0x4000,
            ttl: 57,
            protocol,
            checksum: -12345,
            source: u32::from(Ipv4Addr::new(52, 113, 4, 20)),
            destination: u32::from(destination),
        }
    }

    #[test]
    fn test_decode_rejects_short_buffers() {
        let full = sample_header(17, Ipv4Addr::new(10, 0, 0, 5)).encode();

        for len in 0..IPV4_HEADER_LEN {
            assert_eq!(
                Ipv4Header::decode(&full[..len]),
                Err(DecodeError::Truncated { len })
            );
        }
    }

    #[test]
    fn test_decode_reads_big_endian_fields() {
        let buf: [u8; 20] = [
            0x45, 0x00, 0x05, 0xdc, // version/ihl, tos, total length 1500
            0x12, 0x34, 0x40, 0x00, // identification, DF flag
            0x40, 0x11, 0xff, 0xfe, // ttl 64, udp, checksum 0xfffe
            10, 0, 0, 5, // source
            203, 0, 113, 9, // destination
        ];

        let header = Ipv4Header::decode(&buf).unwrap();
        assert_eq!(header.version(), 4);
        assert_eq!(header.header_len(), 20);
        assert_eq!(header.total_length, 1500);
        assert_eq!(header.identification, 0x1234);
        assert_eq!(header.flags_fragment, 0x4000);
        assert_eq!(header.ttl, 64);
        assert_eq!(header.checksum, -2);
        assert_eq!(header.source_address(), Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(header.destination_address(), Ipv4Addr::new(203, 0, 113, 9));
        assert!(header.is_udp());
    }

    #[test]
    fn test_decode_rejects_other_versions() {
        let mut buf = sample_header(17, Ipv4Addr::new(10, 0, 0, 5)).encode();
        buf[0] = 0x65;
        assert_eq!(Ipv4Header::decode(&buf), Err(DecodeError::NotIpv4 { version: 6 }));
    }

    #[test]
    fn test_encode_round_trip() {
        let header = sample_header(17, Ipv4Addr::new(192, 168, 1, 20));
        let decoded = Ipv4Header::decode(&header.encode()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_protocol_predicates() {
        let dst = Ipv4Addr::new(8, 8, 8, 8);
        assert!(sample_header(17, dst).is_udp());
        assert!(!sample_header(17, dst).is_tcp());
        assert!(sample_header(6, dst).is_tcp());
        assert!(!sample_header(6, dst).is_udp());

        for protocol in [0u8, 1, 2, 41, 47, 50, 132, 255] {
            let header = sample_header(protocol, dst);
            assert!(!header.is_udp() && !header.is_tcp(), "protocol {protocol}");
        }
    }

    #[test]
    fn test_multicast_and_broadcast() {
        let multicast = [
            Ipv4Addr::new(224, 0, 0, 1),
            Ipv4Addr::new(232, 10, 1, 1),
            Ipv4Addr::new(239, 255, 255, 255),
        ];
        for dst in multicast {
            let header = sample_header(17, dst);
            assert!(header.is_multicast(), "{dst}");
            assert!(!header.is_broadcast(), "{dst}");
        }

        let broadcast = sample_header(17, Ipv4Addr::BROADCAST);
        assert!(broadcast.is_broadcast());
        assert!(!broadcast.is_multicast());

        for dst in [
            Ipv4Addr::new(223, 255, 255, 255),
            Ipv4Addr::new(240, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 255),
        ] {
            let header = sample_header(17, dst);
            assert!(!header.is_multicast() && !header.is_broadcast(), "{dst}");
        }
    }

    #[test]
    fn test_datagram_reads_udp_ports() {
        let mut buf = sample_header(17, Ipv4Addr::new(10, 0, 0, 5)).encode().to_vec();
        buf.extend_from_slice(&[0x0d, 0x96, 0xc3, 0x50, 0x00, 0x08, 0x00, 0x00]);

        let datagram = CapturedDatagram::decode(&buf).unwrap();
        assert_eq!(
            datagram.ports,
            Some(PortPair { source: 3478, destination: 50000 })
        );

        let local = Ipv4Addr::new(10, 0, 0, 5);
        assert_eq!(datagram.remote_address(local), Ipv4Addr::new(52, 113, 4, 20));
        assert_eq!(datagram.remote_port(local), Some(3478));
    }

    #[test]
    fn test_datagram_without_udp_header_has_no_ports() {
        let buf = sample_header(17, Ipv4Addr::new(10, 0, 0, 5)).encode();
        let datagram = CapturedDatagram::decode(&buf).unwrap();
        assert!(datagram.ports.is_none());

        let tcp = sample_header(6, Ipv4Addr::new(10, 0, 0, 5)).encode();
        assert!(CapturedDatagram::decode(&tcp).unwrap().ports.is_none());
    }
}
