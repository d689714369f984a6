use ipnetwork::Ipv4Network;
use log::{debug, info};
use std::net::{IpAddr, Ipv4Addr};

use super::errors::StartupError;

/// Prefix length used when none is configured: the three-octet heuristic
pub const DEFAULT_SUBNET_PREFIX_LEN: u8 = 24;

/// The host's chosen IPv4 address and the subnet treated as "local"
///
/// Resolved once before capture starts and never changed afterwards. The
/// subnet is a boundary heuristic built from the address and a prefix
/// length, not the interface's real netmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalNetworkContext {
    address: Ipv4Addr,
    subnet: Ipv4Network,
}

impl LocalNetworkContext {
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Result<Self, StartupError> {
        let subnet = Ipv4Network::new(address, prefix_len)
            .map_err(|_| StartupError::InvalidPrefix(prefix_len))?;
        Ok(Self { address, subnet })
    }

    /// Picks the first non-loopback IPv4 address reported by the host
    pub fn resolve(prefix_len: u8) -> Result<Self, StartupError> {
        let interfaces = if_addrs::get_if_addrs().map_err(StartupError::InterfaceEnumeration)?;

        for iface in &interfaces {
            debug!("Interface {} reports {}", iface.name, iface.ip());
        }

        let address = select_local_ipv4(
            interfaces
                .iter()
                .filter(|iface| !iface.is_loopback())
                .map(|iface| iface.ip()),
        )
        .ok_or(StartupError::NoLocalAddress)?;

        let context = Self::new(address, prefix_len)?;
        info!(
            "Using local address {} (local subnet {})",
            context.address,
            context.subnet()
        );
        Ok(context)
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// Network part of the local subnet, e.g. `10.0.0.0/24`
    pub fn subnet(&self) -> Ipv4Network {
        Ipv4Network::new(self.subnet.network(), self.subnet.prefix()).unwrap_or(self.subnet)
    }

    pub fn prefix_len(&self) -> u8 {
        self.subnet.prefix()
    }

    pub fn is_local_address(&self, addr: Ipv4Addr) -> bool {
        addr == self.address
    }

    pub fn is_within_subnet(&self, addr: Ipv4Addr) -> bool {
        self.subnet.contains(addr)
    }

    /// Dotted octet prefix shared by every in-subnet address (`"10.0.0."`)
    ///
    /// Only whole octets are rendered, so a /20 shows as `"172.16."`.
    pub fn subnet_prefix(&self) -> String {
        let whole_octets = usize::from(self.subnet.prefix() / 8);
        self.address.octets()[..whole_octets]
            .iter()
            .map(|octet| format!("{octet}."))
            .collect()
    }
}

/// First IPv4 address in enumeration order
pub fn select_local_ipv4<I>(addresses: I) -> Option<Ipv4Addr>
where
    I: IntoIterator<Item = IpAddr>,
{
    addresses.into_iter().find_map(|addr| match addr {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(_) => None,
    })
}
