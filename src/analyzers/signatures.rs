// Platform signature table
// Ordered (predicate, platform) pairs over the remote address and port.
// The first matching signature wins; Teams is checked before WebEx, WebEx before Zoom.

use ipnetwork::Ipv4Network;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

use crate::models::Platform;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature #{index}: platform None cannot be detected")]
    UndetectablePlatform { index: usize },

    #[error("signature #{index} ({platform}): needs at least one network or port range")]
    MatchesEverything { index: usize, platform: Platform },

    #[error("signature #{index} ({platform}): invalid network '{value}': {reason}")]
    InvalidNetwork {
        index: usize,
        platform: Platform,
        value: String,
        reason: String,
    },

    #[error("signature #{index} ({platform}): invalid port range '{value}'")]
    InvalidPortRange {
        index: usize,
        platform: Platform,
        value: String,
    },
}

/// One signature as written in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureConfig {
    pub platform: Platform,
    /// IPv4 CIDR blocks, e.g. `"52.112.0.0/14"`
    #[serde(default)]
    pub networks: Vec<String>,
    /// Single ports or inclusive ranges, e.g. `"3478"` or `"8801-8810"`
    #[serde(default)]
    pub ports: Vec<String>,
}

/// Inclusive UDP port range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn contains(&self, port: u16) -> bool {
        (self.start..=self.end).contains(&port)
    }
}

impl FromStr for PortRange {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = match s.split_once('-') {
            Some((start, end)) => (start.trim(), end.trim()),
            None => (s.trim(), s.trim()),
        };
        let start: u16 = start.parse().map_err(|_| ())?;
        let end: u16 = end.parse().map_err(|_| ())?;
        if start > end {
            return Err(());
        }
        Ok(Self { start, end })
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// A parsed, ready-to-match signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub platform: Platform,
    pub networks: Vec<Ipv4Network>,
    pub ports: Vec<PortRange>,
}

impl Signature {
    /// Empty lists impose no restriction; a port rule never matches an unknown port
    pub fn matches(&self, remote: Ipv4Addr, remote_port: Option<u16>) -> bool {
        let address_ok = self.networks.is_empty() || self.networks.iter().any(|net| net.contains(remote));
        let port_ok = self.ports.is_empty()
            || remote_port.is_some_and(|port| self.ports.iter().any(|range| range.contains(port)));
        address_ok && port_ok
    }

    fn parse(index: usize, config: &SignatureConfig) -> Result<Self, SignatureError> {
        let platform = config.platform;
        if platform == Platform::None {
            return Err(SignatureError::UndetectablePlatform { index });
        }
        if config.networks.is_empty() && config.ports.is_empty() {
            return Err(SignatureError::MatchesEverything { index, platform });
        }

        let networks = config
            .networks
            .iter()
            .map(|value| {
                value
                    .trim()
                    .parse::<Ipv4Network>()
                    .map_err(|e| SignatureError::InvalidNetwork {
                        index,
                        platform,
                        value: value.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let ports = config
            .ports
            .iter()
            .map(|value| {
                value.parse::<PortRange>().map_err(|_| SignatureError::InvalidPortRange {
                    index,
                    platform,
                    value: value.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            platform,
            networks,
            ports,
        })
    }
}

/// Read-only lookup table handed to the classifier at construction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SignatureTable {
    signatures: Vec<Signature>,
}

impl SignatureTable {
    /// Parses every entry and orders the table by platform priority
    ///
    /// Entries for the same platform keep their configured order.
    pub fn from_config(entries: &[SignatureConfig]) -> Result<Self, SignatureError> {
        let mut signatures = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| Signature::parse(index, entry))
            .collect::<Result<Vec<_>, _>>()?;

        signatures.sort_by_key(|signature| signature.platform);

        debug!("Loaded {} platform signatures", signatures.len());
        Ok(Self { signatures })
    }

    /// First platform whose signature matches the remote endpoint
    pub fn classify(&self, remote: Ipv4Addr, remote_port: Option<u16>) -> Option<Platform> {
        self.signatures
            .iter()
            .find(|signature| signature.matches(remote, remote_port))
            .map(|signature| signature.platform)
    }

    /// Whether any signature of `platform` matches, regardless of priority
    pub fn matches_platform(&self, platform: Platform, remote: Ipv4Addr, remote_port: Option<u16>) -> bool {
        self.signatures
            .iter()
            .any(|signature| signature.platform == platform && signature.matches(remote, remote_port))
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

/// Published media ranges and ports of the supported platforms
pub fn default_signatures() -> Vec<SignatureConfig> {
    fn entry(platform: Platform, networks: &[&str], ports: &[&str]) -> SignatureConfig {
        SignatureConfig {
            platform,
            networks: networks.iter().map(|s| s.to_string()).collect(),
            ports: ports.iter().map(|s| s.to_string()).collect(),
        }
    }

    vec![
        entry(
            Platform::Teams,
            &["13.107.64.0/18", "52.112.0.0/14", "52.122.0.0/15"],
            &["3478-3481"],
        ),
        entry(
            Platform::WebEx,
            &[
                "62.109.192.0/18",
                "64.68.96.0/19",
                "66.114.160.0/20",
                "66.163.32.0/19",
                "69.26.160.0/19",
                "114.29.192.0/19",
                "150.253.128.0/17",
                "163.129.0.0/17",
                "170.72.0.0/16",
                "170.133.128.0/18",
                "173.39.224.0/19",
                "173.243.0.0/20",
                "207.182.160.0/19",
                "209.197.192.0/19",
                "210.4.192.0/20",
                "216.151.128.0/19",
            ],
            &[],
        ),
        entry(Platform::Zoom, &[], &["8801-8810"]),
    ]
}
