use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::Path;
use std::process::Command;

use super::CapturePrivileges;

/// Locations of the Npcap `Packet.dll` the pnet datalink backend loads
const NPCAP_DLLS: [&str; 2] = [
    r"C:\Windows\System32\Npcap\Packet.dll",
    r"C:\Windows\SysWOW64\Npcap\Packet.dll",
];

pub struct WindowsPrivileges;

impl WindowsPrivileges {
    /// `net session` only succeeds from an elevated prompt
    fn is_elevated() -> Result<bool> {
        let status = Command::new("net")
            .arg("session")
            .output()
            .context("Failed to check administrator privileges")?
            .status;
        Ok(status.success())
    }

    fn npcap_dll() -> Option<&'static str> {
        let found = NPCAP_DLLS.into_iter().find(|dll| Path::new(dll).exists());
        match found {
            Some(dll) => debug!("Using Npcap from {dll}"),
            None => warn!("Npcap not installed; promiscuous capture is unavailable"),
        }
        found
    }
}

impl CapturePrivileges for WindowsPrivileges {
    fn check_privileges() -> Result<bool> {
        Ok(Self::is_elevated()? && Self::npcap_dll().is_some())
    }

    fn required_capabilities() -> Vec<String> {
        vec!["Administrator".to_string(), "Npcap driver".to_string()]
    }
}
