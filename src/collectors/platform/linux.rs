use anyhow::{Context, Result};
use log::debug;
use std::process::Command;

use super::CapturePrivileges;

pub struct LinuxPrivileges;

impl LinuxPrivileges {
    fn check_capabilities() -> Result<bool> {
        if nix::unistd::geteuid().is_root() {
            return Ok(true);
        }

        let exe = std::env::current_exe().context("Failed to locate own executable")?;
        let output = Command::new("getcap")
            .arg(&exe)
            .output()
            .context("Failed to check capabilities")?;

        let output_str = String::from_utf8_lossy(&output.stdout);
        debug!("getcap {}: {}", exe.display(), output_str.trim());

        Ok(output_str.contains("cap_net_raw"))
    }
}

impl CapturePrivileges for LinuxPrivileges {
    fn check_privileges() -> Result<bool> {
        Self::check_capabilities()
    }

    fn required_capabilities() -> Vec<String> {
        vec!["root or CAP_NET_RAW".to_string()]
    }
}
