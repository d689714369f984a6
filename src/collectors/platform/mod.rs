use anyhow::Result;

// Platform-specific capture support
// Privilege preflight per operating system plus the link-layer packet source
// shared by all of them.

/// Link-layer capture source backed by a pnet datalink channel
pub mod datalink;

/// Linux preflight: root or CAP_NET_RAW on the binary
#[cfg(target_os = "linux")]
pub mod linux;

/// macOS preflight: BPF devices need root
#[cfg(target_os = "macos")]
pub mod macos;

/// Windows preflight: promiscuous receive needs Administrator
#[cfg(target_os = "windows")]
pub mod windows;

pub use datalink::DatalinkSource;

/// Privilege requirements for promiscuous capture on one platform
pub trait CapturePrivileges {
    fn check_privileges() -> Result<bool>;
    fn required_capabilities() -> Vec<String>;
}

#[cfg(target_os = "linux")]
type Current = linux::LinuxPrivileges;

#[cfg(target_os = "macos")]
type Current = macos::MacOSPrivileges;

#[cfg(target_os = "windows")]
type Current = windows::WindowsPrivileges;

/// Capabilities the current platform needs for capture
pub fn required_capabilities() -> Vec<String> {
    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
    {
        Current::required_capabilities()
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        vec!["raw socket access".to_string()]
    }
}

/// Preflight check run before the capture channel is opened
///
/// Opening the channel is still the authoritative test; this only gives a
/// clearer message when the process is obviously unprivileged.
pub fn check_packet_capture_support() -> Result<()> {
    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
    {
        if !Current::check_privileges()? {
            return Err(anyhow::anyhow!(
                "Insufficient privileges for packet capture. Required: {}",
                required_capabilities().join(", ")
            ));
        }
        Ok(())
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        Err(anyhow::anyhow!("Unsupported platform for packet capture"))
    }
}
