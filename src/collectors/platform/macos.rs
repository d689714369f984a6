use anyhow::Result;
use log::{debug, warn};

use super::CapturePrivileges;

pub struct MacOSPrivileges;

impl MacOSPrivileges {
    fn check_admin_privileges() -> bool {
        let uid = unsafe { libc::geteuid() };
        uid == 0
    }

    fn check_bpf_devices() -> bool {
        let found = (0..10).any(|i| std::path::Path::new(&format!("/dev/bpf{i}")).exists());
        if found {
            debug!("BPF devices available");
        } else {
            warn!("No BPF devices found under /dev");
        }
        found
    }
}

impl CapturePrivileges for MacOSPrivileges {
    fn check_privileges() -> Result<bool> {
        Ok(Self::check_admin_privileges() && Self::check_bpf_devices())
    }

    fn required_capabilities() -> Vec<String> {
        vec![
            "Administrator privileges".to_string(),
            "BPF device access".to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_capabilities() {
        let caps = MacOSPrivileges::required_capabilities();
        assert!(caps.contains(&"Administrator privileges".to_string()));
        assert!(caps.contains(&"BPF device access".to_string()));
    }
}
