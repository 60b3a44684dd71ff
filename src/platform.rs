use anyhow::{anyhow, Result};
use std::process::Command;

pub const DEFAULT_ARCH: &str = "x86_64";

/// Source of the host machine architecture, e.g. `x86_64` or `aarch64`.
pub trait ArchProbe {
    fn machine(&self) -> Result<String>;
}

/// Asks the kernel through `uname -m`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnameProbe;

impl ArchProbe for UnameProbe {
    fn machine(&self) -> Result<String> {
        let output = Command::new("uname").arg("-m").output()?;
        if !output.status.success() {
            return Err(anyhow!(
                "uname -m failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        let arch = String::from_utf8(output.stdout)?.trim().to_string();
        if arch.is_empty() {
            return Err(anyhow!("uname -m returned nothing"));
        }
        Ok(arch)
    }
}

/// Fixed answer, for tests and for overriding detection.
#[derive(Debug, Clone)]
pub struct FixedArch(pub String);

impl FixedArch {
    pub fn new(arch: &str) -> Self {
        Self(arch.to_string())
    }
}

impl ArchProbe for FixedArch {
    fn machine(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

pub fn detect_host_arch(probe: &dyn ArchProbe) -> String {
    match probe.machine() {
        Ok(arch) => {
            tracing::debug!(arch = %arch, "Detected host architecture");
            arch
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                "Failed to detect system architecture, assuming {}",
                DEFAULT_ARCH
            );
            DEFAULT_ARCH.to_string()
        }
    }
}
