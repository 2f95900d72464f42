//! Machine identity providers.
//!
//! The salt store only needs a stable string per machine; it hashes it into
//! a [`FingerprintTag`](pinvault_crypto_core::FingerprintTag) and never
//! keeps the raw value. Where the string comes from is behind
//! [`MachineIdentity`] so tests and embedders can inject their own.

use std::path::Path;

use crate::error::VaultError;

/// Source of a raw, stable machine identifier.
pub trait MachineIdentity {
    /// Return the identifier for the current machine.
    ///
    /// # Errors
    ///
    /// [`VaultError::UnavailableIdentity`] when no stable identifier exists.
    fn raw_machine_id(&self) -> Result<String, VaultError>;
}

/// Operating-system identifier, host name as a last resort.
///
/// - Linux: `/etc/machine-id`, then `/var/lib/dbus/machine-id`
/// - macOS: `IOPlatformUUID` from `ioreg`
/// - Windows: `MachineGuid` from the registry
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformIdentity;

impl MachineIdentity for PlatformIdentity {
    fn raw_machine_id(&self) -> Result<String, VaultError> {
        if let Some(id) = platform::machine_id() {
            return Ok(id);
        }
        tracing::warn!("no platform machine id, falling back to host name");
        hostname_fallback()
    }
}

/// A constant identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedIdentity(String);

impl FixedIdentity {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl MachineIdentity for FixedIdentity {
    fn raw_machine_id(&self) -> Result<String, VaultError> {
        if self.0.trim().is_empty() {
            return Err(VaultError::UnavailableIdentity(
                "empty machine identifier".into(),
            ));
        }
        Ok(self.0.clone())
    }
}

impl<T: MachineIdentity + ?Sized> MachineIdentity for Box<T> {
    fn raw_machine_id(&self) -> Result<String, VaultError> {
        (**self).raw_machine_id()
    }
}

fn hostname_fallback() -> Result<String, VaultError> {
    let name = hostname::get()
        .map_err(|e| VaultError::UnavailableIdentity(e.to_string()))?
        .to_string_lossy()
        .trim()
        .to_owned();
    if name.is_empty() {
        return Err(VaultError::UnavailableIdentity(
            "no machine id and no host name".into(),
        ));
    }
    Ok(name)
}

/// First non-empty, trimmed file contents among `paths`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn read_first_id(paths: &[&Path]) -> Option<String> {
    paths.iter().find_map(|path| {
        std::fs::read_to_string(path)
            .ok()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
    })
}

/// Extract the value of `"IOPlatformUUID" = "..."` from `ioreg` output.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn parse_ioreg_uuid(output: &str) -> Option<String> {
    let line = output.lines().find(|l| l.contains("\"IOPlatformUUID\""))?;
    let value = line.split('=').nth(1)?.trim().trim_matches('"');
    (!value.is_empty()).then(|| value.to_owned())
}

/// Extract the `MachineGuid` value from `reg query` output.
#[cfg_attr(not(windows), allow(dead_code))]
fn parse_reg_machine_guid(output: &str) -> Option<String> {
    let line = output.lines().find(|l| l.trim_start().starts_with("MachineGuid"))?;
    let value = line.split_whitespace().last()?;
    (value != "MachineGuid" && value != "REG_SZ").then(|| value.to_owned())
}

#[cfg(target_os = "linux")]
mod platform {
    use std::path::Path;

    pub fn machine_id() -> Option<String> {
        super::read_first_id(&[
            Path::new("/etc/machine-id"),
            Path::new("/var/lib/dbus/machine-id"),
        ])
    }
}

#[cfg(target_os = "macos")]
mod platform {
    use std::process::Command;

    pub fn machine_id() -> Option<String> {
        let output = Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        super::parse_ioreg_uuid(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(windows)]
mod platform {
    use std::process::Command;

    pub fn machine_id() -> Option<String> {
        let output = Command::new("reg")
            .args([
                "query",
                r"HKLM\SOFTWARE\Microsoft\Cryptography",
                "/v",
                "MachineGuid",
            ])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        super::parse_reg_machine_guid(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
mod platform {
    pub const fn machine_id() -> Option<String> {
        None
    }
}
