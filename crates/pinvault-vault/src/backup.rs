//! Backup archives of the salt and vault files.
//!
//! An archive is a gzip-compressed tar named
//! `backup-YYYY-MM-DDTHH-MM-SSZ.tar.gz` (with `_N` appended when several are
//! taken within one second) holding `salt.bin` and, if present, `vault.enc`.
//! Member names are fixed, whatever the configured file names.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use pinvault_crypto_core::token::MAGIC;
use serde::{Deserialize, Serialize};

use crate::config::VaultConfig;
use crate::error::VaultError;
use crate::fsio;
use crate::lifecycle;
use crate::salt::SaltFile;

/// Archives beyond this count are pruned, oldest first.
pub const MAX_BACKUPS: usize = 10;

const PREFIX: &str = "backup-";
const SUFFIX: &str = ".tar.gz";
const SALT_MEMBER: &str = "salt.bin";
const VAULT_MEMBER: &str = "vault.enc";

/// Upper bound on a member's size when restoring.
const MAX_MEMBER_BYTES: u64 = 64 * 1024 * 1024;

/// Information about a single backup archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub path: PathBuf,
    /// ISO 8601 UTC timestamp taken from the file name.
    pub timestamp: String,
    /// Disambiguates archives created within the same second.
    pub sequence: u32,
    pub size_bytes: u64,
}

/// Archive the current salt and vault files.
///
/// # Errors
///
/// - [`VaultError::NotFound`] if there is no salt file
/// - [`VaultError::Backup`] if the archive cannot be built
/// - [`VaultError::Io`] on other filesystem errors
pub fn create_backup(config: &VaultConfig) -> Result<PathBuf, VaultError> {
    let salt_path = config.salt_path();
    if !salt_path.exists() {
        return Err(VaultError::NotFound(format!(
            "cannot create backup: {} not found",
            salt_path.display()
        )));
    }

    let backup_dir = config.backup_path();
    fs::create_dir_all(&backup_dir)?;

    let stamp = file_timestamp(current_epoch_secs());
    let target = next_free_name(&backup_dir, &stamp);
    let tmp = target.with_extension("partial");

    if let Err(e) = write_archive(config, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, &target)?;
    fsio::sync_parent_best_effort(&target);
    tracing::info!(path = %target.display(), "backup created");

    // Best-effort: pruning never fails the backup itself.
    if let Ok(existing) = list_backups(config) {
        for old in existing.iter().skip(MAX_BACKUPS) {
            if fs::remove_file(&old.path).is_ok() {
                tracing::debug!(path = %old.path.display(), "pruned old backup");
            }
        }
    }

    Ok(target)
}

fn write_archive(config: &VaultConfig, path: &Path) -> Result<(), VaultError> {
    let backup_err = |e: std::io::Error| VaultError::Backup(e.to_string());

    // Created empty first so permissions are restricted before any data lands.
    fsio::write_synced(path, &[])?;
    let file = fs::OpenOptions::new().write(true).open(path)?;
    let mut tar = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    tar.append_path_with_name(config.salt_path(), SALT_MEMBER)
        .map_err(backup_err)?;
    let vault_path = config.vault_path();
    if vault_path.exists() {
        tar.append_path_with_name(&vault_path, VAULT_MEMBER)
            .map_err(backup_err)?;
    }
    let file = tar
        .into_inner()
        .and_then(GzEncoder::finish)
        .map_err(backup_err)?;
    file.sync_all()?;
    Ok(())
}

/// Backups in the configured directory, newest first.
///
/// # Errors
///
/// Returns [`VaultError::Io`] if the directory exists but cannot be read.
pub fn list_backups(config: &VaultConfig) -> Result<Vec<BackupInfo>, VaultError> {
    let backup_dir = config.backup_path();
    if !backup_dir.exists() {
        return Ok(Vec::new());
    }

    let mut backups = Vec::new();
    for entry in fs::read_dir(&backup_dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some((timestamp, sequence)) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_file_name)
        else {
            continue;
        };
        backups.push(BackupInfo {
            timestamp,
            sequence,
            size_bytes: entry.metadata()?.len(),
            path,
        });
    }

    backups.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then(b.sequence.cmp(&a.sequence))
    });
    Ok(backups)
}

/// Replace the current salt and vault files with those in `archive`.
///
/// Both members are read and checked before anything is touched, then the
/// pair is swapped in with the same staged protocol as a PIN change (see
/// [`crate::lifecycle`]), so a crash or failure midway never leaves the
/// archive's salt next to the current vault. When the archive holds no
/// vault, the current vault file is removed so the pair stays consistent.
///
/// # Errors
///
/// - [`VaultError::NotFound`] if `archive` does not exist
/// - [`VaultError::Backup`] if it is unreadable, lacks a valid salt, or its
///   vault member is not a vault file
/// - [`VaultError::Io`] if the files cannot be staged or the salt cannot be
///   moved into place; the current pair is intact in that case
pub fn restore_backup(config: &VaultConfig, archive: &Path) -> Result<(), VaultError> {
    if !archive.exists() {
        return Err(VaultError::NotFound(archive.display().to_string()));
    }
    let (salt, vault) = read_archive(archive, MAX_MEMBER_BYTES)?;
    SaltFile::parse(&salt)
        .map_err(|e| VaultError::Backup(format!("archive salt is invalid: {e}")))?;
    if let Some(bytes) = &vault {
        if !bytes.starts_with(MAGIC) {
            return Err(VaultError::Backup("archive vault is not a vault file".into()));
        }
    }

    lifecycle::recover_pending_rotation(config)?;
    lifecycle::replace_pair(config, &salt, vault.as_deref())?;
    tracing::info!(archive = %archive.display(), "backup restored");
    Ok(())
}

type Members = (Vec<u8>, Option<Vec<u8>>);

/// Members of `limit` bytes or more are rejected rather than truncated.
fn read_archive(archive: &Path, limit: u64) -> Result<Members, VaultError> {
    let backup_err = |e: std::io::Error| VaultError::Backup(e.to_string());

    let file = fs::File::open(archive)?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    let mut salt = None;
    let mut vault = None;
    for entry in tar.entries().map_err(backup_err)? {
        let entry = entry.map_err(backup_err)?;
        let name = entry
            .path()
            .map_err(backup_err)?
            .to_string_lossy()
            .into_owned();
        let slot = match name.as_str() {
            SALT_MEMBER => &mut salt,
            VAULT_MEMBER => &mut vault,
            _ => continue,
        };
        let mut bytes = Vec::new();
        entry
            .take(limit)
            .read_to_end(&mut bytes)
            .map_err(backup_err)?;
        if !matches!(u64::try_from(bytes.len()), Ok(len) if len < limit) {
            return Err(VaultError::Backup(format!("archive member {name} is too large")));
        }
        *slot = Some(bytes);
    }
    let salt = salt.ok_or_else(|| VaultError::Backup("archive has no salt file".into()))?;
    Ok((salt, vault))
}

fn next_free_name(dir: &Path, stamp: &str) -> PathBuf {
    let first = dir.join(format!("{PREFIX}{stamp}{SUFFIX}"));
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| dir.join(format!("{PREFIX}{stamp}_{n}{SUFFIX}")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

/// `backup-2026-02-10T12-30-00Z_2.tar.gz` → `("2026-02-10T12:30:00Z", 2)`
fn parse_file_name(name: &str) -> Option<(String, u32)> {
    let stem = name.strip_prefix(PREFIX)?.strip_suffix(SUFFIX)?;
    let (stamp, sequence) = match stem.split_once('_') {
        Some((stamp, seq)) => (stamp, seq.parse().ok()?),
        None => (stem, 0),
    };
    let t_pos = stamp.find('T')?;
    let (date, time) = stamp.split_at(t_pos);
    Some((format!("{date}{}", time.replace('-', ":")), sequence))
}

fn current_epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// `YYYY-MM-DDTHH-MM-SSZ`: ISO 8601 with the colons swapped for dashes.
fn file_timestamp(epoch_secs: u64) -> String {
    let (year, month, day, hour, minute, second) = epoch_to_utc(epoch_secs);
    format!("{year:04}-{month:02}-{day:02}T{hour:02}-{minute:02}-{second:02}Z")
}

/// Epoch seconds to UTC civil time (Hinnant's `civil_from_days`).
#[allow(clippy::arithmetic_side_effects)]
const fn epoch_to_utc(epoch_secs: u64) -> (u64, u64, u64, u64, u64, u64) {
    let days = epoch_secs / 86_400;
    let rem = epoch_secs % 86_400;

    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };

    (year, month, day, rem / 3600, (rem % 3600) / 60, rem % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const VAULT_V1: &[u8] = b"PVLT\x01first vault";
    const VAULT_V2: &[u8] = b"PVLT\x01second vault";

    fn config_with_files(dir: &TempDir) -> VaultConfig {
        let config = VaultConfig::in_dir(dir.path());
        let tag = pinvault_crypto_core::FingerprintTag::of_machine_id("m");
        fs::write(config.salt_path(), SaltFile::encode(&[1u8; 32], &tag).unwrap()).unwrap();
        fs::write(config.vault_path(), VAULT_V1).unwrap();
        config
    }

    #[test]
    fn timestamp_format() {
        assert_eq!(file_timestamp(0), "1970-01-01T00-00-00Z");
        // 2024-02-29T23:59:59Z
        assert_eq!(file_timestamp(1_709_251_199), "2024-02-29T23-59-59Z");
    }

    #[test]
    fn parse_names() {
        assert_eq!(
            parse_file_name("backup-2026-02-10T12-30-00Z.tar.gz"),
            Some(("2026-02-10T12:30:00Z".into(), 0))
        );
        assert_eq!(
            parse_file_name("backup-2026-02-10T12-30-00Z_3.tar.gz"),
            Some(("2026-02-10T12:30:00Z".into(), 3))
        );
        assert_eq!(parse_file_name("notes.txt"), None);
        assert_eq!(parse_file_name("backup-2026-02-10T12-30-00Z.partial"), None);
    }

    #[test]
    fn create_then_restore() {
        let dir = TempDir::new().unwrap();
        let config = config_with_files(&dir);
        let original_salt = fs::read(config.salt_path()).unwrap();

        let archive = create_backup(&config).unwrap();
        assert!(archive.starts_with(config.backup_path()));

        fs::write(config.vault_path(), VAULT_V2).unwrap();
        let tag = pinvault_crypto_core::FingerprintTag::of_machine_id("m");
        fs::write(config.salt_path(), SaltFile::encode(&[2u8; 32], &tag).unwrap()).unwrap();

        restore_backup(&config, &archive).unwrap();
        assert_eq!(fs::read(config.vault_path()).unwrap(), VAULT_V1);
        assert_eq!(fs::read(config.salt_path()).unwrap(), original_salt);
        assert!(!config.staged_salt_path().exists());
        assert!(!config.staged_vault_path().exists());
    }

    #[test]
    fn backup_without_vault_restores_salt_only() {
        let dir = TempDir::new().unwrap();
        let config = config_with_files(&dir);
        fs::remove_file(config.vault_path()).unwrap();

        let archive = create_backup(&config).unwrap();
        fs::write(config.vault_path(), VAULT_V2).unwrap();

        restore_backup(&config, &archive).unwrap();
        assert!(!config.vault_path().exists());
    }

    #[test]
    fn no_salt_means_no_backup() {
        let dir = TempDir::new().unwrap();
        let config = VaultConfig::in_dir(dir.path());
        assert!(matches!(
            create_backup(&config).unwrap_err(),
            VaultError::NotFound(_)
        ));
    }

    #[test]
    fn same_second_backups_get_distinct_names() {
        let dir = TempDir::new().unwrap();
        let config = config_with_files(&dir);
        let a = create_backup(&config).unwrap();
        let b = create_backup(&config).unwrap();
        assert_ne!(a, b);

        let listed = list_backups(&config).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].path, b, "newest first");
    }

    #[test]
    fn pruned_to_max() {
        let dir = TempDir::new().unwrap();
        let config = config_with_files(&dir);
        let backup_dir = config.backup_path();
        fs::create_dir_all(&backup_dir).unwrap();
        // Stale archives from earlier days.
        for day in 1..=MAX_BACKUPS {
            let name = format!("backup-2020-01-{day:02}T00-00-00Z.tar.gz");
            fs::write(backup_dir.join(name), b"old").unwrap();
        }

        let newest = create_backup(&config).unwrap();
        let listed = list_backups(&config).unwrap();
        assert_eq!(listed.len(), MAX_BACKUPS);
        assert_eq!(listed[0].path, newest);
        assert!(!backup_dir.join("backup-2020-01-01T00-00-00Z.tar.gz").exists());
        assert!(backup_dir.join("backup-2020-01-02T00-00-00Z.tar.gz").exists());
    }

    #[test]
    fn list_without_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let config = VaultConfig::in_dir(dir.path());
        assert!(list_backups(&config).unwrap().is_empty());
    }

    #[test]
    fn list_ignores_foreign_files() {
        let dir = TempDir::new().unwrap();
        let config = config_with_files(&dir);
        create_backup(&config).unwrap();
        fs::write(config.backup_path().join("readme.txt"), b"x").unwrap();
        assert_eq!(list_backups(&config).unwrap().len(), 1);
    }

    #[test]
    fn restore_missing_archive_is_not_found() {
        let dir = TempDir::new().unwrap();
        let config = VaultConfig::in_dir(dir.path());
        let err = restore_backup(&config, &dir.path().join("nope.tar.gz")).unwrap_err();
        assert!(matches!(err, VaultError::NotFound(_)));
    }

    #[test]
    fn restore_rejects_non_archive_and_keeps_files() {
        let dir = TempDir::new().unwrap();
        let config = config_with_files(&dir);
        let bogus = dir.path().join("bogus.tar.gz");
        fs::write(&bogus, b"definitely not gzip").unwrap();

        assert!(matches!(
            restore_backup(&config, &bogus).unwrap_err(),
            VaultError::Backup(_)
        ));
        assert_eq!(fs::read(config.vault_path()).unwrap(), VAULT_V1);
    }

    #[test]
    fn restore_rejects_archive_with_bad_salt() {
        let dir = TempDir::new().unwrap();
        let config = config_with_files(&dir);
        fs::write(config.salt_path(), b"garbage").unwrap();
        let archive = create_backup(&config).unwrap();

        let err = restore_backup(&config, &archive).unwrap_err();
        assert!(err.to_string().contains("archive salt is invalid"));
    }

    #[test]
    fn oversized_member_is_rejected_not_truncated() {
        let dir = TempDir::new().unwrap();
        let config = config_with_files(&dir);
        let big: Vec<u8> = b"PVLT\x01".iter().copied().chain([7u8; 200]).collect();
        fs::write(config.vault_path(), &big).unwrap();
        let archive = create_backup(&config).unwrap();

        let err = read_archive(&archive, 128).unwrap_err();
        assert!(err.to_string().contains("too large"));

        let (_, vault) = read_archive(&archive, 4096).unwrap();
        assert_eq!(vault.unwrap(), big);
    }

    #[test]
    fn restore_rejects_vault_member_without_magic() {
        let dir = TempDir::new().unwrap();
        let config = config_with_files(&dir);
        fs::write(config.vault_path(), b"not a vault").unwrap();
        let archive = create_backup(&config).unwrap();
        fs::write(config.vault_path(), VAULT_V2).unwrap();

        let err = restore_backup(&config, &archive).unwrap_err();
        assert!(err.to_string().contains("not a vault file"));
        assert_eq!(fs::read(config.vault_path()).unwrap(), VAULT_V2);
    }
}
