//! Credential entries and in-memory CRUD over a decrypted [`Vault`].
//!
//! Nothing here touches the disk. Callers mutate a [`Vault`] obtained from
//! [`VaultStore::unlock`](crate::store::VaultStore::unlock) and hand it back
//! to [`VaultStore::persist`](crate::store::VaultStore::persist).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub use pinvault_crypto_core::{generate_password, DEFAULT_PASSWORD_LENGTH};

/// One stored login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct CredentialEntry {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for CredentialEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialEntry")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Decrypted vault contents: lowercase site name to its entries.
///
/// Serializes as a plain JSON object with sorted keys, so identical
/// contents always produce identical plaintext.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vault(BTreeMap<String, Vec<CredentialEntry>>);

impl Vault {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total entries across all sites.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// Entries for `site` (case-insensitive).
    #[must_use]
    pub fn entries(&self, site: &str) -> Option<&[CredentialEntry]> {
        self.0.get(&site_key(site)).map(Vec::as_slice)
    }

    /// Sites in sorted order.
    pub fn sites(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[CredentialEntry])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Fields to change in [`edit_entry`]. `None` leaves a field as it is.
#[derive(Default, Clone, Zeroize, ZeroizeOnDrop)]
pub struct EntryUpdate {
    pub username: Option<String>,
    pub password: Option<String>,
    pub url: Option<String>,
}

impl EntryUpdate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.password.is_none() && self.url.is_none()
    }
}

fn site_key(site: &str) -> String {
    site.to_lowercase()
}

/// Append an entry under `site`, storing the site as typed as its url.
///
/// Duplicates are kept: the same username may appear twice for one site.
pub fn add_entry(vault: &mut Vault, site: &str, username: &str, password: &str) {
    add_entry_with_url(vault, site, site, username, password);
}

/// Append an entry with an explicit url.
pub fn add_entry_with_url(
    vault: &mut Vault,
    site: &str,
    url: &str,
    username: &str,
    password: &str,
) {
    vault.0.entry(site_key(site)).or_default().push(CredentialEntry {
        url: url.to_owned(),
        username: username.to_owned(),
        password: password.to_owned(),
    });
    tracing::debug!(entries = vault.entry_count(), "entry added");
}

/// Remove the first entry for `site` whose username is `username`.
///
/// Returns `false`, leaving the vault unchanged, when either is absent.
/// A site left without entries is removed.
pub fn delete_entry(vault: &mut Vault, site: &str, username: &str) -> bool {
    let key = site_key(site);
    let Some(list) = vault.0.get_mut(&key) else {
        return false;
    };
    let Some(pos) = list.iter().position(|e| e.username == username) else {
        return false;
    };
    list.remove(pos);
    if list.is_empty() {
        vault.0.remove(&key);
    }
    tracing::debug!(entries = vault.entry_count(), "entry deleted");
    true
}

/// Apply `update` to the first entry for `site` whose username is `username`.
///
/// Returns `false` when the site or username is absent.
pub fn edit_entry(vault: &mut Vault, site: &str, username: &str, update: &EntryUpdate) -> bool {
    let Some(entry) = vault
        .0
        .get_mut(&site_key(site))
        .and_then(|list| list.iter_mut().find(|e| e.username == username))
    else {
        return false;
    };
    if let Some(username) = &update.username {
        entry.username.zeroize();
        entry.username.clone_from(username);
    }
    if let Some(password) = &update.password {
        entry.password.zeroize();
        entry.password.clone_from(password);
    }
    if let Some(url) = &update.url {
        entry.url.clone_from(url);
    }
    tracing::debug!("entry edited");
    true
}

/// Sites whose name contains `keyword`, ignoring case, with all their
/// entries. An empty keyword matches every site.
#[must_use]
pub fn search_entries(vault: &Vault, keyword: &str) -> Vault {
    let needle = keyword.to_lowercase();
    Vault(
        vault
            .0
            .iter()
            .filter(|(site, _)| site.contains(&needle))
            .map(|(site, list)| (site.clone(), list.clone()))
            .collect(),
    )
}
