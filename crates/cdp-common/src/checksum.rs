//! Content fingerprints for source files and corpora
//!
//! Uses SHA-256. A fingerprint identifies file *content*; modification times
//! never participate in staleness decisions.

use crate::error::{CdpError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of some content
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Borrow the hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for terminal output
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = CdpError;

    fn try_from(value: String) -> Result<Self> {
        let valid = value.len() == 64
            && value
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if valid {
            Ok(Self(value))
        } else {
            Err(CdpError::InvalidFingerprint(value))
        }
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of bytes
pub fn fingerprint(data: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Fingerprint(hex::encode(hasher.finalize()))
}

/// Combine named fingerprints into one corpus fingerprint
///
/// Entries are sorted by name first, so the result does not depend on the
/// order in which files were discovered.
pub fn corpus_fingerprint<'a, I>(entries: I) -> Fingerprint
where
    I: IntoIterator<Item = (&'a str, &'a Fingerprint)>,
{
    let mut entries: Vec<_> = entries.into_iter().collect();
    entries.sort();

    let mut hasher = Sha256::new();
    for (name, fp) in entries {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(fp.as_str().as_bytes());
        hasher.update(b"\n");
    }
    Fingerprint(hex::encode(hasher.finalize()))
}
