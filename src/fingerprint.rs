//! Request fingerprints.
//!
//! A fingerprint is the hex SHA-256 of a normalized request: the URL without
//! its fragment, followed by the values of the configured vary headers, encoded
//! as JSON so no two distinct requests share a normalized form.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::models::CacheRequest;

/// Deterministic digest identifying cache-equivalent requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps a request to its lookup key.
pub trait Fingerprinter: Send + Sync + fmt::Debug + 'static {
    fn fingerprint(&self, request: &CacheRequest) -> Fingerprint;
}

/// SHA-256 over the URL and a fixed set of request headers.
#[derive(Debug, Clone, Default)]
pub struct RequestFingerprinter {
    vary: Vec<String>,
}

impl RequestFingerprinter {
    /// Creates a fingerprinter that also hashes the given request headers.
    ///
    /// Header names are compared case-insensitively and their order does not matter.
    pub fn new<I, S>(vary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vary: Vec<String> = vary
            .into_iter()
            .map(|name| name.as_ref().trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .collect();
        vary.sort();
        vary.dedup();
        Self { vary }
    }

    /// Normalized form that gets hashed: a JSON array of the URL followed by
    /// `[name, [values..]]` for each vary header. JSON string escaping keeps
    /// header values from spilling into their neighbours.
    pub fn normalize(&self, request: &CacheRequest) -> String {
        let mut url = request.url().clone();
        url.set_fragment(None);

        let vary: Vec<(&str, Vec<&str>)> = self
            .vary
            .iter()
            .map(|name| (name.as_str(), request.headers().get_all(name).collect()))
            .collect();
        serde_json::json!([url.as_str(), vary]).to_string()
    }
}

impl Fingerprinter for RequestFingerprinter {
    fn fingerprint(&self, request: &CacheRequest) -> Fingerprint {
        let digest = Sha256::digest(self.normalize(request).as_bytes());
        Fingerprint(hex::encode(digest))
    }
}
