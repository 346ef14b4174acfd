// src/cache/fingerprint.rs

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Size of the chunks a file is streamed through the hasher in.
const CHUNK_SIZE: usize = 128 * 1024;

/// Hex-encoded BLAKE3 (256-bit) digest of a file's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
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

/// Fingerprints keyed by the path they were taken from.
pub type FingerprintMap = BTreeMap<PathBuf, Fingerprint>;

/// Compute the fingerprint of a single file.
pub fn compute_file_hash(path: &Path) -> std::io::Result<Fingerprint> {
    let mut hasher = Hasher::new();
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Fingerprint(hasher.finalize().to_hex().to_string()))
}

/// Fingerprint a file, treating a missing or unreadable file as "no
/// fingerprint". Callers interpret `None` as a staleness signal.
pub fn fingerprint(path: &Path) -> Option<Fingerprint> {
    match compute_file_hash(path) {
        Ok(fp) => {
            debug!(path = ?path, fingerprint = %fp, "fingerprinted file");
            Some(fp)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = ?path, "file missing; no fingerprint");
            None
        }
        Err(e) => {
            warn!(path = ?path, error = %e, "cannot fingerprint file; treating as changed");
            None
        }
    }
}

/// Fingerprint every path in `keys`, locating each file through `locate`.
///
/// The map is keyed by the declared path; files without a fingerprint are
/// left out.
pub fn fingerprint_all<'a, I>(keys: I, locate: impl Fn(&Path) -> PathBuf) -> FingerprintMap
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    keys.into_iter()
        .filter_map(|key| fingerprint(&locate(key)).map(|fp| (key.clone(), fp)))
        .collect()
}
