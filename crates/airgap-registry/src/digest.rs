//! SHA-256 helpers shared by the artifact clients

use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// `sha256:<hex>` digest of data
pub fn compute_digest(data: &[u8]) -> String {
    format!("sha256:{}", sha256_hex(data))
}

/// Bare hex SHA-256 of data
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Bare hex SHA-256 of a file, read in chunks
pub fn file_sha256_hex(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compare digests ignoring case and the `sha256:` / `sha256-` prefix
pub fn digest_matches(expected: &str, actual: &str) -> bool {
    normalize(expected) == normalize(actual)
}

fn normalize(digest: &str) -> String {
    let digest = digest.trim().to_lowercase();
    digest
        .strip_prefix("sha256:")
        .or_else(|| digest.strip_prefix("sha256-"))
        .unwrap_or(&digest)
        .to_string()
}
