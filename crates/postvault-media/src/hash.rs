//! Content hashing. The content address is the lowercase hex SHA-256 of the
//! file bytes, never derived from the source URL.

use std::path::Path;

use sha2::{Digest, Sha256};

/// Hash a byte slice to its 64-char lowercase hex content address.
#[must_use]
pub fn hash_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Hash a file on disk by streaming it in chunks.
///
/// # Errors
///
/// Returns [`std::io::Error`] if the file cannot be opened or read.
pub async fn hash_file(path: &Path) -> Result<String, std::io::Error> {
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
