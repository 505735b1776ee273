//! Content hashing for the content-addressed data store
//!
//! Objects are named by the lowercase hex SHA-256 of their content.

use sha2::{Digest, Sha256};
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::application::{ApplicationResult, IoResultExt};
use crate::infrastructure::traits::FileSystem;

/// Length of a full hex digest.
pub const DIGEST_LEN: usize = 64;

/// Compute the hex SHA-256 of in-memory content.
pub fn content_digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Hex SHA-256 of everything `reader` yields.
pub fn reader_digest(reader: impl Read) -> io::Result<String> {
    let mut reader = BufReader::new(reader);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Compute the hex SHA-256 of a file opened through `fs`, streaming its content.
pub fn file_digest(fs: &dyn FileSystem, path: &Path) -> ApplicationResult<String> {
    let file = fs.open(path).with_path_context("open file for hashing", path)?;
    reader_digest(file).with_path_context("read file for hashing", path)
}

/// Check that `s` looks like a digest produced by this module.
pub fn is_digest(s: &str) -> bool {
    s.len() == DIGEST_LEN && s.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// First 8 characters, for display.
pub fn short_digest(digest: &str) -> &str {
    &digest[..digest.len().min(8)]
}
