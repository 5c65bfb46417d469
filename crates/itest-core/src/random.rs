//! Random identifiers for container names and credentials.

use uuid::Uuid;

/// Returns `len` random lowercase hexadecimal characters.
///
/// Backed by UUIDv4, whose bits come from the OS random source.
pub fn random_string(len: usize) -> String {
    let mut out = String::with_capacity(len);
    while out.len() < len {
        let chunk = Uuid::new_v4().simple().to_string();
        let take = (len - out.len()).min(chunk.len());
        out.push_str(&chunk[..take]);
    }
    out
}
