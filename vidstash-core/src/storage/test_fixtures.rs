//! Test fixtures for storage testing.
//!
//! Provides isolated storage roots and deterministic media payloads so
//! range arithmetic can be checked byte for byte.

use super::StorageRoot;

/// Creates a storage root backed by a fresh temporary directory.
///
/// The `TempDir` must be kept alive for as long as the root is used.
///
/// # Panics
///
/// Panics if the temporary directory cannot be created.
/// This is acceptable in test fixtures where failures indicate environment issues.
pub fn create_temp_storage_root() -> (tempfile::TempDir, StorageRoot) {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = StorageRoot::new(temp_dir.path());
    (temp_dir, root)
}

/// Deterministic payload where every byte encodes its own offset.
pub fn media_payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Writes a payload of `size` bytes to `filename` and returns the bytes.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_media_file(root: &StorageRoot, filename: &str, size: usize) -> Vec<u8> {
    let payload = media_payload(size);
    std::fs::write(root.path().join(filename), &payload).unwrap();
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_is_offset_pattern() {
        let payload = media_payload(600);
        assert_eq!(payload.len(), 600);
        assert_eq!(payload[0], 0);
        assert_eq!(payload[250], 250);
        assert_eq!(payload[251], 0);
    }

    #[test]
    fn test_write_media_file() {
        let (_temp_dir, root) = create_temp_storage_root();
        let payload = write_media_file(&root, "fixture.mp4", 128);

        let on_disk = std::fs::read(root.path().join("fixture.mp4")).unwrap();
        assert_eq!(on_disk, payload);
    }
}
