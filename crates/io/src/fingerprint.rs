// Input fingerprints for run reports

use std::path::Path;

use blake3::Hasher;

/// BLAKE3 of raw bytes, hex-encoded (64 chars).
pub fn fingerprint_bytes(data: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize().to_hex().to_string()
}

/// BLAKE3 of a file's bytes as stored on disk, before any decoding.
pub fn fingerprint_file(path: &Path) -> Result<String, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    Ok(fingerprint_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_hex() {
        let a = fingerprint_bytes(b"circuitoId,cantidadElectores\n1,100\n");
        let b = fingerprint_bytes(b"circuitoId,cantidadElectores\n1,100\n");
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        assert_ne!(a, fingerprint_bytes(b"circuitoId,cantidadElectores\n1,101\n"));
    }

    #[test]
    fn test_fingerprint_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("origin.csv");
        std::fs::write(&path, b"id,pop\n1,2\n").unwrap();
        assert_eq!(fingerprint_file(&path).unwrap(), fingerprint_bytes(b"id,pop\n1,2\n"));
        assert!(fingerprint_file(&dir.path().join("nope.csv")).is_err());
    }
}
