//! Test fixtures for generating test data.

use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use lode_core::ContentHash;
use lode_metadata::models::NewVersion;
use lode_server::{Principal, PublishRequest};
use serde_json::{Value, json};
use time::OffsetDateTime;

/// Generate deterministic test data based on a seed.
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        // Simple LCG for deterministic data
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// Build a gzip tarball from `(path, contents)` pairs.
#[allow(dead_code)]
pub fn tarball(files: &[(&str, &[u8])]) -> Bytes {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, *contents)
            .expect("Failed to append tar entry");
    }
    let encoder = builder.into_inner().expect("Failed to finish tarball");
    Bytes::from(encoder.finish().expect("Failed to finish gzip stream"))
}

/// Minimal manifest for `version`.
#[allow(dead_code)]
pub fn manifest(version: &str) -> Value {
    json!({ "version": version })
}

/// Artifact bytes that differ per package and version.
#[allow(dead_code)]
pub fn artifact_for(package: &str, version: &str) -> Bytes {
    let seed = package
        .bytes()
        .chain(version.bytes())
        .fold(17u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
    seeded_bytes(seed, 256)
}

/// A publish command with a generated artifact.
#[allow(dead_code)]
pub fn publish_request(package: &str, version: &str) -> PublishRequest {
    PublishRequest {
        package: package.to_string(),
        manifest: manifest(version),
        artifact: artifact_for(package, version),
        readme: None,
    }
}

/// Store-level publish input with a generated artifact.
#[allow(dead_code)]
pub fn new_version(package: &str, version: &str) -> NewVersion {
    let artifact = artifact_for(package, version);
    NewVersion {
        package: package.to_string(),
        version: version.to_string(),
        manifest: manifest(version).to_string(),
        description: None,
        readme: lode_core::DEFAULT_README.to_string(),
        shasum: ContentHash::compute(&artifact).to_hex(),
        artifact: artifact.to_vec(),
        created_at: OffsetDateTime::now_utc(),
    }
}

#[allow(dead_code)]
pub fn principal(username: &str) -> Principal {
    Principal {
        username: username.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_bytes_deterministic() {
        let a = seeded_bytes(42, 100);
        let b = seeded_bytes(42, 100);
        assert_eq!(a, b);

        let c = seeded_bytes(43, 100);
        assert_ne!(a, c);
    }

    #[test]
    fn test_artifacts_differ_per_version() {
        assert_ne!(artifact_for("foo", "1.0.0"), artifact_for("foo", "1.0.1"));
        assert_eq!(artifact_for("foo", "1.0.0"), artifact_for("foo", "1.0.0"));
    }
}
