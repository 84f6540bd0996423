use sha2::{Digest, Sha256};

/// SHA-256 over named data blobs, order-sensitive. Names are part of the digest so moving
/// bytes between blobs changes the fingerprint.
pub fn fingerprint_data(blobs: &[(&str, &[u8])]) -> String {
    let mut hasher = Sha256::new();
    for (name, bytes) in blobs {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    to_hex_lower(&hasher.finalize())
}

fn to_hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_hex_sha256() {
        let hash = fingerprint_data(&[("upgrades", b"[]")]);
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_ascii_uppercase()));
    }

    #[test]
    fn fingerprint_changes_on_edit_order_or_boundary() {
        let base = fingerprint_data(&[("upgrades", b"ab"), ("quests", b"c")]);
        assert_eq!(base, fingerprint_data(&[("upgrades", b"ab"), ("quests", b"c")]));
        assert_ne!(base, fingerprint_data(&[("upgrades", b"ab"), ("quests", b"d")]));
        assert_ne!(base, fingerprint_data(&[("quests", b"c"), ("upgrades", b"ab")]));
        assert_ne!(base, fingerprint_data(&[("upgrades", b"a"), ("quests", b"bc")]));
    }
}
