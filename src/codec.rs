//! Payload codec seam and key filters.
//!
//! A store hashes keys into buckets, so records for distinct keys share a
//! chain whenever their hashes collide.  The store never disambiguates on its
//! own; callers inject two things instead:
//!
//! - a [`Codec`] that transforms payloads on the way in and out, typically to
//!   embed the key in the stored bytes, and
//! - a key filter (`fn(key, stored_bytes) -> bool`) that reads that embedded
//!   key back out during lookups.
//!
//! [`KeyPrefixCodec`] plus [`key_prefix_filter`] implement the simplest such
//! scheme: store `key:payload`, filter on the `key:` prefix.

/// A key filter predicate: `filter(key, stored_bytes)` is true when the
/// stored record actually belongs to `key`.
///
/// Filters see the *stored* (encoded) bytes, not decoded payloads.
pub type KeyFilter = dyn Fn(&[u8], &[u8]) -> bool + Send + Sync;

/// Transforms payloads between the caller's form and the stored form.
///
/// `encode` and `decode` must be mutual inverses for the same key or
/// round trips through the store will not reproduce the original payload.
pub trait Codec {
    /// Encode `data` for storage under `key`.
    fn encode(&self, key: &[u8], data: &[u8]) -> Vec<u8>;

    /// Decode stored bytes back into the caller's payload form.
    fn decode(&self, key: &[u8], data: &[u8]) -> Vec<u8>;
}

/// Stores payloads untouched.  The default codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityCodec;

impl Codec for IdentityCodec {
    fn encode(&self, _key: &[u8], data: &[u8]) -> Vec<u8> {
        data.to_vec()
    }

    fn decode(&self, _key: &[u8], data: &[u8]) -> Vec<u8> {
        data.to_vec()
    }
}

/// Prefixes every stored payload with `key:` so collided records can be
/// told apart by [`key_prefix_filter`].
///
/// `decode` strips the prefix only when it matches the key it was asked to
/// decode for; foreign records (collisions read without a filter) come back
/// unchanged, prefix and all.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyPrefixCodec;

impl Codec for KeyPrefixCodec {
    fn encode(&self, key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(key.len() + 1 + data.len());
        out.extend_from_slice(key);
        out.push(b':');
        out.extend_from_slice(data);
        out
    }

    fn decode(&self, key: &[u8], data: &[u8]) -> Vec<u8> {
        if key_prefix_filter(key, data) {
            data[key.len() + 1..].to_vec()
        } else {
            data.to_vec()
        }
    }
}

/// True when `data` starts with `key` followed by a `:` separator.
/// The filter companion to [`KeyPrefixCodec`].
pub fn key_prefix_filter(key: &[u8], data: &[u8]) -> bool {
    data.len() > key.len() && &data[..key.len()] == key && data[key.len()] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trip() {
        let c = IdentityCodec;
        let enc = c.encode(b"k", b"some data");
        assert_eq!(enc, b"some data");
        assert_eq!(c.decode(b"k", &enc), b"some data");
    }

    #[test]
    fn prefix_round_trip() {
        let c = KeyPrefixCodec;
        let enc = c.encode(b"user7", b"payload");
        assert_eq!(enc, b"user7:payload");
        assert_eq!(c.decode(b"user7", &enc), b"payload");
        // Foreign record decoded under the wrong key stays intact.
        assert_eq!(c.decode(b"user8", &enc), b"user7:payload");
    }

    #[test]
    fn prefix_filter() {
        assert!(key_prefix_filter(b"a", b"a:1"));
        assert!(!key_prefix_filter(b"a", b"ab:1"));
        assert!(!key_prefix_filter(b"ab", b"a:1"));
        assert!(!key_prefix_filter(b"a", b"a"));
        assert!(!key_prefix_filter(b"a", b""));
    }
}
