//! Channel id derivation.
//!
//! Both ends of a session derive channel ids from channel names on their
//! own; no frame ever negotiates them. The scheme is therefore part of the
//! wire contract and is modelled as the [`ChannelIds`] trait so an
//! alternative scheme can be plugged in on both ends.

/// Largest channel id: HTTP/2 stream ids are 31 bits.
pub const MAX_CHANNEL_ID: u32 = 0x7fff_ffff;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Maps channel names to channel ids.
///
/// Implementations must be deterministic and return ids no larger than
/// [`MAX_CHANNEL_ID`]. Id 0 cannot be carried on the wire; callers reject
/// names that map to it.
pub trait ChannelIds: Send + Sync {
    /// The id carried on the wire for `name`.
    fn channel_id(&self, name: &str) -> u32;

    /// Short scheme name for diagnostics.
    fn scheme(&self) -> &'static str;
}

/// Default scheme: 32-bit FNV-1 of the UTF-8 name with the top bit cleared.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Fnv1Ids;

impl ChannelIds for Fnv1Ids {
    fn channel_id(&self, name: &str) -> u32 {
        fnv1_32(name.as_bytes()) & MAX_CHANNEL_ID
    }

    fn scheme(&self) -> &'static str {
        "fnv1-32"
    }
}

/// 32-bit FNV-1 hash (multiply, then xor).
pub fn fnv1_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        hash.wrapping_mul(FNV_PRIME) ^ u32::from(*byte)
    })
}

/// Channel id of `name` under the default [`Fnv1Ids`] scheme.
pub fn channel_id(name: &str) -> u32 {
    Fnv1Ids.channel_id(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1_known_vectors() {
        assert_eq!(fnv1_32(b""), 0x811c_9dc5);
        assert_eq!(fnv1_32(b"a"), 0x050c_5d7e);
        assert_eq!(fnv1_32(b"stdin"), 0x696d_ca81);
    }

    #[test]
    fn ids_fit_in_31_bits() {
        assert_eq!(channel_id("a"), 84_696_446);
        assert_eq!(channel_id("b"), 84_696_445);
        for name in ["stdin", "stdout", "stderr", "error", "resize", "[0]a"] {
            assert!(channel_id(name) <= MAX_CHANNEL_ID);
        }
    }

    #[test]
    fn ids_are_deterministic() {
        assert_eq!(channel_id("stdout"), channel_id("stdout"));
        assert_ne!(channel_id("stdout"), channel_id("stderr"));
    }

    #[test]
    fn scheme_name() {
        assert_eq!(Fnv1Ids.scheme(), "fnv1-32");
    }
}
