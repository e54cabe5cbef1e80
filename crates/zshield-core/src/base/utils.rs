//! Byte-order helpers for hashes and tree nodes.

use serde_with::hex::Hex;

/// A `serde_as` adapter that reverses byte order before hex encoding.
///
/// Anchors and commitments are displayed byte-reversed, the same way block
/// explorers and node RPCs print 256-bit hashes.
pub struct ReversedHex;

impl<const N: usize> serde_with::SerializeAs<[u8; N]> for ReversedHex {
    fn serialize_as<S>(value: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let reversed = reverse_bytes(value);
        <Hex as serde_with::SerializeAs<[u8; N]>>::serialize_as(&reversed, serializer)
    }
}

impl<'de, const N: usize> serde_with::DeserializeAs<'de, [u8; N]> for ReversedHex {
    fn deserialize_as<D>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes: [u8; N] =
            <Hex as serde_with::DeserializeAs<'de, [u8; N]>>::deserialize_as(deserializer)?;
        Ok(reverse_bytes(&bytes))
    }
}

/// Hex-encode `bytes` in display (reversed) order.
#[must_use]
pub fn reversed_hex<const N: usize>(bytes: &[u8; N]) -> String {
    hex::encode(reverse_bytes(bytes))
}

#[allow(
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    reason = "Loop is bounded by N, indexing is always in bounds"
)]
const fn reverse_bytes<const N: usize>(input: &[u8; N]) -> [u8; N] {
    let mut output = [0_u8; N];
    let mut i = 0;
    while i < N {
        output[i] = input[N - 1 - i];
        i += 1;
    }
    output
}
