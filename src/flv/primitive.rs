//! Fixed-width big-endian primitives used by the FLV container and the
//! script-data grammar.
//!
//! Every conversion goes through `from_be_bytes` / `to_be_bytes`, which
//! reorder bytes explicitly for the host, so the same code is correct on
//! little- and big-endian targets.

/// Byte order of the machine we are running on. Only reported in diagnostics.
pub const HOST_IS_LITTLE_ENDIAN: bool = cfg!(target_endian = "little");

#[inline]
pub fn decode_u16(bytes: [u8; 2]) -> u16 {
    u16::from_be_bytes(bytes)
}

#[inline]
pub fn decode_i16(bytes: [u8; 2]) -> i16 {
    i16::from_be_bytes(bytes)
}

/// Decodes a 24-bit value. `high` becomes bits 24..32, which is how the tag
/// header packs a 32-bit timestamp into a 3-byte field plus an extension byte.
#[inline]
pub fn decode_u24(bytes: [u8; 3], high: u8) -> u32 {
    u32::from_be_bytes([high, bytes[0], bytes[1], bytes[2]])
}

#[inline]
pub fn decode_u32(bytes: [u8; 4]) -> u32 {
    u32::from_be_bytes(bytes)
}

#[inline]
pub fn decode_f64(bytes: [u8; 8]) -> f64 {
    f64::from_be_bytes(bytes)
}

#[inline]
pub fn encode_u16(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

#[inline]
pub fn encode_i16(value: i16) -> [u8; 2] {
    value.to_be_bytes()
}

/// Encodes the low 24 bits of `value`; the top byte is discarded.
#[inline]
pub fn encode_u24(value: u32) -> [u8; 3] {
    let [_, a, b, c] = value.to_be_bytes();
    [a, b, c]
}

/// Encodes a 32-bit value as a 24-bit field followed by its high-order
/// extension byte (the tag header timestamp layout).
#[inline]
pub fn encode_u24_extended(value: u32) -> [u8; 4] {
    let [high, a, b, c] = value.to_be_bytes();
    [a, b, c, high]
}

#[inline]
pub fn encode_u32(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

#[inline]
pub fn encode_f64(value: f64) -> [u8; 8] {
    value.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u16_round_trip() {
        for value in [0u16, 1, u16::MAX, 0x1234] {
            assert_eq!(decode_u16(encode_u16(value)), value);
        }
        assert_eq!(encode_u16(0x1234), [0x12, 0x34]);
    }

    #[test]
    fn test_u24_round_trip() {
        for value in [0u32, 1, 0x00FF_FFFF, 0x0012_3456] {
            let [a, b, c] = encode_u24(value);
            assert_eq!(decode_u24([a, b, c], 0), value);
        }
        assert_eq!(encode_u24(0x0012_3456), [0x12, 0x34, 0x56]);
        // bits above 24 are dropped
        assert_eq!(encode_u24(0xAB12_3456), [0x12, 0x34, 0x56]);
    }

    #[test]
    fn test_u24_with_extension_byte() {
        for value in [0u32, 1, u32::MAX, 0x8765_4321] {
            let [a, b, c, high] = encode_u24_extended(value);
            assert_eq!(decode_u24([a, b, c], high), value);
        }
        assert_eq!(encode_u24_extended(0x0102_0304), [0x02, 0x03, 0x04, 0x01]);
    }

    #[test]
    fn test_u32_round_trip() {
        for value in [0u32, 1, u32::MAX, 0x1234_5678] {
            assert_eq!(decode_u32(encode_u32(value)), value);
        }
        assert_eq!(encode_u32(0x1234_5678), [0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn test_f64_round_trip() {
        for value in [0.0f64, 1.0, f64::MAX, 1234.5678, -1.0] {
            assert_eq!(decode_f64(encode_f64(value)), value);
        }
        assert_eq!(
            encode_f64(1.0),
            [0x3F, 0xF0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_i16_is_signed() {
        assert_eq!(decode_i16([0xFF, 0xC4]), -60);
        assert_eq!(encode_i16(-60), [0xFF, 0xC4]);
    }
}
