use crate::flv::primitive::{decode_u32, encode_u32};
use crate::flv::{FLV_HEADER_LENGTH, PREVIOUS_TAG_SIZE_LENGTH};

pub const FLV_SIGNATURE: [u8; 3] = *b"FLV";
pub const FLAG_AUDIO: u8 = 0x04;
pub const FLAG_VIDEO: u8 = 0x01;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlvHeader {
    pub version: u8,
    pub flags: u8,
    /// Declared header length, including the 9 fixed bytes.
    pub header_length: u32,
}

impl FlvHeader {
    /// Header written for the joined output: version 1, audio and video present.
    pub fn joined() -> Self {
        Self {
            version: 1,
            flags: FLAG_AUDIO | FLAG_VIDEO,
            header_length: FLV_HEADER_LENGTH as u32,
        }
    }

    /// Parses the fixed 9 header bytes. Returns `None` when the signature
    /// does not match, i.e. the stream is a bare tag sequence.
    pub fn parse(bytes: &[u8; FLV_HEADER_LENGTH]) -> Option<Self> {
        if bytes[0..3] != FLV_SIGNATURE {
            return None;
        }
        Some(Self {
            version: bytes[3],
            flags: bytes[4],
            header_length: decode_u32([bytes[5], bytes[6], bytes[7], bytes[8]]),
        })
    }

    /// Bytes following the fixed part that belong to the header.
    pub fn extra_length(&self) -> usize {
        (self.header_length as usize).saturating_sub(FLV_HEADER_LENGTH)
    }

    pub fn as_bytes(&self) -> [u8; FLV_HEADER_LENGTH] {
        let [a, b, c, d] = encode_u32(self.header_length);
        [
            FLV_SIGNATURE[0],
            FLV_SIGNATURE[1],
            FLV_SIGNATURE[2],
            self.version,
            self.flags,
            a,
            b,
            c,
            d,
        ]
    }

    // The header followed by the zero PreviousTagSize that opens the tag sequence
    pub fn as_bytes_with_previous_tag_size(
        &self,
    ) -> [u8; FLV_HEADER_LENGTH + PREVIOUS_TAG_SIZE_LENGTH] {
        let mut bytes = [0u8; FLV_HEADER_LENGTH + PREVIOUS_TAG_SIZE_LENGTH];

        bytes[0..FLV_HEADER_LENGTH].copy_from_slice(&self.as_bytes());

        bytes
    }

    pub fn has_audio(&self) -> bool {
        (self.flags & FLAG_AUDIO) != 0
    }

    pub fn has_video(&self) -> bool {
        (self.flags & FLAG_VIDEO) != 0
    }
}
