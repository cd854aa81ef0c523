use crate::flv::FLV_TAG_HEADER_LENGTH;
use crate::flv::primitive::{decode_u24, encode_u24, encode_u24_extended};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagType {
    Audio,
    Video,
    Script,
    Other(u8),
}

impl From<u8> for TagType {
    fn from(value: u8) -> Self {
        match value {
            0x08 => TagType::Audio,
            0x09 => TagType::Video,
            0x12 => TagType::Script,
            other => TagType::Other(other),
        }
    }
}

impl From<TagType> for u8 {
    fn from(value: TagType) -> Self {
        match value {
            TagType::Audio => 0x08,
            TagType::Video => 0x09,
            TagType::Script => 0x12,
            TagType::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagHeader {
    pub tag_type: TagType,
    pub data_size: u32, // 24 bits on the wire
    pub timestamp: u32, // 24 bits + 8-bit extension on the wire
    pub stream_id: u32, // Always 0 in practice
}

impl TagHeader {
    pub fn parse(bytes: &[u8; FLV_TAG_HEADER_LENGTH]) -> Self {
        Self {
            tag_type: TagType::from(bytes[0]),
            data_size: decode_u24([bytes[1], bytes[2], bytes[3]], 0),
            timestamp: decode_u24([bytes[4], bytes[5], bytes[6]], bytes[7]),
            stream_id: decode_u24([bytes[8], bytes[9], bytes[10]], 0),
        }
    }

    pub fn as_bytes(&self) -> [u8; FLV_TAG_HEADER_LENGTH] {
        let mut bytes = [0u8; FLV_TAG_HEADER_LENGTH];

        bytes[0] = self.tag_type.into();
        bytes[1..4].copy_from_slice(&encode_u24(self.data_size));
        bytes[4..8].copy_from_slice(&encode_u24_extended(self.timestamp));
        bytes[8..11].copy_from_slice(&encode_u24(self.stream_id));

        bytes
    }

    pub fn is_audio(&self) -> bool {
        self.tag_type == TagType::Audio
    }

    pub fn is_video(&self) -> bool {
        self.tag_type == TagType::Video
    }

    pub fn is_script_data(&self) -> bool {
        self.tag_type == TagType::Script
    }
}
