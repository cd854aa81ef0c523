use bytes::Bytes;

use crate::flv::tag_header::{TagHeader, TagType};
use crate::flv::{FLV_TAG_HEADER_LENGTH, PREVIOUS_TAG_SIZE_LENGTH};

const CODEC_AVC: u8 = 7;
const AVC_SEQUENCE_HEADER: u8 = 0;
const FRAME_TYPE_KEY: u8 = 1;

/// One FLV tag: header, payload and the trailing PreviousTagSize read with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub header: TagHeader,
    pub data: Bytes,
    /// Backpointer as found in the source. Not trusted; rewritten on output.
    pub previous_tag_size: u32,
}

impl Tag {
    pub fn new(tag_type: TagType, timestamp: u32, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let data_size = data.len() as u32;
        Self {
            header: TagHeader {
                tag_type,
                data_size,
                timestamp,
                stream_id: 0,
            },
            data,
            previous_tag_size: data_size + FLV_TAG_HEADER_LENGTH as u32,
        }
    }

    pub fn timestamp(&self) -> u32 {
        self.header.timestamp
    }

    pub fn tag_type(&self) -> TagType {
        self.header.tag_type
    }

    /// Size of the tag as it lands on the wire, backpointer included.
    pub fn encoded_len(&self) -> usize {
        FLV_TAG_HEADER_LENGTH + self.data.len() + PREVIOUS_TAG_SIZE_LENGTH
    }

    /// Serializes the tag with `timestamp` in place of the source timestamp.
    /// The backpointer is always recomputed from the payload length.
    pub fn as_bytes_with_timestamp(&self, timestamp: u32) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_len());

        let header = TagHeader {
            timestamp,
            data_size: self.data.len() as u32,
            ..self.header.clone()
        };
        bytes.extend_from_slice(&header.as_bytes());
        bytes.extend_from_slice(&self.data);
        let backpointer = (FLV_TAG_HEADER_LENGTH + self.data.len()) as u32;
        bytes.extend_from_slice(&backpointer.to_be_bytes());

        bytes
    }

    pub fn is_audio(&self) -> bool {
        self.header.is_audio()
    }

    pub fn is_video(&self) -> bool {
        self.header.is_video()
    }

    pub fn is_script_data(&self) -> bool {
        self.header.is_script_data()
    }

    /// AVC decoder configuration record: codec id 7, AVC packet type 0.
    pub fn is_video_sequence_header(&self) -> bool {
        self.is_video()
            && self.data.len() >= 2
            && self.data[0] & 0x0F == CODEC_AVC
            && self.data[1] == AVC_SEQUENCE_HEADER
    }

    /// Audio tags always count as key frames; video tags when the frame
    /// type nibble says so.
    pub fn is_key_frame(&self) -> bool {
        match self.header.tag_type {
            TagType::Audio => true,
            TagType::Video => self.data.first().is_some_and(|b| b >> 4 == FRAME_TYPE_KEY),
            _ => false,
        }
    }
}
