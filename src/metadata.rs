//! `onMetaData` handling for the joined file.
//!
//! A placeholder document is written before any media tag, with the output
//! offset of every patchable value recorded. Script tags seen in the inputs
//! fill in stream properties until one of them proves to be an actual
//! `onMetaData` block; after the last input, duration and file size are
//! computed and every recorded value is rewritten in place.

use bytes::{BufMut, BytesMut};
use tracing::{debug, info};

use crate::flv::FLV_TAG_HEADER_LENGTH;
use crate::flv::tag::Tag;
use crate::flv::tag_header::TagType;
use crate::script::encode::{encode_string, encode_value, value_bytes};
use crate::script::value::{MARKER_ECMA_ARRAY, MARKER_STRING, OBJECT_END};
use crate::script::{ScriptError, ScriptValue, decode_document};

pub const ON_METADATA: &str = "onMetaData";
pub const METADATA_CREATOR: &str = concat!("flvjoin v", env!("CARGO_PKG_VERSION"));

/// Encoders write -1 for "unknown"; such values never overwrite a field.
const NO_NUMERIC_VALUE: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Duration,
    Width,
    Height,
    Framerate,
    VideoCodecId,
    AudioSampleRate,
    AudioSampleSize,
    Stereo,
    AudioCodecId,
    FileSize,
}

impl Field {
    /// Order in which the fields appear in the written document.
    pub const ALL: [Field; 10] = [
        Field::Duration,
        Field::Width,
        Field::Height,
        Field::Framerate,
        Field::VideoCodecId,
        Field::AudioSampleRate,
        Field::AudioSampleSize,
        Field::Stereo,
        Field::AudioCodecId,
        Field::FileSize,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Duration => "duration",
            Field::Width => "width",
            Field::Height => "height",
            Field::Framerate => "framerate",
            Field::VideoCodecId => "videocodecid",
            Field::AudioSampleRate => "audiosamplerate",
            Field::AudioSampleSize => "audiosamplesize",
            Field::Stereo => "stereo",
            Field::AudioCodecId => "audiocodecid",
            Field::FileSize => "filesize",
        }
    }

    /// Fields taken over from the inputs. Duration and file size describe
    /// the joined output and are always computed.
    fn from_input_name(name: &[u8]) -> Option<Self> {
        Field::ALL
            .into_iter()
            .filter(|f| !matches!(f, Field::Duration | Field::FileSize))
            .find(|f| f.name().as_bytes() == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataRecord {
    /// Seconds.
    pub duration: f64,
    pub width: f64,
    pub height: f64,
    pub framerate: f64,
    pub videocodecid: f64,
    pub audiosamplerate: f64,
    pub audiosamplesize: f64,
    pub stereo: bool,
    pub audiocodecid: f64,
    /// Bytes.
    pub filesize: f64,
}

impl MetadataRecord {
    pub fn value(&self, field: Field) -> ScriptValue {
        match field {
            Field::Duration => ScriptValue::Number(self.duration),
            Field::Width => ScriptValue::Number(self.width),
            Field::Height => ScriptValue::Number(self.height),
            Field::Framerate => ScriptValue::Number(self.framerate),
            Field::VideoCodecId => ScriptValue::Number(self.videocodecid),
            Field::AudioSampleRate => ScriptValue::Number(self.audiosamplerate),
            Field::AudioSampleSize => ScriptValue::Number(self.audiosamplesize),
            Field::Stereo => ScriptValue::Boolean(self.stereo),
            Field::AudioCodecId => ScriptValue::Number(self.audiocodecid),
            Field::FileSize => ScriptValue::Number(self.filesize),
        }
    }

    pub fn set(&mut self, field: Field, value: f64) {
        match field {
            Field::Duration => self.duration = value,
            Field::Width => self.width = value,
            Field::Height => self.height = value,
            Field::Framerate => self.framerate = value,
            Field::VideoCodecId => self.videocodecid = value,
            Field::AudioSampleRate => self.audiosamplerate = value,
            Field::AudioSampleSize => self.audiosamplesize = value,
            Field::Stereo => self.stereo = value != 0.0,
            Field::AudioCodecId => self.audiocodecid = value,
            Field::FileSize => self.filesize = value,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetadataPatcher {
    record: MetadataRecord,
    /// Output offset of each field's value marker, in `Field::ALL` order.
    offsets: [u64; 10],
    authoritative: bool,
}

impl MetadataPatcher {
    /// Builds the placeholder `onMetaData` tag that will be written at
    /// output offset `tag_offset`, recording where each value lands.
    pub fn placeholder(tag_offset: u64) -> (Self, Tag) {
        let record = MetadataRecord::default();
        let payload_offset = tag_offset + FLV_TAG_HEADER_LENGTH as u64;
        let mut offsets = [0u64; 10];

        let mut out = BytesMut::new();
        out.put_u8(MARKER_STRING);
        encode_string(ON_METADATA.as_bytes(), &mut out);
        out.put_u8(MARKER_ECMA_ARRAY);
        out.put_u32(Field::ALL.len() as u32 + 1);
        for (slot, field) in offsets.iter_mut().zip(Field::ALL) {
            encode_string(field.name().as_bytes(), &mut out);
            *slot = payload_offset + out.len() as u64;
            encode_value(&record.value(field), &mut out);
        }
        encode_string(b"metadatacreator", &mut out);
        encode_value(&ScriptValue::string(METADATA_CREATOR), &mut out);
        out.put_slice(&OBJECT_END);

        let tag = Tag::new(TagType::Script, 0, out.freeze());
        let patcher = Self {
            record,
            offsets,
            authoritative: false,
        };
        (patcher, tag)
    }

    pub fn record(&self) -> &MetadataRecord {
        &self.record
    }

    /// True once a script tag carrying `onMetaData` has been taken in.
    pub fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    /// Takes stream properties from an input script tag. A payload that
    /// fails to decode contributes nothing.
    pub fn accumulate(&mut self, tag: &Tag) -> Result<(), ScriptError> {
        if self.authoritative {
            return Ok(());
        }
        let document = decode_document(tag.data.clone())?;

        document.walk(|property| {
            let Some(field) = Field::from_input_name(&property.name) else {
                return;
            };
            match property.value.numeric_value() {
                Some(value) if value != NO_NUMERIC_VALUE => {
                    debug!(field = field.name(), value, "Metadata field");
                    self.record.set(field, value);
                }
                _ => {}
            }
        });

        if document.contains_name(ON_METADATA) {
            info!("Metadata successfully extracted");
            self.authoritative = true;
        }
        Ok(())
    }

    /// Sets the values that are only known once the whole output exists.
    pub fn finalize(&mut self, duration_ms: u64, filesize: u64) {
        self.record.duration = duration_ms as f64 / 1000.0;
        self.record.filesize = filesize as f64;
    }

    /// Output offset and encoded bytes for every placeholder.
    pub fn patches(&self) -> impl Iterator<Item = (u64, BytesMut)> + '_ {
        self.offsets
            .iter()
            .zip(Field::ALL)
            .map(|(offset, field)| (*offset, value_bytes(&self.record.value(field))))
    }
}
