//! Streaming FLV tag reader.
//!
//! The container header is optional: when the first bytes are not the `FLV`
//! signature they are replayed and the whole input is parsed as a bare tag
//! sequence. Each tag payload gets its own allocation whose ownership moves
//! out with the returned [`Tag`].

use std::io::{self, Chain, Cursor, Read};

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, warn};

use crate::flv::header::FlvHeader;
use crate::flv::primitive::decode_u32;
use crate::flv::tag::Tag;
use crate::flv::tag_header::{TagHeader, TagType};
use crate::flv::{FLV_HEADER_LENGTH, FLV_TAG_HEADER_LENGTH, PREVIOUS_TAG_SIZE_LENGTH};

#[derive(Debug, Error)]
pub enum DemuxError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Truncated container header: {read} of 9 bytes")]
    TruncatedHeader { read: usize },

    #[error("Truncated tag header: {read} of 11 bytes")]
    TruncatedTagHeader { read: usize },
}

impl DemuxError {
    /// Whether the input can be skipped and the run continued.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DemuxError::TruncatedHeader { .. })
    }
}

/// How the join engine must treat a tag coming out of the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagClass {
    /// Script data; candidate for metadata extraction, never forwarded.
    Script,
    /// AVC configuration record; cached, never forwarded directly.
    SequenceHeader,
    /// Audio or video subject to trimming and continuity handling.
    Media { key_frame: bool },
}

impl TagClass {
    pub fn of(tag: &Tag) -> Option<Self> {
        match tag.tag_type() {
            TagType::Script => Some(TagClass::Script),
            TagType::Video if tag.is_video_sequence_header() => Some(TagClass::SequenceHeader),
            TagType::Audio | TagType::Video => Some(TagClass::Media {
                key_frame: tag.is_key_frame(),
            }),
            TagType::Other(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct TagReader<R> {
    inner: Chain<Cursor<Vec<u8>>, R>,
    header: Option<FlvHeader>,
    tags_read: u64,
    tags_skipped: u64,
}

impl<R: Read> TagReader<R> {
    /// Reads the optional container header and positions the reader on the
    /// first tag.
    pub fn new(mut reader: R) -> Result<Self, DemuxError> {
        let mut fixed = [0u8; FLV_HEADER_LENGTH];
        let read = read_full(&mut reader, &mut fixed)?;

        let mut this = match read {
            0 => Self::with_prefix(Vec::new(), reader, None),
            FLV_HEADER_LENGTH => match FlvHeader::parse(&fixed) {
                Some(header) => Self::with_prefix(Vec::new(), reader, Some(header)),
                None => {
                    debug!("No FLV signature, reading input as bare tags");
                    Self::with_prefix(fixed.to_vec(), reader, None)
                }
            },
            read => return Err(DemuxError::TruncatedHeader { read }),
        };

        if let Some(header) = this.header.clone() {
            debug!(
                version = header.version,
                flags = header.flags,
                header_length = header.header_length,
                "FLV header"
            );
            if header.version != 1 {
                warn!(version = header.version, "FLV version other than 1, continuing");
            }
            if !header.has_audio() {
                warn!("No audio stream flagged in input header");
            }
            if !header.has_video() {
                warn!("No video stream flagged in input header");
            }
            // Extra header bytes plus the first PreviousTagSize
            this.discard(header.extra_length() + PREVIOUS_TAG_SIZE_LENGTH)?;
        }

        Ok(this)
    }

    fn with_prefix(prefix: Vec<u8>, reader: R, header: Option<FlvHeader>) -> Self {
        Self {
            inner: Cursor::new(prefix).chain(reader),
            header,
            tags_read: 0,
            tags_skipped: 0,
        }
    }

    /// The parsed container header, if the input had one.
    pub fn header(&self) -> Option<&FlvHeader> {
        self.header.as_ref()
    }

    pub fn tags_read(&self) -> u64 {
        self.tags_read
    }

    pub fn tags_skipped(&self) -> u64 {
        self.tags_skipped
    }

    /// Returns the next audio, video or script tag. Tags of any other type
    /// are skipped without interpretation.
    ///
    /// `Ok(None)` marks the end of the input: a clean end at a tag boundary,
    /// or a payload cut short by the end of the file (logged).
    pub fn next_tag(&mut self) -> Result<Option<Tag>, DemuxError> {
        loop {
            let mut header_bytes = [0u8; FLV_TAG_HEADER_LENGTH];
            match read_full(&mut self.inner, &mut header_bytes)? {
                0 => return Ok(None),
                FLV_TAG_HEADER_LENGTH => {}
                read => return Err(DemuxError::TruncatedTagHeader { read }),
            }
            let header = TagHeader::parse(&header_bytes);
            let data_size = header.data_size as usize;

            if let TagType::Other(tag_type) = header.tag_type {
                debug!(tag_type, data_size, "Skipping tag of unknown type");
                self.tags_skipped += 1;
                self.discard(data_size + PREVIOUS_TAG_SIZE_LENGTH)?;
                continue;
            }

            let mut data = vec![0u8; data_size];
            let read = read_full(&mut self.inner, &mut data)?;
            if read < data_size {
                warn!(
                    expected = data_size,
                    read, "Tag payload truncated by end of input, stopping"
                );
                return Ok(None);
            }

            let mut backpointer = [0u8; PREVIOUS_TAG_SIZE_LENGTH];
            let read = read_full(&mut self.inner, &mut backpointer)?;
            let previous_tag_size = if read == PREVIOUS_TAG_SIZE_LENGTH {
                decode_u32(backpointer)
            } else {
                debug!(read, "Last tag has no complete PreviousTagSize");
                0
            };
            let expected = (FLV_TAG_HEADER_LENGTH + data_size) as u32;
            if read == PREVIOUS_TAG_SIZE_LENGTH && previous_tag_size != expected {
                debug!(
                    previous_tag_size,
                    expected, "PreviousTagSize disagrees with tag length"
                );
            }

            self.tags_read += 1;
            return Ok(Some(Tag {
                header,
                data: Bytes::from(data),
                previous_tag_size,
            }));
        }
    }

    /// Discards `len` bytes. Stops quietly at the end of input; the next
    /// header read reports it.
    fn discard(&mut self, len: usize) -> io::Result<()> {
        io::copy(&mut (&mut self.inner).take(len as u64), &mut io::sink())?;
        Ok(())
    }
}

impl<R: Read> Iterator for TagReader<R> {
    type Item = Result<Tag, DemuxError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_tag().transpose()
    }
}

/// Reads until `buf` is full or the input ends; returns the bytes read.
fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
