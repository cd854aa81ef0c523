//! Tag writer for the joined output.
//!
//! [`TagWriter`] tracks how many bytes it has written so that the metadata
//! placeholders can be located again, and applies the per-file timestamp
//! offset while keeping the audio timeline strictly increasing.

use std::io::{self, Seek, SeekFrom, Write};

use tracing::{info, warn};

use crate::flv::header::FlvHeader;
use crate::flv::tag::Tag;
use crate::flv::tag_header::TagType;

/// Timeline state carried across every input of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Continuity {
    /// Output timestamp of the last video tag written.
    pub last_video_timestamp: Option<u32>,
    /// Output timestamp of the last audio tag written. `None` sorts below
    /// every real timestamp.
    pub last_audio_timestamp: Option<u32>,
    /// Payload size of the last tag written, whatever its type.
    pub last_packet_size: u32,
}

impl Continuity {
    /// Length of the joined timeline in milliseconds.
    ///
    /// When video ends last, one frame interval is added for the final
    /// frame. Otherwise the final audio frame's duration is estimated from
    /// its size and the nominal audio bitrate.
    pub fn duration_ms(&self, frame_interval_ms: u32, audio_bitrate: u32) -> u64 {
        if self.last_video_timestamp >= self.last_audio_timestamp {
            u64::from(self.last_video_timestamp.unwrap_or(0)) + u64::from(frame_interval_ms)
        } else {
            let last_audio = u64::from(self.last_audio_timestamp.unwrap_or(0));
            let bits = f64::from(self.last_packet_size) * 8.0;
            let tail = (1000.0 * bits / f64::from(audio_bitrate.max(1))).round() as u64;
            last_audio + tail
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { timestamp: u32 },
    /// Audio that would not move the audio timeline forward.
    DroppedOverlap { timestamp: u32, last_audio: u32 },
    /// Adjusted timestamp outside the 32-bit range of the format.
    DroppedOutOfRange { timestamp: i64 },
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written { .. })
    }
}

#[derive(Debug)]
pub struct TagWriter<W> {
    inner: W,
    position: u64,
}

impl<W: Write> TagWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    /// Bytes written so far, i.e. the offset of the next byte.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn write_header(&mut self, header: &FlvHeader) -> io::Result<()> {
        self.write_raw(&header.as_bytes_with_previous_tag_size())
    }

    /// Writes `tag` with `offset` added to its timestamp and updates the
    /// continuity counters. Overlapping audio is reported and not written.
    pub fn write_tag(
        &mut self,
        tag: &Tag,
        offset: i64,
        continuity: &mut Continuity,
    ) -> io::Result<WriteOutcome> {
        let adjusted = i64::from(tag.timestamp()) + offset;
        let Ok(timestamp) = u32::try_from(adjusted) else {
            warn!(
                source_timestamp = tag.timestamp(),
                offset, "Dropping tag whose adjusted timestamp is out of range"
            );
            return Ok(WriteOutcome::DroppedOutOfRange { timestamp: adjusted });
        };

        if tag.is_audio()
            && let Some(last_audio) = continuity.last_audio_timestamp
            && timestamp <= last_audio
        {
            info!(
                timestamp,
                last_audio, "Dropping overlapping audio packet"
            );
            return Ok(WriteOutcome::DroppedOverlap {
                timestamp,
                last_audio,
            });
        }

        self.write_raw(&tag.as_bytes_with_timestamp(timestamp))?;

        match tag.tag_type() {
            TagType::Video => continuity.last_video_timestamp = Some(timestamp),
            TagType::Audio => continuity.last_audio_timestamp = Some(timestamp),
            _ => {}
        }
        continuity.last_packet_size = tag.data.len() as u32;

        Ok(WriteOutcome::Written { timestamp })
    }

    fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Seek> TagWriter<W> {
    /// Overwrites bytes at an earlier `offset` and returns to the end of
    /// the stream.
    pub fn patch_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        if offset + bytes.len() as u64 > self.position {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("patch at {offset} runs past end of output ({})", self.position),
            ));
        }
        self.inner.seek(SeekFrom::Start(offset))?;
        self.inner.write_all(bytes)?;
        self.inner.seek(SeekFrom::Start(self.position))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn audio(timestamp: u32, size: usize) -> Tag {
        Tag::new(TagType::Audio, timestamp, vec![0xAF; size])
    }

    fn video(timestamp: u32) -> Tag {
        Tag::new(TagType::Video, timestamp, vec![0x17, 0x01])
    }

    #[test]
    fn test_write_applies_offset_and_updates_counters() {
        let mut writer = TagWriter::new(Vec::new());
        let mut continuity = Continuity::default();

        let outcome = writer.write_tag(&video(40), 60, &mut continuity).unwrap();
        assert_eq!(outcome, WriteOutcome::Written { timestamp: 100 });
        assert_eq!(continuity.last_video_timestamp, Some(100));
        assert_eq!(continuity.last_audio_timestamp, None);
        assert_eq!(continuity.last_packet_size, 2);

        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 11 + 2 + 4);
        assert_eq!(&bytes[4..8], &[0, 0, 100, 0]);
    }

    #[test]
    fn test_overlapping_audio_is_dropped() {
        let mut writer = TagWriter::new(Vec::new());
        let mut continuity = Continuity::default();

        assert!(
            writer
                .write_tag(&audio(0, 3), 0, &mut continuity)
                .unwrap()
                .is_written()
        );
        let position = writer.position();

        let outcome = writer.write_tag(&audio(10, 9), -10, &mut continuity).unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::DroppedOverlap {
                timestamp: 0,
                last_audio: 0
            }
        );
        assert_eq!(writer.position(), position);
        // A dropped tag leaves the counters alone
        assert_eq!(continuity.last_packet_size, 3);
    }

    #[test]
    fn test_negative_timestamp_is_dropped() {
        let mut writer = TagWriter::new(Vec::new());
        let mut continuity = Continuity::default();

        let outcome = writer.write_tag(&video(10), -20, &mut continuity).unwrap();
        assert_eq!(outcome, WriteOutcome::DroppedOutOfRange { timestamp: -10 });
        assert_eq!(writer.position(), 0);
        assert_eq!(continuity, Continuity::default());
    }

    #[test]
    fn test_script_tag_only_updates_packet_size() {
        let mut writer = TagWriter::new(Vec::new());
        let mut continuity = Continuity::default();
        let script = Tag::new(TagType::Script, 0, vec![2; 7]);

        writer.write_tag(&script, 0, &mut continuity).unwrap();
        assert_eq!(continuity.last_video_timestamp, None);
        assert_eq!(continuity.last_audio_timestamp, None);
        assert_eq!(continuity.last_packet_size, 7);
    }

    #[test]
    fn test_patch_at_returns_to_end() {
        let mut writer = TagWriter::new(Cursor::new(Vec::new()));
        writer.write_header(&FlvHeader::joined()).unwrap();
        writer.patch_at(3, &[2]).unwrap();
        writer.write_tag(&video(0), 0, &mut Continuity::default()).unwrap();

        let bytes = writer.into_inner().into_inner();
        assert_eq!(bytes[3], 2);
        assert_eq!(bytes.len(), 13 + 17);
        assert_eq!(bytes[13], 9);
    }

    #[test]
    fn test_patch_past_end_is_rejected() {
        let mut writer = TagWriter::new(Cursor::new(Vec::new()));
        writer.write_header(&FlvHeader::joined()).unwrap();
        assert!(writer.patch_at(12, &[0, 0]).is_err());
    }

    #[test]
    fn test_duration_from_video() {
        let continuity = Continuity {
            last_video_timestamp: Some(1000),
            last_audio_timestamp: Some(980),
            last_packet_size: 100,
        };
        assert_eq!(continuity.duration_ms(40, 32000), 1040);
    }

    #[test]
    fn test_duration_from_audio_tail() {
        let continuity = Continuity {
            last_video_timestamp: Some(1000),
            last_audio_timestamp: Some(1020),
            last_packet_size: 200,
        };
        // 200 bytes * 8 / 32000 bit/s = 50 ms
        assert_eq!(continuity.duration_ms(40, 32000), 1070);
    }

    #[test]
    fn test_duration_without_media() {
        assert_eq!(Continuity::default().duration_ms(100, 32000), 100);
    }
}
