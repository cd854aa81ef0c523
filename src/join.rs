//! Joins a sequence of FLV inputs into one continuous output.
//!
//! Each input starts out not knowing where its timeline lands in the
//! output. Audio is held back and video is dropped until the first video
//! key frame; that frame fixes the input's offset so that it follows the
//! previous input's last video frame by exactly one frame interval. The
//! held audio is then released and the rest of the input streams straight
//! through.

use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

use tracing::{debug, info, info_span, warn};

use crate::error::JoinError;
use crate::flv::demux::TagClass;
use crate::flv::{Continuity, FlvHeader, Tag, TagReader, TagWriter, WriteOutcome};
use crate::metadata::{MetadataPatcher, MetadataRecord};

/// Mark-out used when an input gives none: 99999 seconds.
pub const DEFAULT_MARK_OUT_MS: u32 = 99_999_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinConfig {
    pub frame_interval_ms: u32,
    /// Bits per second; only used to estimate the length of a final audio frame.
    pub audio_bitrate: u32,
    pub write_metadata: bool,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 100,
            audio_bitrate: 32_000,
            write_metadata: true,
        }
    }
}

/// Source-timestamp window `[mark_in_ms, mark_out_ms)` of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marks {
    pub mark_in_ms: u32,
    pub mark_out_ms: u32,
}

impl Default for Marks {
    fn default() -> Self {
        Self {
            mark_in_ms: 0,
            mark_out_ms: DEFAULT_MARK_OUT_MS,
        }
    }
}

impl Marks {
    pub fn contains(&self, timestamp: u32) -> bool {
        timestamp >= self.mark_in_ms && timestamp < self.mark_out_ms
    }
}

/// What happened to the tags of one input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSummary {
    pub tags_read: u64,
    pub tags_written: u64,
    /// Outside the mark window.
    pub tags_trimmed: u64,
    /// Video before the first key frame.
    pub tags_before_key_frame: u64,
    pub audio_dropped: u64,
    /// Held audio thrown away because no video key frame followed.
    pub pending_discarded: u64,
    pub start_offset: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinSummary {
    pub files_joined: u64,
    pub files_skipped: u64,
    pub tags_written: u64,
    pub duration_ms: u64,
    pub bytes_written: u64,
}

enum FileState {
    /// Offset unknown; audio waits here in arrival order.
    SeekingStart { pending: Vec<Tag> },
    Streaming { offset: i64 },
}

/// One run's worth of joining state, threaded through every input.
#[derive(Debug)]
pub struct Joiner<W: Write> {
    writer: TagWriter<W>,
    config: JoinConfig,
    continuity: Continuity,
    sequence_header: Option<Tag>,
    metadata: Option<MetadataPatcher>,
    /// Set once some input has fixed its place on the output timeline.
    started: bool,
    summary: JoinSummary,
}

impl<W: Write> Joiner<W> {
    /// Writes the output header and, unless disabled, the metadata
    /// placeholder.
    pub fn new(sink: W, config: JoinConfig) -> Result<Self, JoinError> {
        let mut writer = TagWriter::new(sink);
        let mut continuity = Continuity::default();
        writer.write_header(&FlvHeader::joined())?;

        let metadata = if config.write_metadata {
            let (patcher, tag) = MetadataPatcher::placeholder(writer.position());
            writer.write_tag(&tag, 0, &mut continuity)?;
            Some(patcher)
        } else {
            None
        };

        Ok(Self {
            writer,
            config,
            continuity,
            sequence_header: None,
            metadata,
            started: false,
            summary: JoinSummary::default(),
        })
    }

    pub fn continuity(&self) -> &Continuity {
        &self.continuity
    }

    pub fn metadata(&self) -> Option<&MetadataRecord> {
        self.metadata.as_ref().map(MetadataPatcher::record)
    }

    pub fn summary(&self) -> &JoinSummary {
        &self.summary
    }

    /// Appends the file at `path`. An input that cannot be opened, or whose
    /// header is cut short, is reported and skipped; `Ok(None)` then.
    pub fn append_path(
        &mut self,
        path: &Path,
        marks: Marks,
    ) -> Result<Option<FileSummary>, JoinError> {
        let span = info_span!("input", path = %path.display());
        let _enter = span.enter();

        info!("Opening input");
        let file = match File::open(path) {
            Ok(file) => file,
            Err(error) => {
                warn!(%error, "Failed to open input, skipping");
                self.summary.files_skipped += 1;
                return Ok(None);
            }
        };

        match self.append(BufReader::new(file), marks) {
            Ok(summary) => {
                info!(
                    read = summary.tags_read,
                    written = summary.tags_written,
                    trimmed = summary.tags_trimmed,
                    audio_dropped = summary.audio_dropped,
                    "Closing input"
                );
                Ok(Some(summary))
            }
            Err(error) if error.is_recoverable() => {
                warn!(%error, "Unreadable input, skipping");
                self.summary.files_skipped += 1;
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    /// Appends one input stream.
    pub fn append<R: Read>(&mut self, input: R, marks: Marks) -> Result<FileSummary, JoinError> {
        let mut reader = TagReader::new(input)?;
        let mut file = FileSummary::default();
        let mut state = FileState::SeekingStart {
            pending: Vec::new(),
        };
        let mut first_key_frame = None;

        while let Some(tag) = reader.next_tag()? {
            let Some(class) = TagClass::of(&tag) else {
                continue;
            };

            let key_frame = match class {
                TagClass::Script => {
                    self.take_script_data(&tag);
                    continue;
                }
                TagClass::SequenceHeader => {
                    if self.sequence_header.replace(tag).is_some() {
                        debug!("Replacing cached sequence header");
                    }
                    continue;
                }
                TagClass::Media { key_frame } => key_frame,
            };

            if !marks.contains(tag.timestamp()) {
                file.tags_trimmed += 1;
                continue;
            }
            if key_frame && first_key_frame.is_none() {
                first_key_frame = Some(tag.timestamp());
            }

            match &mut state {
                FileState::Streaming { offset } => {
                    let offset = *offset;
                    self.forward(&tag, offset, &mut file)?;
                }
                FileState::SeekingStart { pending } if tag.is_audio() => pending.push(tag),
                FileState::SeekingStart { .. } if !key_frame => file.tags_before_key_frame += 1,
                FileState::SeekingStart { pending } => {
                    let offset = self.start_offset(&tag, first_key_frame);
                    info!(
                        offset,
                        key_frame_timestamp = tag.timestamp(),
                        "File start timestamp set"
                    );
                    let pending = std::mem::take(pending);

                    if let Some(mut header) = self.sequence_header.take() {
                        header.header.timestamp = tag.timestamp();
                        self.emit(&header, offset, &mut file)?;
                    }
                    for held in &pending {
                        self.emit(held, offset, &mut file)?;
                    }
                    self.emit(&tag, offset, &mut file)?;

                    file.start_offset = Some(offset);
                    state = FileState::Streaming { offset };
                }
            }
        }

        if let FileState::SeekingStart { pending } = &state
            && !pending.is_empty()
        {
            warn!(
                count = pending.len(),
                "No video key frame in input, discarding held audio"
            );
            file.pending_discarded = pending.len() as u64;
        }

        file.tags_read = reader.tags_read();
        self.summary.files_joined += 1;
        Ok(file)
    }

    /// Offset that places `key_frame` on the output timeline.
    fn start_offset(&mut self, key_frame: &Tag, first_key_frame: Option<u32>) -> i64 {
        if self.started {
            let last_video = i64::from(self.continuity.last_video_timestamp.unwrap_or(0));
            last_video + i64::from(self.config.frame_interval_ms) - i64::from(key_frame.timestamp())
        } else {
            self.started = true;
            -i64::from(first_key_frame.unwrap_or(key_frame.timestamp()))
        }
    }

    fn take_script_data(&mut self, tag: &Tag) {
        let Some(patcher) = self.metadata.as_mut() else {
            return;
        };
        if patcher.is_authoritative() {
            return;
        }
        if let Err(error) = patcher.accumulate(tag) {
            warn!(%error, "Discarding undecodable script data");
        }
    }

    /// Passes a tag on in streaming state. A cached sequence header goes
    /// out right before the next video tag, stamped with its timestamp.
    fn forward(&mut self, tag: &Tag, offset: i64, file: &mut FileSummary) -> Result<(), JoinError> {
        if tag.is_video()
            && let Some(mut header) = self.sequence_header.take()
        {
            header.header.timestamp = tag.timestamp();
            self.emit(&header, offset, file)?;
        }
        self.emit(tag, offset, file)
    }

    fn emit(&mut self, tag: &Tag, offset: i64, file: &mut FileSummary) -> Result<(), JoinError> {
        match self.writer.write_tag(tag, offset, &mut self.continuity)? {
            WriteOutcome::Written { .. } => {
                file.tags_written += 1;
                self.summary.tags_written += 1;
            }
            WriteOutcome::DroppedOverlap { .. } | WriteOutcome::DroppedOutOfRange { .. } => {
                file.audio_dropped += u64::from(tag.is_audio());
            }
        }
        Ok(())
    }

    fn close_summary(&mut self) -> JoinSummary {
        self.summary.duration_ms = self
            .continuity
            .duration_ms(self.config.frame_interval_ms, self.config.audio_bitrate);
        self.summary.bytes_written = self.writer.position();
        self.summary.clone()
    }

    /// Flushes and returns the sink without revisiting the metadata
    /// placeholder, for outputs that cannot seek.
    pub fn finish_unpatched(mut self) -> Result<(W, JoinSummary), JoinError> {
        if self.metadata.is_some() {
            warn!("Output not patched, metadata placeholder keeps zero values");
        }
        let summary = self.close_summary();
        self.writer.flush()?;
        Ok((self.writer.into_inner(), summary))
    }
}

impl<W: Write + Seek> Joiner<W> {
    /// Computes duration and file size, rewrites every metadata placeholder
    /// in place, and returns the flushed sink.
    pub fn finish(mut self) -> Result<(W, JoinSummary), JoinError> {
        let summary = self.close_summary();

        if let Some(patcher) = self.metadata.as_mut() {
            info!("Writing metadata");
            patcher.finalize(summary.duration_ms, summary.bytes_written);
            for (offset, bytes) in patcher.patches() {
                self.writer.patch_at(offset, &bytes)?;
            }
        }

        self.writer.flush()?;
        Ok((self.writer.into_inner(), summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flv::TagType;
    use std::io::Cursor;

    fn bare(tags: &[Tag]) -> Cursor<Vec<u8>> {
        let mut bytes = Vec::new();
        for tag in tags {
            bytes.extend(tag.as_bytes_with_timestamp(tag.timestamp()));
        }
        Cursor::new(bytes)
    }

    fn audio(ts: u32) -> Tag {
        Tag::new(TagType::Audio, ts, vec![0xAF, 0x01, 0x00])
    }

    fn key(ts: u32) -> Tag {
        Tag::new(TagType::Video, ts, vec![0x17, 0x01, 0x00])
    }

    fn inter(ts: u32) -> Tag {
        Tag::new(TagType::Video, ts, vec![0x27, 0x01, 0x00])
    }

    fn no_meta() -> JoinConfig {
        JoinConfig {
            write_metadata: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_marks_window() {
        let marks = Marks {
            mark_in_ms: 100,
            mark_out_ms: 200,
        };
        assert!(!marks.contains(99));
        assert!(marks.contains(100));
        assert!(marks.contains(199));
        assert!(!marks.contains(200));
    }

    #[test]
    fn test_first_file_offset_uses_first_key_frame() {
        let mut joiner = Joiner::new(Vec::new(), no_meta()).unwrap();
        let file = joiner
            .append(bare(&[audio(500), key(520)]), Marks::default())
            .unwrap();
        assert_eq!(file.start_offset, Some(-500));
        assert_eq!(joiner.continuity().last_audio_timestamp, Some(0));
        assert_eq!(joiner.continuity().last_video_timestamp, Some(20));
    }

    #[test]
    fn test_second_file_follows_by_frame_interval() {
        let mut joiner = Joiner::new(Vec::new(), no_meta()).unwrap();
        joiner
            .append(bare(&[key(0), inter(100), inter(200)]), Marks::default())
            .unwrap();
        let file = joiner
            .append(bare(&[key(5000), inter(5100)]), Marks::default())
            .unwrap();
        assert_eq!(file.start_offset, Some(200 + 100 - 5000));
        assert_eq!(joiner.continuity().last_video_timestamp, Some(400));
    }

    #[test]
    fn test_video_before_key_frame_is_dropped() {
        let mut joiner = Joiner::new(Vec::new(), no_meta()).unwrap();
        let file = joiner
            .append(bare(&[inter(0), inter(40), key(80)]), Marks::default())
            .unwrap();
        assert_eq!(file.tags_before_key_frame, 2);
        assert_eq!(file.tags_written, 1);
        assert_eq!(file.start_offset, Some(-80));
    }

    #[test]
    fn test_held_audio_discarded_without_key_frame() {
        let mut joiner = Joiner::new(Vec::new(), no_meta()).unwrap();
        let file = joiner
            .append(bare(&[audio(0), audio(20), inter(40)]), Marks::default())
            .unwrap();
        assert_eq!(file.pending_discarded, 2);
        assert_eq!(file.tags_written, 0);
        assert_eq!(joiner.continuity(), &Continuity::default());

        // The next input still counts as the first to start the timeline
        let file = joiner
            .append(bare(&[key(300)]), Marks::default())
            .unwrap();
        assert_eq!(file.start_offset, Some(-300));
    }

    #[test]
    fn test_trimmed_tags_do_not_touch_counters() {
        let mut joiner = Joiner::new(Vec::new(), no_meta()).unwrap();
        let marks = Marks {
            mark_in_ms: 1000,
            mark_out_ms: 2000,
        };
        let file = joiner
            .append(
                bare(&[key(0), audio(500), key(1000), audio(1500), key(2000), audio(2500)]),
                marks,
            )
            .unwrap();
        assert_eq!(file.tags_trimmed, 4);
        assert_eq!(file.start_offset, Some(-1000));
        assert_eq!(joiner.continuity().last_video_timestamp, Some(0));
        assert_eq!(joiner.continuity().last_audio_timestamp, Some(500));
    }

    #[test]
    fn test_late_sequence_header_precedes_next_video() {
        let mut joiner = Joiner::new(Vec::new(), no_meta()).unwrap();
        let config = Tag::new(TagType::Video, 0, vec![0x17, 0x00, 0xAB]);
        joiner
            .append(bare(&[key(0), config, audio(10), inter(40)]), Marks::default())
            .unwrap();

        let (bytes, summary) = joiner.finish_unpatched().unwrap();
        assert_eq!(summary.tags_written, 4);
        let mut reader = TagReader::new(Cursor::new(bytes)).unwrap();
        let tags: Vec<Tag> = reader.by_ref().collect::<Result<_, _>>().unwrap();
        assert!(tags[1].is_audio());
        assert!(tags[2].is_video_sequence_header());
        assert_eq!(tags[2].timestamp(), 40);
        assert_eq!(tags[3].timestamp(), 40);
    }

    #[test]
    fn test_newer_sequence_header_replaces_cached_one() {
        let mut joiner = Joiner::new(Vec::new(), no_meta()).unwrap();
        let first = Tag::new(TagType::Video, 0, vec![0x17, 0x00, 0x01]);
        let second = Tag::new(TagType::Video, 0, vec![0x17, 0x00, 0x02]);
        joiner
            .append(bare(&[first, second.clone(), key(0)]), Marks::default())
            .unwrap();

        let (bytes, _) = joiner.finish_unpatched().unwrap();
        let tags: Vec<Tag> = TagReader::new(Cursor::new(bytes))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        let headers: Vec<&Tag> = tags.iter().filter(|t| t.is_video_sequence_header()).collect();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].data, second.data);
        assert!(tags[0].is_video_sequence_header());
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn test_sequence_header_carries_into_next_file() {
        let mut joiner = Joiner::new(Vec::new(), no_meta()).unwrap();
        let config = Tag::new(TagType::Video, 100, vec![0x17, 0x00, 0xCD]);
        joiner
            .append(bare(&[key(0), inter(100), config]), Marks::default())
            .unwrap();
        let file = joiner
            .append(bare(&[key(40), inter(80)]), Marks::default())
            .unwrap();
        assert_eq!(file.start_offset, Some(100 + 100 - 40));

        let (bytes, _) = joiner.finish_unpatched().unwrap();
        let tags: Vec<Tag> = TagReader::new(Cursor::new(bytes))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(tags.len(), 5);
        assert!(tags[2].is_video_sequence_header());
        assert_eq!(tags[2].data.as_ref(), &[0x17, 0x00, 0xCD]);
        assert_eq!(tags[2].timestamp(), 200);
        assert!(tags[3].is_key_frame());
        assert_eq!(tags[3].timestamp(), 200);
        assert_eq!(tags[4].timestamp(), 240);
    }

    #[test]
    fn test_deeply_nested_script_data_does_not_stop_the_join() {
        let mut payload = vec![0x02, 0x00, 0x0A];
        payload.extend_from_slice(b"onMetaData");
        for _ in 0..200_000 {
            payload.extend_from_slice(&[0x03, 0x00, 0x00]);
        }
        let script = Tag::new(TagType::Script, 0, payload);

        let mut joiner = Joiner::new(Cursor::new(Vec::new()), JoinConfig::default()).unwrap();
        let file = joiner
            .append(bare(&[script, key(0), inter(100)]), Marks::default())
            .unwrap();
        assert_eq!(file.tags_written, 2);
        assert_eq!(joiner.metadata().unwrap().width, 0.0);

        let (_, summary) = joiner.finish().unwrap();
        assert_eq!(summary.duration_ms, 200);
    }

    #[test]
    fn test_script_data_fills_metadata() {
        use crate::script::{Property, ScriptDocument, ScriptValue, encode_document};

        let document = ScriptDocument {
            properties: vec![Property::new(
                "onMetaData",
                ScriptValue::EcmaArray(vec![
                    Property::new("width", ScriptValue::Number(640.0)),
                    Property::new("height", ScriptValue::Number(360.0)),
                ]),
            )],
        };
        let mut payload = bytes::BytesMut::new();
        encode_document(&document, &mut payload);
        let script = Tag::new(TagType::Script, 0, payload.freeze());

        let mut joiner = Joiner::new(Cursor::new(Vec::new()), JoinConfig::default()).unwrap();
        let file = joiner
            .append(bare(&[script, key(0)]), Marks::default())
            .unwrap();
        // Script tags are never forwarded
        assert_eq!(file.tags_written, 1);
        let record = joiner.metadata().unwrap();
        assert_eq!(record.width, 640.0);
        assert_eq!(record.height, 360.0);
    }
}
