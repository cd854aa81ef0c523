//! The **FLV** module contains the container wire format: the file header,
//! tags, and the reader/writer pair used to stream tags from one file into
//! another.

pub mod demux;
pub mod header;
pub mod primitive;
pub mod remux;
pub mod tag;
pub mod tag_header;

pub use demux::{DemuxError, TagReader};
pub use header::FlvHeader;
pub use remux::{Continuity, TagWriter, WriteOutcome};
pub use tag::Tag;
pub use tag_header::{TagHeader, TagType};

// Define constants for commonly used lengths
pub const PREVIOUS_TAG_SIZE_LENGTH: usize = 4;
pub const FLV_HEADER_LENGTH: usize = 9;
pub const FLV_TAG_HEADER_LENGTH: usize = 11;
