//! Script-data (AMF0) values carried by FLV script tags.

pub mod cursor;
pub mod decode;
pub mod encode;
pub mod value;

use thiserror::Error;

pub use cursor::ScriptCursor;
pub use decode::{decode_document, decode_value};
pub use encode::{encode_document, encode_value, value_bytes};
pub use value::{Property, ScriptDocument, ScriptValue};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Read of {needed} bytes at offset {position} overruns payload ({remaining} left)")]
    Overrun {
        position: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("Unknown script value marker {marker:#04x} at offset {position}")]
    UnknownMarker { marker: u8, position: usize },

    #[error("Script values nested too deeply at offset {position}")]
    TooDeep { position: usize },
}
