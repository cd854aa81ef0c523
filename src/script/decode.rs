//! Recursive descent decoder for script-data payloads.
//!
//! Missing terminators are reported and decoding carries on from the
//! current position; the bytes that should have been the terminator are
//! read as the next item. An unknown marker byte leaves the length of the
//! value unknown, so the whole payload is abandoned.

use bytes::Bytes;
use tracing::warn;

use crate::script::ScriptError;
use crate::script::cursor::ScriptCursor;
use crate::script::value::*;

/// Smallest encoding of a name/value pair: empty name plus a bare marker.
const MIN_PROPERTY_LEN: usize = 3;

/// Deepest container nesting accepted in one payload.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Decodes a whole script tag body.
pub fn decode_document(data: Bytes) -> Result<ScriptDocument, ScriptError> {
    let mut cursor = ScriptCursor::new(data);
    let mut properties = Vec::new();

    while !cursor.is_at_end() {
        // The name is normally a String value; some writers leave the marker out
        if cursor.peek_u8() == Some(MARKER_STRING) {
            cursor.read_u8()?;
        }
        let property = decode_property(&mut cursor, 0)?;
        properties.push(property);

        if cursor.at_object_end() {
            cursor.take(OBJECT_END.len())?;
        }
    }

    Ok(ScriptDocument { properties })
}

/// Decodes one marker-prefixed value.
pub fn decode_value(cursor: &mut ScriptCursor) -> Result<ScriptValue, ScriptError> {
    decode_nested(cursor, 0)
}

/// `depth` counts the containers enclosing the value.
fn decode_nested(cursor: &mut ScriptCursor, depth: usize) -> Result<ScriptValue, ScriptError> {
    let position = cursor.position();
    if depth > MAX_NESTING_DEPTH {
        return Err(ScriptError::TooDeep { position });
    }
    let marker = cursor.read_u8()?;

    let value = match marker {
        MARKER_NUMBER => ScriptValue::Number(cursor.read_f64()?),
        MARKER_BOOLEAN => ScriptValue::Boolean(cursor.read_u8()? != 0),
        MARKER_STRING => ScriptValue::String(decode_string(cursor)?),
        MARKER_OBJECT => ScriptValue::Object(decode_object(cursor, depth + 1)?),
        MARKER_MOVIE_CLIP => ScriptValue::MovieClip,
        MARKER_NULL => ScriptValue::Null,
        MARKER_UNDEFINED => ScriptValue::Undefined,
        MARKER_REFERENCE => ScriptValue::Reference(cursor.read_u16()?),
        MARKER_ECMA_ARRAY => ScriptValue::EcmaArray(decode_ecma_array(cursor, depth + 1)?),
        MARKER_STRICT_ARRAY => {
            let count = cursor.read_u32()? as usize;
            let mut values = Vec::with_capacity(count.min(cursor.remaining()));
            for _ in 0..count {
                values.push(decode_nested(cursor, depth + 1)?);
            }
            ScriptValue::StrictArray(values)
        }
        MARKER_DATE => ScriptValue::Date {
            millis: cursor.read_f64()?,
            timezone_offset: cursor.read_i16()?,
        },
        MARKER_LONG_STRING => {
            let len = cursor.read_u32()? as usize;
            ScriptValue::LongString(cursor.take(len)?)
        }
        marker => return Err(ScriptError::UnknownMarker { marker, position }),
    };

    Ok(value)
}

/// u16-length-prefixed raw bytes.
fn decode_string(cursor: &mut ScriptCursor) -> Result<Bytes, ScriptError> {
    let len = cursor.read_u16()? as usize;
    cursor.take(len)
}

fn decode_property(cursor: &mut ScriptCursor, depth: usize) -> Result<Property, ScriptError> {
    let name = decode_string(cursor)?;
    let value = decode_nested(cursor, depth)?;
    Ok(Property { name, value })
}

/// Properties up to the object-end sequence.
fn decode_object(cursor: &mut ScriptCursor, depth: usize) -> Result<Vec<Property>, ScriptError> {
    let mut properties = Vec::new();
    loop {
        if cursor.at_object_end() {
            cursor.take(OBJECT_END.len())?;
            return Ok(properties);
        }
        if cursor.is_at_end() {
            warn!(
                position = cursor.position(),
                "Script object end marker missing"
            );
            return Ok(properties);
        }
        properties.push(decode_property(cursor, depth)?);
    }
}

/// A counted run of properties, normally closed by the object-end sequence.
fn decode_ecma_array(
    cursor: &mut ScriptCursor,
    depth: usize,
) -> Result<Vec<Property>, ScriptError> {
    let count = cursor.read_u32()? as usize;
    let mut properties = Vec::with_capacity(count.min(cursor.remaining() / MIN_PROPERTY_LEN));
    for _ in 0..count {
        properties.push(decode_property(cursor, depth)?);
    }

    if cursor.at_object_end() {
        cursor.take(OBJECT_END.len())?;
    } else {
        warn!(
            position = cursor.position(),
            "ECMA array end marker missing, reading on"
        );
    }

    Ok(properties)
}
