use bytes::{BufMut, BytesMut};

use crate::flv::primitive::{encode_f64, encode_i16, encode_u16, encode_u32};
use crate::script::value::*;

/// Appends a marker-prefixed value.
pub fn encode_value(value: &ScriptValue, out: &mut BytesMut) {
    out.put_u8(value.marker());
    match value {
        ScriptValue::Number(n) => out.put_slice(&encode_f64(*n)),
        ScriptValue::Boolean(b) => out.put_u8(u8::from(*b)),
        ScriptValue::String(s) => encode_string(s, out),
        ScriptValue::Object(properties) => {
            for property in properties {
                encode_property(property, out);
            }
            out.put_slice(&OBJECT_END);
        }
        ScriptValue::MovieClip | ScriptValue::Null | ScriptValue::Undefined => {}
        ScriptValue::Reference(r) => out.put_slice(&encode_u16(*r)),
        ScriptValue::EcmaArray(properties) => {
            out.put_slice(&encode_u32(properties.len() as u32));
            for property in properties {
                encode_property(property, out);
            }
            out.put_slice(&OBJECT_END);
        }
        ScriptValue::StrictArray(values) => {
            out.put_slice(&encode_u32(values.len() as u32));
            for value in values {
                encode_value(value, out);
            }
        }
        ScriptValue::Date {
            millis,
            timezone_offset,
        } => {
            out.put_slice(&encode_f64(*millis));
            out.put_slice(&encode_i16(*timezone_offset));
        }
        ScriptValue::LongString(s) => {
            out.put_slice(&encode_u32(s.len() as u32));
            out.put_slice(s);
        }
    }
}

/// u16 length prefix and raw bytes; longer input is cut at `u16::MAX`.
pub fn encode_string(s: &[u8], out: &mut BytesMut) {
    let s = &s[..s.len().min(usize::from(u16::MAX))];
    out.put_slice(&encode_u16(s.len() as u16));
    out.put_slice(s);
}

pub fn encode_property(property: &Property, out: &mut BytesMut) {
    encode_string(&property.name, out);
    encode_value(&property.value, out);
}

/// Encodes a document: each top-level name is written as a String value.
pub fn encode_document(document: &ScriptDocument, out: &mut BytesMut) {
    for property in &document.properties {
        out.put_u8(MARKER_STRING);
        encode_property(property, out);
    }
}

/// Encoded form of a single value, for patching in place.
pub fn value_bytes(value: &ScriptValue) -> BytesMut {
    let mut out = BytesMut::new();
    encode_value(value, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::decode::decode_document;

    #[test]
    fn test_number_and_boolean_layout() {
        assert_eq!(
            value_bytes(&ScriptValue::Number(1.0)).as_ref(),
            &[0x00, 0x3F, 0xF0, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(value_bytes(&ScriptValue::Boolean(true)).as_ref(), &[0x01, 0x01]);
    }

    #[test]
    fn test_document_survives_decoding() {
        let document = ScriptDocument {
            properties: vec![Property::new(
                "onCuePoint",
                ScriptValue::Object(vec![
                    Property::new("name", ScriptValue::string("cue")),
                    Property::new("time", ScriptValue::Number(12.5)),
                    Property::new(
                        "parameters",
                        ScriptValue::StrictArray(vec![ScriptValue::Null, ScriptValue::Reference(3)]),
                    ),
                    Property::new(
                        "when",
                        ScriptValue::Date {
                            millis: 1.0e12,
                            timezone_offset: 120,
                        },
                    ),
                ]),
            )],
        };

        let mut out = BytesMut::new();
        encode_document(&document, &mut out);
        assert_eq!(decode_document(out.freeze()).unwrap(), document);
    }
}
