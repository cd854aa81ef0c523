use bytes::Bytes;

pub const MARKER_NUMBER: u8 = 0x00;
pub const MARKER_BOOLEAN: u8 = 0x01;
pub const MARKER_STRING: u8 = 0x02;
pub const MARKER_OBJECT: u8 = 0x03;
pub const MARKER_MOVIE_CLIP: u8 = 0x04;
pub const MARKER_NULL: u8 = 0x05;
pub const MARKER_UNDEFINED: u8 = 0x06;
pub const MARKER_REFERENCE: u8 = 0x07;
pub const MARKER_ECMA_ARRAY: u8 = 0x08;
pub const MARKER_STRICT_ARRAY: u8 = 0x0A;
pub const MARKER_DATE: u8 = 0x0B;
pub const MARKER_LONG_STRING: u8 = 0x0C;

/// Closes an object (and, by convention, an ECMA array): an empty name
/// followed by the object-end marker 0x09.
pub const OBJECT_END: [u8; 3] = [0x00, 0x00, 0x09];

/// A script-data value. Strings keep their raw bytes; the format does not
/// guarantee any encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Number(f64),
    Boolean(bool),
    String(Bytes),
    Object(Vec<Property>),
    MovieClip,
    Null,
    Undefined,
    Reference(u16),
    EcmaArray(Vec<Property>),
    StrictArray(Vec<ScriptValue>),
    Date { millis: f64, timezone_offset: i16 },
    LongString(Bytes),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: Bytes,
    pub value: ScriptValue,
}

impl Property {
    pub fn new(name: impl Into<Bytes>, value: ScriptValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn name_is(&self, name: &str) -> bool {
        self.name.as_ref() == name.as_bytes()
    }
}

impl ScriptValue {
    pub fn string(value: &str) -> Self {
        ScriptValue::String(Bytes::copy_from_slice(value.as_bytes()))
    }

    pub fn marker(&self) -> u8 {
        match self {
            ScriptValue::Number(_) => MARKER_NUMBER,
            ScriptValue::Boolean(_) => MARKER_BOOLEAN,
            ScriptValue::String(_) => MARKER_STRING,
            ScriptValue::Object(_) => MARKER_OBJECT,
            ScriptValue::MovieClip => MARKER_MOVIE_CLIP,
            ScriptValue::Null => MARKER_NULL,
            ScriptValue::Undefined => MARKER_UNDEFINED,
            ScriptValue::Reference(_) => MARKER_REFERENCE,
            ScriptValue::EcmaArray(_) => MARKER_ECMA_ARRAY,
            ScriptValue::StrictArray(_) => MARKER_STRICT_ARRAY,
            ScriptValue::Date { .. } => MARKER_DATE,
            ScriptValue::LongString(_) => MARKER_LONG_STRING,
        }
    }

    /// Numeric reading of the value as used for metadata fields.
    ///
    /// Dates become seconds since the epoch and a strict array reads as its
    /// last element. Strings, containers and empty values have none.
    pub fn numeric_value(&self) -> Option<f64> {
        match self {
            ScriptValue::Number(n) => Some(*n),
            ScriptValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            ScriptValue::Reference(r) => Some(f64::from(*r)),
            ScriptValue::Date { millis, .. } => Some(millis / 1000.0),
            ScriptValue::StrictArray(values) => values.last().and_then(ScriptValue::numeric_value),
            _ => None,
        }
    }

    /// Calls `visit` for every named property nested in this value,
    /// depth first, parents before children.
    pub fn walk_properties<'a>(&'a self, visit: &mut impl FnMut(&'a Property)) {
        match self {
            ScriptValue::Object(properties) | ScriptValue::EcmaArray(properties) => {
                for property in properties {
                    visit(property);
                    property.value.walk_properties(visit);
                }
            }
            ScriptValue::StrictArray(values) => {
                for value in values {
                    value.walk_properties(visit);
                }
            }
            _ => {}
        }
    }
}

/// The body of a script tag: a run of named values, typically a single
/// `onMetaData` followed by an ECMA array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptDocument {
    pub properties: Vec<Property>,
}

impl ScriptDocument {
    /// Every property in the document at any depth.
    pub fn walk<'a>(&'a self, mut visit: impl FnMut(&'a Property)) {
        for property in &self.properties {
            visit(property);
            property.value.walk_properties(&mut visit);
        }
    }

    pub fn contains_name(&self, name: &str) -> bool {
        let mut found = false;
        self.walk(|property| found |= property.name_is(name));
        found
    }
}
