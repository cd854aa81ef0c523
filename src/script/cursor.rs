use bytes::Bytes;

use crate::flv::primitive::{decode_f64, decode_i16, decode_u16, decode_u32};
use crate::script::ScriptError;
use crate::script::value::OBJECT_END;

/// Read position over one script payload. Every read is checked against the
/// payload's declared end; nothing past it is ever touched.
#[derive(Debug, Clone)]
pub struct ScriptCursor {
    data: Bytes,
    pos: usize,
}

impl ScriptCursor {
    pub fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// True when the next three bytes are the object-end sequence.
    pub fn at_object_end(&self) -> bool {
        self.data[self.pos..].starts_with(&OBJECT_END)
    }

    pub fn take(&mut self, len: usize) -> Result<Bytes, ScriptError> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(ScriptError::Overrun {
                position: self.pos,
                needed: len,
                remaining,
            });
        }
        let bytes = self.data.slice(self.pos..self.pos + len);
        self.pos += len;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], ScriptError> {
        let bytes = self.take(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(&bytes);
        Ok(array)
    }

    pub fn read_u8(&mut self) -> Result<u8, ScriptError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ScriptError> {
        self.take_array().map(decode_u16)
    }

    pub fn read_i16(&mut self) -> Result<i16, ScriptError> {
        self.take_array().map(decode_i16)
    }

    pub fn read_u32(&mut self) -> Result<u32, ScriptError> {
        self.take_array().map(decode_u32)
    }

    pub fn read_f64(&mut self) -> Result<f64, ScriptError> {
        self.take_array().map(decode_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_are_bounded() {
        let mut cursor = ScriptCursor::new(Bytes::from_static(&[0x00, 0x05, 0xAA]));
        assert_eq!(cursor.read_u16().unwrap(), 5);
        assert_eq!(cursor.remaining(), 1);

        let error = cursor.read_u16().unwrap_err();
        assert_eq!(
            error,
            ScriptError::Overrun {
                position: 2,
                needed: 2,
                remaining: 1
            }
        );
        // A failed read does not move the cursor
        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.read_u8().unwrap(), 0xAA);
        assert!(cursor.is_at_end());
        assert_eq!(cursor.peek_u8(), None);
    }

    #[test]
    fn test_object_end_detection() {
        let cursor = ScriptCursor::new(Bytes::from_static(&[0x00, 0x00, 0x09, 0x01]));
        assert!(cursor.at_object_end());

        let cursor = ScriptCursor::new(Bytes::from_static(&[0x00, 0x00]));
        assert!(!cursor.at_object_end());
    }
}
