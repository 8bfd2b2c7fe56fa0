//! Response frames returned by the tag.
//!
//! READ answers with 16 data bytes. WRITE answers with a 4-bit ACK (`0xA`),
//! which some readers swallow and report as an empty response. Any other
//! single-nibble answer is a NAK.

use std::fmt;

use bytes::Bytes;
use serde::{Serialize, Serializer};

use super::page::{next_page, MemoryPage, PAGES_PER_READ, PAGE_SIZE, READ_RESPONSE_LEN};
use crate::error::TransceiveError;

/// 4-bit acknowledgement.
pub const ACK: u8 = 0x0A;

/// NAK codes.
pub mod nak {
    /// Invalid argument (bad page address).
    pub const INVALID_ARGUMENT: u8 = 0x00;
    /// Parity or CRC error.
    pub const CRC_ERROR: u8 = 0x01;
    /// Invalid authentication counter overflow.
    pub const COUNTER_OVERFLOW: u8 = 0x04;
    /// EEPROM write error.
    pub const WRITE_ERROR: u8 = 0x05;
}

/// Raw bytes the tag answered with.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ResponseFrame(Bytes);

impl ResponseFrame {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Empty response (reader swallowed the ACK).
    pub fn empty() -> Self {
        Self(Bytes::new())
    }

    /// Single ACK nibble.
    pub fn ack() -> Self {
        Self(Bytes::from_static(&[ACK]))
    }

    /// Single NAK nibble.
    pub fn nak(code: u8) -> Self {
        Self(Bytes::copy_from_slice(&[code & 0x0F]))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Cheap clone of the underlying buffer.
    #[inline]
    pub fn bytes(&self) -> Bytes {
        self.0.clone()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercase hex of the response.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Interpret as a READ answer for `start_page`.
    ///
    /// Pages past the last one roll over to page 0, matching the tag.
    pub fn read_pages(&self, start_page: u8) -> Result<[MemoryPage; 4], TransceiveError> {
        self.check_read()?;

        let mut pages = [MemoryPage::new(0, [0; PAGE_SIZE]); PAGES_PER_READ as usize];
        let mut index = start_page;
        for (page, chunk) in pages.iter_mut().zip(self.0.chunks_exact(PAGE_SIZE)) {
            let mut data = [0u8; PAGE_SIZE];
            data.copy_from_slice(chunk);
            *page = MemoryPage::new(index, data);
            index = next_page(index);
        }
        Ok(pages)
    }

    /// Validate a READ answer: 16 bytes, or a NAK.
    pub fn check_read(&self) -> Result<(), TransceiveError> {
        match self.0.len() {
            READ_RESPONSE_LEN => Ok(()),
            1 => Err(TransceiveError::Nak(self.0[0] & 0x0F)),
            actual => Err(TransceiveError::Malformed {
                expected: READ_RESPONSE_LEN,
                actual,
            }),
        }
    }

    /// Validate a WRITE answer: empty or ACK, otherwise NAK/malformed.
    pub fn check_write_ack(&self) -> Result<(), TransceiveError> {
        match &self.0[..] {
            [] => Ok(()),
            [b] if b & 0x0F == ACK => Ok(()),
            [b] => Err(TransceiveError::Nak(b & 0x0F)),
            other => Err(TransceiveError::Malformed {
                expected: 1,
                actual: other.len(),
            }),
        }
    }
}

impl From<Vec<u8>> for ResponseFrame {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<Bytes> for ResponseFrame {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for ResponseFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ResponseFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResponseFrame({})", self.to_hex())
    }
}

impl Serialize for ResponseFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sixteen() -> ResponseFrame {
        ResponseFrame::from((0u8..16).collect::<Vec<_>>())
    }

    #[test]
    fn test_read_pages_split() {
        let pages = sixteen().read_pages(8).unwrap();
        assert_eq!(pages[0], MemoryPage::new(8, [0, 1, 2, 3]));
        assert_eq!(pages[3], MemoryPage::new(11, [12, 13, 14, 15]));
    }

    #[test]
    fn test_read_pages_roll_over() {
        let pages = sixteen().read_pages(46).unwrap();
        let indices: Vec<u8> = pages.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![46, 47, 0, 1]);
    }

    #[test]
    fn test_read_nak() {
        let err = ResponseFrame::nak(nak::INVALID_ARGUMENT).check_read().unwrap_err();
        assert!(matches!(err, TransceiveError::Nak(0x00)));
    }

    #[test]
    fn test_read_wrong_length() {
        let err = ResponseFrame::from(vec![0u8; 12]).check_read().unwrap_err();
        assert!(matches!(
            err,
            TransceiveError::Malformed {
                expected: 16,
                actual: 12
            }
        ));
    }

    #[test]
    fn test_write_ack_accepted() {
        assert!(ResponseFrame::ack().check_write_ack().is_ok());
        assert!(ResponseFrame::empty().check_write_ack().is_ok());
    }

    #[test]
    fn test_write_nak_rejected() {
        let err = ResponseFrame::nak(nak::WRITE_ERROR)
            .check_write_ack()
            .unwrap_err();
        assert_eq!(err.to_string(), "tag answered NAK 0x5");
    }

    #[test]
    fn test_write_long_response_malformed() {
        let err = sixteen().check_write_ack().unwrap_err();
        assert!(matches!(err, TransceiveError::Malformed { actual: 16, .. }));
    }

    #[test]
    fn test_serialize_as_hex() {
        let json = serde_json::to_string(&ResponseFrame::from(vec![0xAB, 0x01])).unwrap();
        assert_eq!(json, "\"ab01\"");
    }
}
