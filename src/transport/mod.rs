//! Transport module - the half-duplex channel to a tag.
//!
//! The host platform implements [`Transceiver`] over its NFC stack (for
//! example an NfcA technology handle) and hands each discovered tag to the
//! crate as a [`TagHandle`]. [`EmulatedTag`] is an in-memory implementation
//! for demos and tests.

mod emulated;

use serde::Serialize;

use crate::error::{CloseError, ConnectError, TransceiveError};
use crate::protocol::{CommandFrame, ResponseFrame};

pub use emulated::EmulatedTag;

/// Blocking command/response channel to a single tag.
///
/// Every call is independently fallible: the tag may leave the field at any
/// point. Calls are issued strictly one after another, never pipelined.
pub trait Transceiver {
    /// Open the channel.
    fn connect(&mut self) -> Result<(), ConnectError>;

    /// Send one command frame and block until the tag answers or the call fails.
    fn transceive(&mut self, command: &CommandFrame) -> Result<ResponseFrame, TransceiveError>;

    /// Tear the channel down.
    fn close(&mut self) -> Result<(), CloseError>;
}

impl<T: Transceiver + ?Sized> Transceiver for &mut T {
    fn connect(&mut self) -> Result<(), ConnectError> {
        (**self).connect()
    }

    fn transceive(&mut self, command: &CommandFrame) -> Result<ResponseFrame, TransceiveError> {
        (**self).transceive(command)
    }

    fn close(&mut self) -> Result<(), CloseError> {
        (**self).close()
    }
}

impl<T: Transceiver + ?Sized> Transceiver for Box<T> {
    fn connect(&mut self) -> Result<(), ConnectError> {
        (**self).connect()
    }

    fn transceive(&mut self, command: &CommandFrame) -> Result<ResponseFrame, TransceiveError> {
        (**self).transceive(command)
    }

    fn close(&mut self) -> Result<(), CloseError> {
        (**self).close()
    }
}

/// Anti-collision data reported when the tag was discovered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TagInfo {
    /// Tag identifier (7-byte UID for Ultralight).
    #[serde(serialize_with = "hex::serde::serialize")]
    pub id: Vec<u8>,
    /// Answer to request (ATQA).
    #[serde(serialize_with = "hex::serde::serialize")]
    pub atqa: Vec<u8>,
    /// Select acknowledge (SAK).
    pub sak: u8,
}

impl TagInfo {
    pub fn new(id: impl Into<Vec<u8>>, atqa: impl Into<Vec<u8>>, sak: u8) -> Self {
        Self {
            id: id.into(),
            atqa: atqa.into(),
            sak,
        }
    }

    /// Lowercase hex of the identifier.
    pub fn id_hex(&self) -> String {
        hex::encode(&self.id)
    }
}

/// One discovered tag: its anti-collision data plus exclusive use of the channel.
///
/// A handle is moved into a session and dropped when the session ends.
#[derive(Debug)]
pub struct TagHandle<T> {
    info: TagInfo,
    channel: T,
}

impl<T: Transceiver> TagHandle<T> {
    pub fn new(info: TagInfo, channel: T) -> Self {
        Self { info, channel }
    }

    #[inline]
    pub fn info(&self) -> &TagInfo {
        &self.info
    }

    /// Split into info and channel.
    pub fn into_parts(self) -> (TagInfo, T) {
        (self.info, self.channel)
    }
}
