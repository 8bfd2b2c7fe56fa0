//! Command frames for the ULC read/write protocol.
//!
//! ```text
//! READ   ┌──────┬────────────┐
//!        │ 0x30 │ start page │                        -> 16 bytes
//!        └──────┴────────────┘
//! WRITE  ┌──────┬──────┬────┬────┬────┬────┐
//!        │ 0xA2 │ page │ b0 │ b1 │ b2 │ b3 │          -> ACK / NAK
//!        └──────┴──────┴────┴────┴────┴────┘
//! ```
//!
//! # Example
//!
//! ```
//! use ulc_session::protocol::{Command, CommandFrame};
//!
//! let frame = CommandFrame::read(8);
//! assert_eq!(frame.as_bytes(), &[0x30, 8]);
//! assert_eq!(frame.decode().unwrap(), Command::Read { start_page: 8 });
//! ```

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use super::page::PAGE_SIZE;
use crate::error::FrameError;

/// Opcode constants.
pub mod opcode {
    /// READ: returns four pages starting at the operand.
    pub const READ: u8 = 0x30;
    /// WRITE: writes one page (4 bytes).
    pub const WRITE: u8 = 0xA2;
}

/// Encoded length of a READ frame.
pub const READ_FRAME_LEN: usize = 2;

/// Encoded length of a WRITE frame.
pub const WRITE_FRAME_LEN: usize = 2 + PAGE_SIZE;

/// Typed protocol instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Read four pages starting at `start_page`.
    Read { start_page: u8 },
    /// Write one page.
    Write { page: u8, data: [u8; PAGE_SIZE] },
}

impl Command {
    /// Encode to a wire frame.
    pub fn encode(&self) -> CommandFrame {
        match *self {
            Command::Read { start_page } => CommandFrame::read(start_page),
            Command::Write { page, data } => CommandFrame::write(page, data),
        }
    }

    /// Page the command is addressed at.
    #[inline]
    pub fn page(&self) -> u8 {
        match *self {
            Command::Read { start_page } => start_page,
            Command::Write { page, .. } => page,
        }
    }
}

/// One encoded command: opcode followed by operands.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandFrame(Bytes);

impl CommandFrame {
    /// Build `[0x30, start_page]`.
    pub fn read(start_page: u8) -> Self {
        Self(Bytes::copy_from_slice(&[opcode::READ, start_page]))
    }

    /// Build `[0xA2, page, b0, b1, b2, b3]`.
    pub fn write(page: u8, data: [u8; PAGE_SIZE]) -> Self {
        let mut buf = BytesMut::with_capacity(WRITE_FRAME_LEN);
        buf.put_u8(opcode::WRITE);
        buf.put_u8(page);
        buf.put_slice(&data);
        Self(buf.freeze())
    }

    /// Wrap raw bytes without validation.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First byte of the frame, if any.
    #[inline]
    pub fn opcode(&self) -> Option<u8> {
        self.0.first().copied()
    }

    /// Decode back into a typed [`Command`].
    pub fn decode(&self) -> Result<Command, FrameError> {
        let bytes = self.as_bytes();
        let op = *bytes.first().ok_or(FrameError::Empty)?;

        let expected = match op {
            opcode::READ => READ_FRAME_LEN,
            opcode::WRITE => WRITE_FRAME_LEN,
            other => return Err(FrameError::UnknownOpcode(other)),
        };
        if bytes.len() != expected {
            return Err(FrameError::Length {
                opcode: op,
                expected,
                actual: bytes.len(),
            });
        }

        Ok(match op {
            opcode::READ => Command::Read {
                start_page: bytes[1],
            },
            _ => {
                let mut data = [0u8; PAGE_SIZE];
                data.copy_from_slice(&bytes[2..]);
                Command::Write {
                    page: bytes[1],
                    data,
                }
            }
        })
    }
}

impl From<Command> for CommandFrame {
    fn from(command: Command) -> Self {
        command.encode()
    }
}

impl AsRef<[u8]> for CommandFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandFrame({})", hex::encode(&self.0))
    }
}
