//! In-memory MIFARE Ultralight C tag.
//!
//! Speaks READ and WRITE the way the real tag does closely enough to drive a
//! full diagnostic session without hardware:
//! - UID and check bytes laid out in pages 0-2
//! - pages 0 and 1 are factory programmed (read only)
//! - pages 44..=47 hold the 3DES key and never read back
//! - READ rolls over from page 47 to page 0
//!
//! # Example
//!
//! ```
//! use ulc_session::transport::{EmulatedTag, Transceiver};
//! use ulc_session::protocol::CommandFrame;
//!
//! let mut tag = EmulatedTag::new([0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
//! tag.connect().unwrap();
//! let response = tag.transceive(&CommandFrame::read(0)).unwrap();
//! assert_eq!(&response.as_bytes()[..3], &[0x04, 0x11, 0x22]);
//! ```

use crate::error::{CloseError, ConnectError, TransceiveError};
use crate::protocol::{
    nak, next_page, Command, CommandFrame, MemoryPage, ResponseFrame, FIRST_KEY_PAGE, MAX_PAGE,
    PAGES_PER_READ, PAGE_COUNT, PAGE_SIZE,
};

use super::{TagHandle, TagInfo, Transceiver};

/// Cascade tag prepended to the first UID bytes when computing BCC0.
const CASCADE_TAG: u8 = 0x88;

/// ATQA reported by Ultralight family tags.
pub const ULTRALIGHT_ATQA: [u8; 2] = [0x44, 0x00];

/// SAK reported by Ultralight family tags.
pub const ULTRALIGHT_SAK: u8 = 0x00;

/// In-memory tag implementing [`Transceiver`].
#[derive(Debug, Clone)]
pub struct EmulatedTag {
    uid: [u8; 7],
    pages: [[u8; PAGE_SIZE]; PAGE_COUNT],
    read_only: [bool; PAGE_COUNT],
    hidden: [bool; PAGE_COUNT],
    connected: bool,
    present: bool,
    transceive_count: usize,
}

impl EmulatedTag {
    /// Create a blank tag with the given 7-byte UID.
    pub fn new(uid: [u8; 7]) -> Self {
        let mut pages = [[0u8; PAGE_SIZE]; PAGE_COUNT];

        let bcc0 = CASCADE_TAG ^ uid[0] ^ uid[1] ^ uid[2];
        let bcc1 = uid[3] ^ uid[4] ^ uid[5] ^ uid[6];
        pages[0] = [uid[0], uid[1], uid[2], bcc0];
        pages[1] = [uid[3], uid[4], uid[5], uid[6]];
        pages[2] = [bcc1, 0x48, 0x00, 0x00];
        // AUTH0 past the last page: no page requires authentication
        pages[42] = [0x30, 0x00, 0x00, 0x00];

        let mut read_only = [false; PAGE_COUNT];
        read_only[0] = true;
        read_only[1] = true;

        let mut hidden = [false; PAGE_COUNT];
        for page in FIRST_KEY_PAGE..=MAX_PAGE {
            hidden[page as usize] = true;
        }

        Self {
            uid,
            pages,
            read_only,
            hidden,
            connected: false,
            present: true,
            transceive_count: 0,
        }
    }

    /// Anti-collision data for this tag.
    pub fn info(&self) -> TagInfo {
        TagInfo::new(self.uid.to_vec(), ULTRALIGHT_ATQA.to_vec(), ULTRALIGHT_SAK)
    }

    /// Wrap into a [`TagHandle`] the way a platform would on discovery.
    pub fn into_handle(self) -> TagHandle<Self> {
        TagHandle::new(self.info(), self)
    }

    /// Mark a page read only; WRITE to it answers NAK.
    pub fn lock_page(&mut self, page: u8) {
        if let Some(flag) = self.read_only.get_mut(page as usize) {
            *flag = true;
        }
    }

    /// Mark a page unreadable; any READ touching it answers NAK.
    pub fn hide_page(&mut self, page: u8) {
        if let Some(flag) = self.hidden.get_mut(page as usize) {
            *flag = true;
        }
    }

    /// Simulate the tag entering or leaving the field.
    pub fn set_present(&mut self, present: bool) {
        self.present = present;
        if !present {
            self.connected = false;
        }
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Current content of a page, bypassing read protection.
    pub fn page(&self, index: u8) -> Option<MemoryPage> {
        self.pages
            .get(index as usize)
            .map(|data| MemoryPage::new(index, *data))
    }

    /// Overwrite a page, bypassing write protection.
    pub fn set_page(&mut self, index: u8, data: [u8; PAGE_SIZE]) {
        if let Some(page) = self.pages.get_mut(index as usize) {
            *page = data;
        }
    }

    /// Number of frames received so far.
    #[inline]
    pub fn transceive_count(&self) -> usize {
        self.transceive_count
    }

    fn read(&self, start_page: u8) -> ResponseFrame {
        if start_page > MAX_PAGE {
            return ResponseFrame::nak(nak::INVALID_ARGUMENT);
        }

        let mut out = Vec::with_capacity(PAGE_SIZE * PAGES_PER_READ as usize);
        let mut index = start_page;
        for _ in 0..PAGES_PER_READ {
            if self.hidden[index as usize] {
                return ResponseFrame::nak(nak::INVALID_ARGUMENT);
            }
            out.extend_from_slice(&self.pages[index as usize]);
            index = next_page(index);
        }
        ResponseFrame::from(out)
    }

    fn write(&mut self, page: u8, data: [u8; PAGE_SIZE]) -> ResponseFrame {
        match self.read_only.get(page as usize) {
            Some(false) => {
                self.pages[page as usize] = data;
                ResponseFrame::ack()
            }
            _ => ResponseFrame::nak(nak::INVALID_ARGUMENT),
        }
    }
}

impl Transceiver for EmulatedTag {
    fn connect(&mut self) -> Result<(), ConnectError> {
        if !self.present {
            return Err(ConnectError::TagLost);
        }
        self.connected = true;
        Ok(())
    }

    fn transceive(&mut self, command: &CommandFrame) -> Result<ResponseFrame, TransceiveError> {
        if !self.present {
            return Err(TransceiveError::TagLost);
        }
        if !self.connected {
            return Err(TransceiveError::NotConnected);
        }
        self.transceive_count += 1;

        let response = match command.decode() {
            Ok(Command::Read { start_page }) => self.read(start_page),
            Ok(Command::Write { page, data }) => self.write(page, data),
            Err(e) => {
                tracing::debug!("Emulated tag rejected frame {:?}: {}", command, e);
                ResponseFrame::nak(nak::INVALID_ARGUMENT)
            }
        };
        Ok(response)
    }

    fn close(&mut self) -> Result<(), CloseError> {
        if !self.present {
            return Err(CloseError::TagLost);
        }
        self.connected = false;
        Ok(())
    }
}
