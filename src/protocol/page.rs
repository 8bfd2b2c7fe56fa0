//! Memory layout of a MIFARE Ultralight C tag.
//!
//! ```text
//! page   0      1      2      3
//!  0   UID0   UID1   UID2   BCC0
//!  1   UID3   UID4   UID5   UID6
//!  2   BCC1   INT    LOCK0  LOCK1
//!  3   OTP    OTP    OTP    OTP
//!  4 ..= 39   user memory
//! 40   LOCK2  LOCK3  -      -
//! 41   16-bit counter
//! 42   AUTH0
//! 43   AUTH1
//! 44 ..= 47   3DES key (write only)
//! ```

use serde::Serialize;

/// Bytes per page.
pub const PAGE_SIZE: usize = 4;

/// Number of addressable pages.
pub const PAGE_COUNT: usize = 48;

/// Highest addressable page index.
pub const MAX_PAGE: u8 = (PAGE_COUNT - 1) as u8;

/// Pages returned by a single READ.
pub const PAGES_PER_READ: u8 = 4;

/// Bytes returned by a single READ.
pub const READ_RESPONSE_LEN: usize = PAGE_SIZE * PAGES_PER_READ as usize;

/// First user memory page.
pub const FIRST_USER_PAGE: u8 = 4;

/// Last user memory page.
pub const LAST_USER_PAGE: u8 = 39;

/// First page of the 3DES key (pages 44..=47 are never readable).
pub const FIRST_KEY_PAGE: u8 = 44;

/// One 4-byte page of tag memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryPage {
    pub index: u8,
    #[serde(serialize_with = "hex::serde::serialize")]
    pub data: [u8; PAGE_SIZE],
}

impl MemoryPage {
    pub fn new(index: u8, data: [u8; PAGE_SIZE]) -> Self {
        Self { index, data }
    }

    /// Check if the page holds user data (not UID, lock, config or key).
    #[inline]
    pub fn is_user_page(&self) -> bool {
        (FIRST_USER_PAGE..=LAST_USER_PAGE).contains(&self.index)
    }
}

/// Page index that follows `page`, wrapping after [`MAX_PAGE`] the way READ rolls over.
#[inline]
pub fn next_page(page: u8) -> u8 {
    if page >= MAX_PAGE {
        0
    } else {
        page + 1
    }
}
