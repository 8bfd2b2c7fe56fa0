//! Protocol module - ULC command frames, responses and memory layout.
//!
//! This module implements the subset of the MIFARE Ultralight C command set
//! used by a diagnostic session:
//! - READ (`0x30`): four pages starting at a page index
//! - WRITE (`0xA2`): one page of four bytes
//! - ACK/NAK decoding of the 4-bit tag answers

mod command;
mod page;
mod response;

pub use command::{opcode, Command, CommandFrame, READ_FRAME_LEN, WRITE_FRAME_LEN};
pub use page::{
    next_page, MemoryPage, FIRST_KEY_PAGE, FIRST_USER_PAGE, LAST_USER_PAGE, MAX_PAGE, PAGES_PER_READ,
    PAGE_COUNT, PAGE_SIZE, READ_RESPONSE_LEN,
};
pub use response::{nak, ResponseFrame, ACK};
