//! # ulc-session
//!
//! Diagnostic read/write sessions for MIFARE Ultralight C tags.
//!
//! The host platform delivers each tapped tag as a [`TagHandle`] wrapping its
//! own [`Transceiver`]. A session dumps the tag's memory, writes random data
//! to a few pages, dumps it again and reports every step's outcome. No
//! transceiver failure ever aborts a session.
//!
//! ## Architecture
//!
//! - **Protocol**: ULC READ (`0x30`) / WRITE (`0xA2`) frames and page layout
//! - **Transport**: the [`Transceiver`] trait plus an in-memory [`EmulatedTag`]
//! - **Session**: [`SessionController`] and the [`SessionReport`] it produces
//! - **Dispatch**: async [`TagDispatcher`] running sessions one tag at a time
//!
//! ## Example
//!
//! ```
//! use ulc_session::{EmulatedTag, SessionConfig, SessionController};
//!
//! let tag = EmulatedTag::new([0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
//! let report = SessionController::new(SessionConfig::default()).run_session(tag.into_handle());
//!
//! for line in report.to_string().lines() {
//!     println!("{}", line);
//! }
//! ```

pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

pub use dispatch::{DispatcherBuilder, RadioAdapter, TagDispatcher, TagNotifier};
pub use error::{CloseError, ConnectError, TransceiveError, UlcError};
pub use session::{SessionConfig, SessionController, SessionReport};
pub use transport::{EmulatedTag, TagHandle, TagInfo, Transceiver};
