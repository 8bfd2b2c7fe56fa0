//! Tag session controller.
//!
//! A session is one complete discovery-to-disconnect interaction with a tag:
//! 1. Connect
//! 2. Dump memory (first read pass)
//! 3. Write four random bytes to each probe page
//! 4. Dump memory again (second read pass)
//! 5. Close
//!
//! Every step is attempted exactly once, in that order, whatever happened
//! before it. Failures are recorded in the [`SessionReport`], never returned.
//!
//! # Example
//!
//! ```
//! use ulc_session::session::{SessionConfig, SessionController};
//! use ulc_session::transport::EmulatedTag;
//!
//! let tag = EmulatedTag::new([0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
//! let report = SessionController::new(SessionConfig::default()).run_session(tag.into_handle());
//!
//! assert_eq!(report.operations.len(), 27);
//! // pages 44..=47 hold the key and never read back
//! assert_eq!(report.operation_failure_count(), 2);
//! assert_eq!(report.changed_pages().len(), 3);
//! ```

mod report;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::error::{Result, UlcError};
use crate::protocol::{CommandFrame, MAX_PAGE, PAGES_PER_READ, PAGE_SIZE};
use crate::transport::{TagHandle, Transceiver};

pub use report::{
    LinkOutcome, Operation, OperationRecord, Outcome, PageChange, Phase, SessionReport,
};

/// Default first page of the memory dump.
pub const DEFAULT_FIRST_PAGE: u8 = 0;

/// Default last page of the memory dump.
pub const DEFAULT_LAST_PAGE: u8 = MAX_PAGE;

/// Default distance between dump start pages (one READ returns four pages).
pub const DEFAULT_READ_STEP: u8 = PAGES_PER_READ;

/// Default pages written with random data.
pub const DEFAULT_WRITE_TARGETS: [u8; 3] = [8, 20, 32];

/// What a session reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    first_page: u8,
    last_page: u8,
    read_step: u8,
    write_targets: Vec<u8>,
}

impl SessionConfig {
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::new()
    }

    /// Start pages of the memory dump, in order.
    pub fn read_starts(&self) -> impl Iterator<Item = u8> {
        (self.first_page..=self.last_page).step_by(self.read_step as usize)
    }

    /// Pages written by the probe sequence, in order.
    pub fn write_targets(&self) -> &[u8] {
        &self.write_targets
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            first_page: DEFAULT_FIRST_PAGE,
            last_page: DEFAULT_LAST_PAGE,
            read_step: DEFAULT_READ_STEP,
            write_targets: DEFAULT_WRITE_TARGETS.to_vec(),
        }
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Clone)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
        }
    }

    /// Dump pages `first..=last`.
    ///
    /// Default: 0..=47
    pub fn read_window(mut self, first: u8, last: u8) -> Self {
        self.config.first_page = first;
        self.config.last_page = last;
        self
    }

    /// Distance between dump start pages.
    ///
    /// Default: 4
    pub fn read_step(mut self, step: u8) -> Self {
        self.config.read_step = step;
        self
    }

    /// Pages to write random data to.
    ///
    /// Default: 8, 20, 32
    pub fn write_targets(mut self, pages: impl IntoIterator<Item = u8>) -> Self {
        self.config.write_targets = pages.into_iter().collect();
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<SessionConfig> {
        let config = self.config;

        if config.read_step == 0 || config.read_step > PAGES_PER_READ {
            return Err(UlcError::Config(format!(
                "read step {} outside 1..={}",
                config.read_step, PAGES_PER_READ
            )));
        }
        if config.first_page > config.last_page {
            return Err(UlcError::Config(format!(
                "read window {}..={} is empty",
                config.first_page, config.last_page
            )));
        }
        if config.last_page > MAX_PAGE {
            return Err(UlcError::Config(format!(
                "page {} exceeds maximum {}",
                config.last_page, MAX_PAGE
            )));
        }
        if let Some(page) = config.write_targets.iter().find(|&&p| p > MAX_PAGE) {
            return Err(UlcError::Config(format!(
                "write target {} exceeds maximum {}",
                page, MAX_PAGE
            )));
        }

        Ok(config)
    }
}

impl Default for SessionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives sessions against tags.
///
/// Generic over the random source for the write probes so tests can seed it.
pub struct SessionController<R = StdRng> {
    config: SessionConfig,
    rng: R,
}

impl SessionController<StdRng> {
    /// Create a controller seeded from OS entropy.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }
}

impl Default for SessionController<StdRng> {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl<R: RngCore> SessionController<R> {
    pub fn with_rng(config: SessionConfig, rng: R) -> Self {
        Self { config, rng }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run one complete session and consume the handle.
    ///
    /// Never fails: each step's error is recorded in the report and the
    /// next step runs anyway.
    pub fn run_session<T: Transceiver>(&mut self, handle: TagHandle<T>) -> SessionReport {
        let (info, mut tag) = handle.into_parts();
        let _span = tracing::info_span!("session", tag = %info.id_hex()).entered();

        tracing::info!(
            "Tag discovered: id={} atqa={} sak=0x{:02x}",
            info.id_hex(),
            hex::encode(&info.atqa),
            info.sak
        );
        let mut report = SessionReport::new(info);

        let connect = tag.connect();
        if let Err(e) = &connect {
            tracing::error!("Error connecting tag: {}", e);
        }
        report.connect = LinkOutcome::from_result(connect);

        report.extend(self.dump_memory(&mut tag, Phase::FirstRead));

        let targets = self.config.write_targets.clone();
        for page in targets {
            let record = self.write_probe(&mut tag, page);
            report.push(record);
        }

        report.extend(self.dump_memory(&mut tag, Phase::SecondRead));

        let close = tag.close();
        if let Err(e) = &close {
            tracing::error!("Error closing tag: {}", e);
        }
        report.close = LinkOutcome::from_result(close);

        tracing::info!(
            "Session finished: {} operations ok, {} failures",
            report.success_count(),
            report.failure_count()
        );
        report
    }

    /// Read every configured page range once, one outcome per start page.
    pub fn dump_memory<T: Transceiver + ?Sized>(
        &self,
        tag: &mut T,
        phase: Phase,
    ) -> Vec<OperationRecord> {
        tracing::debug!(
            "Dumping pages {}..={} ({:?})",
            self.config.first_page,
            self.config.last_page,
            phase
        );
        self.config
            .read_starts()
            .map(|start_page| Self::read_range(&mut *tag, start_page, phase))
            .collect()
    }

    fn read_range<T: Transceiver + ?Sized>(
        tag: &mut T,
        start_page: u8,
        phase: Phase,
    ) -> OperationRecord {
        let operation = Operation::Read { start_page };
        let command = CommandFrame::read(start_page);
        tracing::debug!("Sending {:?}", command);

        let outcome = match tag
            .transceive(&command)
            .and_then(|response| response.check_read().map(|()| response))
        {
            Ok(response) => {
                tracing::info!("{} content: {}", operation, response.to_hex());
                Outcome::Success { response }
            }
            Err(e) => {
                tracing::warn!("Error on {}: {}", operation, e);
                Outcome::Failure {
                    reason: e.to_string(),
                }
            }
        };
        OperationRecord::new(phase, operation, outcome)
    }

    /// Write four fresh random bytes to `page`.
    pub fn write_probe<T: Transceiver + ?Sized>(&mut self, tag: &mut T, page: u8) -> OperationRecord {
        let mut data = [0u8; PAGE_SIZE];
        self.rng.fill_bytes(&mut data);

        let operation = Operation::Write { page, data };
        tracing::info!("Writing page {} data: {}", page, hex::encode(data));

        let command = CommandFrame::write(page, data);
        tracing::debug!("Sending {:?}", command);

        let outcome = match tag
            .transceive(&command)
            .and_then(|response| response.check_write_ack().map(|()| response))
        {
            Ok(response) => Outcome::Success { response },
            Err(e) => {
                tracing::warn!("Error on {}: {}", operation, e);
                Outcome::Failure {
                    reason: e.to_string(),
                }
            }
        };
        OperationRecord::new(Phase::WriteProbe, operation, outcome)
    }
}
