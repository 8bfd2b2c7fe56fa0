//! Session report - ordered outcomes of one tag session.
//!
//! Every fallible step of a session ends up here instead of in an error:
//! connect and close as [`LinkOutcome`]s, each read range and write probe
//! as an [`OperationRecord`]. The report renders one log line per
//! operation via `Display` and exports to JSON.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::Result;
use crate::protocol::{MemoryPage, ResponseFrame, PAGES_PER_READ, PAGE_SIZE};
use crate::transport::TagInfo;

/// Stage of the session an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Memory dump before any write.
    FirstRead,
    /// Random-data write probes.
    WriteProbe,
    /// Memory dump after the writes.
    SecondRead,
}

/// What was sent to the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    Read {
        start_page: u8,
    },
    Write {
        page: u8,
        #[serde(serialize_with = "hex::serde::serialize")]
        data: [u8; PAGE_SIZE],
    },
}

impl Operation {
    /// Target page (start page for reads).
    #[inline]
    pub fn page(&self) -> u8 {
        match *self {
            Operation::Read { start_page } => start_page,
            Operation::Write { page, .. } => page,
        }
    }

    #[inline]
    pub fn is_read(&self) -> bool {
        matches!(self, Operation::Read { .. })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read { start_page } => write!(
                f,
                "read pages ({} - {})",
                start_page,
                start_page.saturating_add(PAGES_PER_READ - 1)
            ),
            Operation::Write { page, data } => {
                write!(f, "write page {} data {}", page, hex::encode(data))
            }
        }
    }
}

/// Result of a single read or write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success { response: ResponseFrame },
    Failure { reason: String },
}

impl Outcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn response(&self) -> Option<&ResponseFrame> {
        match self {
            Outcome::Success { response } => Some(response),
            Outcome::Failure { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { reason } => Some(reason),
        }
    }
}

/// Result of connect or close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LinkOutcome {
    /// Not attempted yet.
    Pending,
    Success,
    Failure { reason: String },
}

impl LinkOutcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, LinkOutcome::Success)
    }

    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(self, LinkOutcome::Failure { .. })
    }

    pub(crate) fn from_result<E: fmt::Display>(result: std::result::Result<(), E>) -> Self {
        match result {
            Ok(()) => LinkOutcome::Success,
            Err(e) => LinkOutcome::Failure {
                reason: e.to_string(),
            },
        }
    }
}

impl fmt::Display for LinkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkOutcome::Pending => f.write_str("not attempted"),
            LinkOutcome::Success => f.write_str("ok"),
            LinkOutcome::Failure { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// One recorded read or write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationRecord {
    pub phase: Phase,
    pub operation: Operation,
    pub outcome: Outcome,
}

impl OperationRecord {
    pub fn new(phase: Phase, operation: Operation, outcome: Outcome) -> Self {
        Self {
            phase,
            operation,
            outcome,
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Pages carried by a successful read.
    pub fn pages(&self) -> Option<[MemoryPage; 4]> {
        match (&self.operation, &self.outcome) {
            (Operation::Read { start_page }, Outcome::Success { response }) => {
                response.read_pages(*start_page).ok()
            }
            _ => None,
        }
    }
}

impl fmt::Display for OperationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Success { response } if self.operation.is_read() => {
                write!(f, "{} content: {}", self.operation, response.to_hex())
            }
            Outcome::Success { response } if response.is_empty() => {
                write!(f, "{}: ok", self.operation)
            }
            Outcome::Success { response } => {
                write!(f, "{}: ok ({})", self.operation, response.to_hex())
            }
            Outcome::Failure { reason } => write!(f, "{}: failed: {}", self.operation, reason),
        }
    }
}

/// A page whose content differs between the two read passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageChange {
    pub index: u8,
    #[serde(serialize_with = "hex::serde::serialize")]
    pub before: [u8; PAGE_SIZE],
    #[serde(serialize_with = "hex::serde::serialize")]
    pub after: [u8; PAGE_SIZE],
}

/// Everything that happened during one session, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub tag: TagInfo,
    pub connect: LinkOutcome,
    pub operations: Vec<OperationRecord>,
    pub close: LinkOutcome,
}

impl SessionReport {
    pub fn new(tag: TagInfo) -> Self {
        Self {
            tag,
            connect: LinkOutcome::Pending,
            operations: Vec::new(),
            close: LinkOutcome::Pending,
        }
    }

    pub(crate) fn push(&mut self, record: OperationRecord) {
        self.operations.push(record);
    }

    pub(crate) fn extend(&mut self, records: impl IntoIterator<Item = OperationRecord>) {
        self.operations.extend(records);
    }

    /// Records of one phase, in order.
    pub fn phase(&self, phase: Phase) -> impl Iterator<Item = &OperationRecord> {
        self.operations.iter().filter(move |r| r.phase == phase)
    }

    /// Successful reads and writes.
    pub fn success_count(&self) -> usize {
        self.operations.iter().filter(|r| r.is_success()).count()
    }

    /// Failed reads and writes.
    pub fn operation_failure_count(&self) -> usize {
        self.operations.len() - self.success_count()
    }

    /// All failures, connect and close included.
    pub fn failure_count(&self) -> usize {
        self.operation_failure_count()
            + usize::from(self.connect.is_failure())
            + usize::from(self.close.is_failure())
    }

    /// Check if every step of the session succeeded.
    pub fn is_clean(&self) -> bool {
        self.connect.is_success() && self.close.is_success() && self.operation_failure_count() == 0
    }

    /// Pages read in both passes whose content changed.
    pub fn changed_pages(&self) -> Vec<PageChange> {
        let before = Self::collect_pages(self.phase(Phase::FirstRead));
        let after = Self::collect_pages(self.phase(Phase::SecondRead));

        before
            .iter()
            .filter_map(|(index, old)| {
                let new = after.get(index)?;
                (old != new).then_some(PageChange {
                    index: *index,
                    before: *old,
                    after: *new,
                })
            })
            .collect()
    }

    fn collect_pages<'a>(
        records: impl Iterator<Item = &'a OperationRecord>,
    ) -> BTreeMap<u8, [u8; PAGE_SIZE]> {
        records
            .filter_map(|r| r.pages())
            .flatten()
            .map(|page| (page.index, page.data))
            .collect()
    }

    /// Serialize to a single JSON line.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to indented JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "tag {} atqa {} sak 0x{:02x}",
            self.tag.id_hex(),
            hex::encode(&self.tag.atqa),
            self.tag.sak
        )?;
        writeln!(f, "connect: {}", self.connect)?;
        for record in &self.operations {
            writeln!(f, "{}", record)?;
        }
        write!(f, "close: {}", self.close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_ok(phase: Phase, start_page: u8, fill: u8) -> OperationRecord {
        OperationRecord::new(
            phase,
            Operation::Read { start_page },
            Outcome::Success {
                response: ResponseFrame::from(vec![fill; 16]),
            },
        )
    }

    fn report() -> SessionReport {
        SessionReport::new(TagInfo::new(vec![0x04, 0x01], vec![0x44, 0x00], 0))
    }

    #[test]
    fn test_counts() {
        let mut report = report();
        report.connect = LinkOutcome::Failure {
            reason: "tag lost".to_string(),
        };
        report.push(read_ok(Phase::FirstRead, 0, 0));
        report.push(OperationRecord::new(
            Phase::FirstRead,
            Operation::Read { start_page: 4 },
            Outcome::Failure {
                reason: "timed out waiting for response".to_string(),
            },
        ));
        report.close = LinkOutcome::Success;

        assert_eq!(report.success_count(), 1);
        assert_eq!(report.operation_failure_count(), 1);
        assert_eq!(report.failure_count(), 2);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_changed_pages() {
        let mut report = report();
        report.push(read_ok(Phase::FirstRead, 8, 0x00));
        report.push(read_ok(Phase::FirstRead, 12, 0x00));
        report.push(read_ok(Phase::SecondRead, 8, 0x11));
        report.push(read_ok(Phase::SecondRead, 12, 0x00));

        let changes = report.changed_pages();
        let indices: Vec<u8> = changes.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![8, 9, 10, 11]);
        assert_eq!(changes[0].before, [0; 4]);
        assert_eq!(changes[0].after, [0x11; 4]);
    }

    #[test]
    fn test_changed_pages_skips_unread_ranges() {
        let mut report = report();
        report.push(read_ok(Phase::FirstRead, 8, 0x00));
        report.push(OperationRecord::new(
            Phase::SecondRead,
            Operation::Read { start_page: 8 },
            Outcome::Failure {
                reason: "tag lost".to_string(),
            },
        ));
        assert!(report.changed_pages().is_empty());
    }

    #[test]
    fn test_record_display() {
        let read = read_ok(Phase::FirstRead, 4, 0xAB);
        assert_eq!(
            read.to_string(),
            "read pages (4 - 7) content: abababababababababababababababab"
        );

        let write = OperationRecord::new(
            Phase::WriteProbe,
            Operation::Write {
                page: 8,
                data: [1, 2, 3, 4],
            },
            Outcome::Success {
                response: ResponseFrame::ack(),
            },
        );
        assert_eq!(write.to_string(), "write page 8 data 01020304: ok (0a)");

        let failed = OperationRecord::new(
            Phase::WriteProbe,
            Operation::Write {
                page: 20,
                data: [0; 4],
            },
            Outcome::Failure {
                reason: "tag answered NAK 0x0".to_string(),
            },
        );
        assert_eq!(
            failed.to_string(),
            "write page 20 data 00000000: failed: tag answered NAK 0x0"
        );
    }

    #[test]
    fn test_json_shape() {
        let mut report = report();
        report.connect = LinkOutcome::Success;
        report.push(OperationRecord::new(
            Phase::WriteProbe,
            Operation::Write {
                page: 32,
                data: [0xDE, 0xAD, 0xBE, 0xEF],
            },
            Outcome::Success {
                response: ResponseFrame::empty(),
            },
        ));

        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["tag"]["id"], "0401");
        assert_eq!(value["connect"]["status"], "success");
        assert_eq!(value["close"]["status"], "pending");

        let op = &value["operations"][0];
        assert_eq!(op["phase"], "write_probe");
        assert_eq!(op["operation"]["kind"], "write");
        assert_eq!(op["operation"]["data"], "deadbeef");
        assert_eq!(op["outcome"]["status"], "success");
        assert_eq!(op["outcome"]["response"], "");
    }

    #[test]
    fn test_report_display_lines() {
        let mut report = report();
        report.connect = LinkOutcome::Success;
        report.push(read_ok(Phase::FirstRead, 0, 0));
        report.close = LinkOutcome::Failure {
            reason: "tag lost".to_string(),
        };

        let text = report.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "tag 0401 atqa 4400 sak 0x00");
        assert_eq!(lines[1], "connect: ok");
        assert!(lines[2].starts_with("read pages (0 - 3) content: "));
        assert_eq!(lines[3], "close: failed: tag lost");
    }
}
