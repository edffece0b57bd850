//! Value types shared by the pagers.
//!
//! Partitions, offsets and page sizes are distinct newtypes so they cannot be
//! swapped by accident. Everything here is request-scoped and computed on the
//! fly; nothing is persisted.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Serialize, Serializer};

/// A partition id within a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Partition(pub i32);

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Position of a record within one partition.
///
/// Signed because page arithmetic (`high - page_size`) may step below zero
/// before it is clamped to the low watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Offset(pub i64);

impl Offset {
    /// Offset `n` positions after this one.
    #[must_use]
    pub fn forward(self, n: i64) -> Self {
        Self(self.0.saturating_add(n))
    }

    /// Offset `n` positions before this one.
    #[must_use]
    pub fn back(self, n: i64) -> Self {
        Self(self.0.saturating_sub(n))
    }

    /// Number of offsets in `[self, other)`, or zero if `other <= self`.
    #[must_use]
    pub fn distance_to(self, other: Offset) -> u64 {
        u64::try_from(other.0.saturating_sub(self.0)).unwrap_or(0)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Maximum number of entries returned for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PageSize(u32);

impl PageSize {
    /// Page size used when nothing is configured.
    pub const DEFAULT: PageSize = PageSize(25);

    /// Create a page size, rejecting zero.
    #[must_use]
    pub fn new(size: u32) -> Option<Self> {
        (size > 0).then_some(Self(size))
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    /// The page size as an offset delta.
    #[must_use]
    pub fn as_i64(self) -> i64 {
        i64::from(self.0)
    }

    #[must_use]
    pub fn as_u64(self) -> u64 {
        u64::from(self.0)
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Where a single-partition page starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOffset {
    /// The most recent page, written as `-1` in links.
    Latest,
    /// A page anchored at a concrete offset.
    At(Offset),
}

impl StartOffset {
    /// Sentinel used in `offset=` query parameters for the most recent page.
    pub const LATEST_SENTINEL: i64 = -1;
}

impl From<Offset> for StartOffset {
    fn from(offset: Offset) -> Self {
        StartOffset::At(offset)
    }
}

impl fmt::Display for StartOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartOffset::Latest => write!(f, "{}", Self::LATEST_SENTINEL),
            StartOffset::At(offset) => write!(f, "{offset}"),
        }
    }
}

/// Error returned when an `offset=` value is neither `-1` nor a non-negative integer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid start offset '{0}': expected -1 or a non-negative integer")]
pub struct ParseStartOffsetError(String);

impl FromStr for StartOffset {
    type Err = ParseStartOffsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<i64>() {
            Ok(Self::LATEST_SENTINEL) => Ok(StartOffset::Latest),
            Ok(n) if n >= 0 => Ok(StartOffset::At(Offset(n))),
            _ => Err(ParseStartOffsetError(s.to_string())),
        }
    }
}

/// A record read from the log.
///
/// The payload is opaque to the pagers. A tombstone is a record whose payload
/// is `None`; it occupies a real offset and is not a gap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub partition: Partition,
    pub offset: Offset,
    #[serde(serialize_with = "serialize_bytes")]
    pub key: Option<Bytes>,
    #[serde(serialize_with = "serialize_bytes")]
    pub payload: Option<Bytes>,
    pub timestamp_ms: Option<i64>,
}

impl Record {
    /// Create a record with a payload and no key or timestamp.
    pub fn new(partition: Partition, offset: Offset, payload: impl Into<Bytes>) -> Self {
        Self {
            partition,
            offset,
            key: None,
            payload: Some(payload.into()),
            timestamp_ms: None,
        }
    }

    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.payload.is_none()
    }
}

fn serialize_bytes<S: Serializer>(value: &Option<Bytes>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(bytes) => serializer.serialize_some(&String::from_utf8_lossy(bytes)),
        None => serializer.serialize_none(),
    }
}

/// One position on a page: either a fetched record or a known gap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entry {
    Record(Record),
    /// An offset that is missing from the log, usually removed by compaction.
    Placeholder { partition: Partition, offset: Offset },
}

impl Entry {
    #[must_use]
    pub fn partition(&self) -> Partition {
        match self {
            Entry::Record(record) => record.partition,
            Entry::Placeholder { partition, .. } => *partition,
        }
    }

    #[must_use]
    pub fn offset(&self) -> Offset {
        match self {
            Entry::Record(record) => record.offset,
            Entry::Placeholder { offset, .. } => *offset,
        }
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Entry::Placeholder { .. })
    }

    #[must_use]
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Entry::Record(record) => Some(record),
            Entry::Placeholder { .. } => None,
        }
    }
}

/// A page of a single partition, newest first.
///
/// `None` for either link means there is no page in that direction. The
/// offsets are meant to be embedded as `offset=` query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PageWindow {
    /// Start offset of the newer page.
    pub previous_offset: Option<Offset>,
    pub entries: Vec<Entry>,
    /// Start offset of the older page.
    pub next_offset: Option<Offset>,
}

impl PageWindow {
    /// The page returned when there is nothing to show.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offsets of the entries, in page order.
    #[must_use]
    pub fn offsets(&self) -> Vec<i64> {
        self.entries.iter().map(|e| e.offset().0).collect()
    }
}

/// A page of several partitions merged into one virtual sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TopicPage {
    pub entries: Vec<Entry>,
    pub has_next_page: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_offset_parsing() {
        assert_eq!("-1".parse::<StartOffset>().unwrap(), StartOffset::Latest);
        assert_eq!(
            "0".parse::<StartOffset>().unwrap(),
            StartOffset::At(Offset(0))
        );
        assert_eq!(
            " 125 ".parse::<StartOffset>().unwrap(),
            StartOffset::At(Offset(125))
        );
        assert!("-2".parse::<StartOffset>().is_err());
        assert!("abc".parse::<StartOffset>().is_err());
        assert!("".parse::<StartOffset>().is_err());
    }

    #[test]
    fn test_start_offset_display_round_trips_query_param() {
        assert_eq!(StartOffset::Latest.to_string(), "-1");
        assert_eq!(StartOffset::At(Offset(50)).to_string(), "50");
    }

    #[test]
    fn test_page_size_rejects_zero() {
        assert!(PageSize::new(0).is_none());
        assert_eq!(PageSize::new(10).unwrap().get(), 10);
        assert_eq!(PageSize::default().get(), 25);
    }

    #[test]
    fn test_offset_distance() {
        assert_eq!(Offset(10).distance_to(Offset(35)), 25);
        assert_eq!(Offset(35).distance_to(Offset(10)), 0);
        assert_eq!(Offset(5).back(10), Offset(-5));
    }

    #[test]
    fn test_entry_accessors() {
        let record = Entry::Record(Record::new(Partition(1), Offset(9), "hello"));
        let gap = Entry::Placeholder {
            partition: Partition(1),
            offset: Offset(8),
        };
        assert_eq!(record.offset(), Offset(9));
        assert!(!record.is_placeholder());
        assert!(record.as_record().is_some());
        assert_eq!(gap.partition(), Partition(1));
        assert!(gap.is_placeholder());
        assert!(gap.as_record().is_none());
    }

    #[test]
    fn test_tombstone_is_a_record_not_a_gap() {
        let mut record = Record::new(Partition(0), Offset(3), "x");
        record.payload = None;
        assert!(record.is_tombstone());
        assert!(!Entry::Record(record).is_placeholder());
    }

    #[test]
    fn test_page_window_json() {
        let mut tombstone = Record::new(Partition(2), Offset(9), "unused");
        tombstone.key = Some(Bytes::from_static(b"user-7"));
        tombstone.payload = None;
        let window = PageWindow {
            previous_offset: None,
            entries: vec![
                Entry::Record(tombstone),
                Entry::Placeholder {
                    partition: Partition(2),
                    offset: Offset(8),
                },
            ],
            next_offset: Some(Offset(6)),
        };

        let json = serde_json::to_value(&window).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "previous_offset": null,
                "entries": [
                    {
                        "kind": "record",
                        "partition": 2,
                        "offset": 9,
                        "key": "user-7",
                        "payload": null,
                        "timestamp_ms": null
                    },
                    { "kind": "placeholder", "partition": 2, "offset": 8 }
                ],
                "next_offset": 6
            })
        );
    }

    #[test]
    fn test_topic_page_json() {
        let page = TopicPage {
            entries: vec![Entry::Record(Record::new(Partition(0), Offset(0), "héllo"))],
            has_next_page: false,
        };

        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["has_next_page"], false);
        assert_eq!(json["entries"][0]["kind"], "record");
        assert_eq!(json["entries"][0]["payload"], "héllo");
    }
}
