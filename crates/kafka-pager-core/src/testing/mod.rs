//! Test utilities for the log pagers.
//!
//! - [`MemoryLog`] - An in-memory, compactable log that records every read
//! - [`PagerTestHarness`] - Both pagers wired to one `MemoryLog`
//! - [`TestHarnessBuilder`] - Builder pattern for custom pager settings
//!
//! # Example
//!
//! ```rust,ignore
//! use kafka_pager_core::model::{Partition, StartOffset};
//! use kafka_pager_core::testing::TestHarnessBuilder;
//!
//! #[tokio::test]
//! async fn test_latest_page() {
//!     let harness = TestHarnessBuilder::new().page_size(10).build();
//!     harness.seed_topic("events", &[100]).await;
//!
//!     let window = harness
//!         .partition_page("events", Partition(0), StartOffset::Latest)
//!         .await
//!         .unwrap();
//!     assert_eq!(window.entries.len(), 10);
//! }
//! ```

pub mod harness;
pub mod memory_log;

pub use harness::{PagerTestHarness, TestHarnessBuilder};
pub use memory_log::{MemoryLog, ReadCall};
