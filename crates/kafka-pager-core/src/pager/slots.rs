//! Slot allocation for merged multi-partition pages.
//!
//! Each partition's records are ranked by age: rank 0 is the record just
//! below the high watermark, rank 1 the one before it, and so on. The merged
//! sequence is built rank by rank; at every rank each partition that still
//! has a record at that rank contributes one slot, visited in ascending
//! partition order. Page `n` is slots `[(n - 1) * L, n * L)` of that sequence.
//!
//! Recency is approximated by position only. Timestamps are never compared
//! across partitions.
//!
//! Rather than walking every rank from zero, the allocator binary-searches
//! the rank at which the page begins (the number of slots before rank `r` is
//! `sum(min(count_i, r))`) and then walks at most `L` slots from there.

use std::ops::Range;

use crate::model::{PageSize, Partition};

/// Ranks of one partition that fall on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankRange {
    pub partition: Partition,
    /// Half-open range of age ranks, 0 being the newest record.
    pub ranks: Range<u64>,
}

impl RankRange {
    /// Number of slots this partition fills on the page.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.ranks.end - self.ranks.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

/// Slots of one page, per partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSlots {
    /// Non-empty ranges, ascending by partition.
    pub ranges: Vec<RankRange>,
}

impl PageSlots {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Total number of slots on the page.
    #[must_use]
    pub fn slot_count(&self) -> u64 {
        self.ranges.iter().map(RankRange::len).sum()
    }

    /// Rank range of `partition`, if it has slots on the page.
    #[must_use]
    pub fn get(&self, partition: Partition) -> Option<&Range<u64>> {
        self.ranges
            .iter()
            .find(|r| r.partition == partition)
            .map(|r| &r.ranks)
    }
}

/// Decides which ranks of which partition land on a page.
#[derive(Debug, Clone, Copy)]
pub struct SlotAllocator {
    page_size: PageSize,
}

impl SlotAllocator {
    #[must_use]
    pub fn new(page_size: PageSize) -> Self {
        Self { page_size }
    }

    /// Allocate the slots of `page` (1-based).
    ///
    /// `counts` holds the number of offsets (`high - low`) per partition.
    /// Partitions are visited in ascending id order whatever order they are
    /// passed in. Page 0 and pages past the end are empty.
    #[must_use]
    pub fn allocate(&self, counts: &[(Partition, u64)], page: u32) -> PageSlots {
        if page == 0 {
            return PageSlots::default();
        }

        let mut counts = counts.to_vec();
        counts.sort_by_key(|&(partition, _)| partition);

        let page_size = self.page_size.as_u64();
        let first = u64::from(page - 1).saturating_mul(page_size);
        let last = first.saturating_add(page_size);

        let max_rank = counts.iter().map(|&(_, count)| count).max().unwrap_or(0);
        if slots_before(&counts, max_rank) <= first {
            return PageSlots::default();
        }

        let mut rank = starting_rank(&counts, first, max_rank);
        let mut position = slots_before(&counts, rank);
        let mut ranges: Vec<Option<Range<u64>>> = vec![None; counts.len()];

        while rank < max_rank && position < last {
            for (index, &(_, count)) in counts.iter().enumerate() {
                if count <= rank {
                    continue;
                }
                if position >= first {
                    let range = ranges[index].get_or_insert(rank..rank);
                    range.end = rank + 1;
                }
                position += 1;
                if position >= last {
                    break;
                }
            }
            rank += 1;
        }

        PageSlots {
            ranges: counts
                .iter()
                .zip(ranges)
                .filter_map(|(&(partition, _), ranks)| {
                    ranks.map(|ranks| RankRange { partition, ranks })
                })
                .collect(),
        }
    }
}

/// Number of slots in the merged sequence before rank `rank`.
fn slots_before(counts: &[(Partition, u64)], rank: u64) -> u64 {
    counts.iter().map(|&(_, count)| count.min(rank)).sum()
}

/// Largest rank whose first slot is at or before `slot`.
fn starting_rank(counts: &[(Partition, u64)], slot: u64, max_rank: u64) -> u64 {
    let (mut lo, mut hi) = (0, max_rank);
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if slots_before(counts, mid) <= slot {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}
