//! Turns a sparse run of fetched records into a fixed-shape page slice.
//!
//! Compaction punches holes into a partition. Rather than letting the page
//! silently shrink or shift, every missing offset inside the requested range
//! is reported as an [`Entry::Placeholder`].

use crate::model::{Entry, Offset, Partition, Record};

/// Lay `fetched` out over `[start, start + count)`, ascending.
///
/// Offsets without a fetched record become placeholders. Trailing
/// placeholders at or above `high` are dropped: they only exist to keep the
/// page arithmetic simple and never held data. Fetched records outside the
/// range are ignored.
#[must_use]
pub fn fill(
    fetched: Vec<Record>,
    partition: Partition,
    start: Offset,
    count: usize,
    high: Offset,
) -> Vec<Entry> {
    let mut slots: Vec<Option<Record>> = vec![None; count];

    for record in fetched {
        let index = record.offset.0 - start.0;
        if index >= 0 && (index as usize) < count {
            slots[index as usize] = Some(record);
        }
    }

    let mut filled: Vec<Entry> = slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| match slot {
            Some(record) => Entry::Record(record),
            None => Entry::Placeholder {
                partition,
                offset: start.forward(index as i64),
            },
        })
        .collect();

    while filled
        .last()
        .is_some_and(|entry| entry.is_placeholder() && entry.offset() >= high)
    {
        filled.pop();
    }

    filled
}
