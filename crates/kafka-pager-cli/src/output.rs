//! Plain-text rendering of pages for the terminal.

use std::fmt::Write;

use kafka_pager_core::model::{Entry, Offset, PageWindow, TopicPage};
use kafka_pager_core::watermarks::WatermarkOffsets;

const PAYLOAD_PREVIEW: usize = 120;

pub fn render_window(window: &PageWindow) -> String {
    let mut out = String::new();
    if window.entries.is_empty() {
        out.push_str("(no records)\n");
    }
    for entry in &window.entries {
        render_entry(&mut out, entry);
    }

    out.push('\n');
    writeln!(out, "newer: {}", link(window.previous_offset)).ok();
    writeln!(out, "older: {}", link(window.next_offset)).ok();
    out
}

pub fn render_topic_page(page: &TopicPage, number: u32) -> String {
    let mut out = String::new();
    if page.entries.is_empty() {
        out.push_str("(no records)\n");
    }
    for entry in &page.entries {
        render_entry(&mut out, entry);
    }

    out.push('\n');
    if number > 1 {
        writeln!(out, "newer: page={}", number - 1).ok();
    }
    if page.has_next_page {
        writeln!(out, "older: page={}", number.saturating_add(1)).ok();
    }
    out
}

pub fn render_watermarks(watermarks: &[WatermarkOffsets]) -> String {
    let mut out = format!("{:>9} {:>12} {:>12} {:>10}\n", "PARTITION", "LOW", "HIGH", "OFFSETS");
    for w in watermarks {
        let state = if w.empty() {
            "  (empty)"
        } else if w.cleaned() {
            "  (cleaned)"
        } else {
            ""
        };
        writeln!(
            out,
            "{:>9} {:>12} {:>12} {:>10}{state}",
            w.partition,
            w.low,
            w.high,
            w.count()
        )
        .ok();
    }
    out
}

fn render_entry(out: &mut String, entry: &Entry) {
    match entry {
        Entry::Placeholder { partition, offset } => {
            writeln!(out, "{partition:>4}:{offset:<10} <compacted>").ok();
        }
        Entry::Record(record) => {
            let key = record
                .key
                .as_ref()
                .map(|k| format!(" key={}", String::from_utf8_lossy(k)))
                .unwrap_or_default();
            let payload = match &record.payload {
                Some(bytes) => preview(&String::from_utf8_lossy(bytes)),
                None => "<tombstone>".to_string(),
            };
            writeln!(
                out,
                "{:>4}:{:<10}{key} {payload}",
                record.partition, record.offset
            )
            .ok();
        }
    }
}

fn link(offset: Option<Offset>) -> String {
    offset.map_or_else(|| "none".to_string(), |offset| format!("offset={offset}"))
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PAYLOAD_PREVIEW {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(PAYLOAD_PREVIEW).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use kafka_pager_core::model::{Partition, Record};

    #[test]
    fn test_window_shows_placeholders_and_links() {
        let window = PageWindow {
            previous_offset: Some(Offset(30)),
            entries: vec![
                Entry::Record(Record::new(Partition(0), Offset(6), "hello")),
                Entry::Placeholder {
                    partition: Partition(0),
                    offset: Offset(5),
                },
            ],
            next_offset: None,
        };

        let text = render_window(&window);
        assert!(text.contains("hello"));
        assert!(text.contains("<compacted>"));
        assert!(text.contains("newer: offset=30"));
        assert!(text.contains("older: none"));
    }

    #[test]
    fn test_topic_page_links() {
        let page = TopicPage {
            entries: Vec::new(),
            has_next_page: true,
        };
        let text = render_topic_page(&page, 2);
        assert!(text.contains("(no records)"));
        assert!(text.contains("newer: page=1"));
        assert!(text.contains("older: page=3"));
    }

    #[test]
    fn test_long_payloads_are_truncated() {
        let long = "x".repeat(500);
        assert_eq!(preview(&long).len(), PAYLOAD_PREVIEW + 3);
        assert_eq!(preview("short"), "short");
    }
}
