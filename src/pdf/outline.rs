//! Document outline from the pager header mapping

use std::ops::RangeInclusive;

use lopdf::{dictionary, Document, Object, ObjectId, StringFormat};

use crate::vendor::HeaderEntry;

/// One outline entry before it is bound to a page object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineItem {
    pub title: String,
    /// 1-based source page number
    pub target_page: u32,
}

/// Display text for a header label.
///
/// Numeric labels are shown one lower than their key ("13" → "Page 12"); the
/// vendor's keys run one ahead of the printed page numbers.
pub fn display_title(label: &str) -> String {
    match label.trim().parse::<i64>() {
        Ok(number) => format!("Page {}", number - 1),
        Err(_) => label.to_string(),
    }
}

/// Outline entries in source order, dropping targets beyond `max_page`
pub fn plan_outline(headers: &[HeaderEntry], max_page: u32) -> Vec<OutlineItem> {
    plan_outline_within(headers, 1..=max_page)
}

/// Outline entries in source order whose target lies inside `pages`
pub fn plan_outline_within(
    headers: &[HeaderEntry],
    pages: RangeInclusive<u32>,
) -> Vec<OutlineItem> {
    headers
        .iter()
        .filter(|h| pages.contains(&h.target_page))
        .map(|h| OutlineItem {
            title: display_title(&h.label),
            target_page: h.target_page,
        })
        .collect()
}

/// Resolve a source page to the first assembled page at or after it.
///
/// `pages` must be ascending by source page number.
pub fn resolve_target(pages: &[(u32, ObjectId)], target_page: u32) -> Option<ObjectId> {
    let index = pages.partition_point(|(page, _)| *page < target_page);
    pages.get(index).map(|(_, id)| *id)
}

/// PDF text string: literal for ASCII, UTF-16BE with BOM otherwise
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Write a flat outline and return the `/Outlines` dictionary id
pub fn write_outline(doc: &mut Document, entries: &[(String, ObjectId)]) -> Option<ObjectId> {
    if entries.is_empty() {
        return None;
    }

    let outlines_id = doc.new_object_id();
    let item_ids: Vec<ObjectId> = entries.iter().map(|_| doc.new_object_id()).collect();

    for (i, (title, page_id)) in entries.iter().enumerate() {
        let mut item = dictionary! {
            "Title" => text_string(title),
            "Parent" => outlines_id,
            "Dest" => vec![Object::Reference(*page_id), Object::Name(b"Fit".to_vec())],
        };
        if i > 0 {
            item.set("Prev", item_ids[i - 1]);
        }
        if let Some(next) = item_ids.get(i + 1) {
            item.set("Next", *next);
        }
        doc.objects.insert(item_ids[i], Object::Dictionary(item));
    }

    let outlines = dictionary! {
        "Type" => "Outlines",
        "First" => item_ids[0],
        "Last" => item_ids[item_ids.len() - 1],
        "Count" => entries.len() as i64,
    };
    doc.objects.insert(outlines_id, Object::Dictionary(outlines));

    Some(outlines_id)
}
