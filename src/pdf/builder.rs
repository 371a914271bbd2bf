//! PDF document builder
//!
//! One page per asset, sized to the background in pixels (one point per
//! pixel). The background fills the page and the rasterized overlay is drawn
//! on top of it.

use std::ops::RangeInclusive;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use resvg::usvg;

use crate::error::{Result, RipError};
use crate::vendor::{HeaderEntry, PageAsset};

use super::outline::{plan_outline_within, resolve_target, write_outline, OutlineItem};
use super::xobject::{background_xobject, overlay_options, overlay_xobject};

/// A finished document plus what went into it
pub struct BuiltDocument {
    pub document: Document,
    /// Source page number and page object id, ascending
    pub page_ids: Vec<(u32, ObjectId)>,
    /// Outline entries that were written, in order
    pub outline: Vec<OutlineItem>,
}

impl BuiltDocument {
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Compress and serialize
    pub fn to_bytes(mut self) -> Result<Vec<u8>> {
        self.document.compress();
        let mut bytes = Vec::new();
        self.document
            .save_to(&mut bytes)
            .map_err(|e| RipError::Document(format!("failed to serialize PDF: {}", e)))?;
        Ok(bytes)
    }
}

pub struct DocumentBuilder {
    svg_options: usvg::Options<'static>,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    /// Builder that resolves overlay text against the system fonts
    pub fn new() -> Self {
        Self {
            svg_options: overlay_options(true),
        }
    }

    pub fn without_system_fonts() -> Self {
        Self {
            svg_options: overlay_options(false),
        }
    }

    /// Build a document from ascending `pages`.
    ///
    /// `requested` is the page range that was asked for. Header targets outside
    /// it are left out of the outline; targets inside it that were skipped
    /// point at the next assembled page.
    pub fn build(
        &self,
        pages: &[PageAsset],
        headers: &[HeaderEntry],
        requested: RangeInclusive<u32>,
    ) -> Result<BuiltDocument> {
        if pages.is_empty() {
            return Err(RipError::Document("no pages to assemble".to_string()));
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut page_ids = Vec::with_capacity(pages.len());
        for asset in pages {
            let page_id = self.add_page(&mut doc, pages_id, asset)?;
            page_ids.push((asset.page, page_id));
        }

        let kids: Vec<Object> = page_ids.iter().map(|(_, id)| Object::Reference(*id)).collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_ids.len() as i64,
            }),
        );

        let mut outline = Vec::new();
        let mut entries = Vec::new();
        for item in plan_outline_within(headers, requested) {
            match resolve_target(&page_ids, item.target_page) {
                Some(page_id) => {
                    entries.push((item.title.clone(), page_id));
                    outline.push(item);
                }
                None => tracing::debug!(
                    "Dropping outline entry {:?}: no page at or after {}",
                    item.title,
                    item.target_page
                ),
            }
        }

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        };
        if let Some(outlines_id) = write_outline(&mut doc, &entries) {
            catalog.set("Outlines", outlines_id);
            catalog.set("PageMode", "UseOutlines");
        }
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", catalog_id);

        tracing::info!(
            "Built PDF with {} pages and {} outline entries",
            page_ids.len(),
            outline.len()
        );

        Ok(BuiltDocument {
            document: doc,
            page_ids,
            outline,
        })
    }

    fn add_page(
        &self,
        doc: &mut Document,
        pages_id: ObjectId,
        asset: &PageAsset,
    ) -> Result<ObjectId> {
        let (width, height) = (asset.width as i64, asset.height as i64);

        let background_id = background_xobject(asset.page, &asset.background)?.add_to(doc);
        let mut xobjects = dictionary! { "Bg" => background_id };
        let mut operations = draw_full_page("Bg", width, height);

        if let Some(svg) = &asset.overlay {
            match overlay_xobject(svg, asset.width, asset.height, &self.svg_options) {
                Ok(overlay) => {
                    xobjects.set("Ov", overlay.add_to(doc));
                    operations.extend(draw_full_page("Ov", width, height));
                }
                Err(e) => tracing::warn!(
                    "Page {} overlay could not be rendered, keeping background only: {}",
                    asset.page,
                    e
                ),
            }
        }

        let content = Content { operations }
            .encode()
            .map_err(|e| RipError::Document(format!("page {} content: {}", asset.page, e)))?;
        let content_id = doc.add_object(Stream::new(lopdf::Dictionary::new(), content));

        Ok(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width),
                Object::Integer(height),
            ],
            "Resources" => dictionary! { "XObject" => xobjects },
            "Contents" => content_id,
        }))
    }
}

/// `q w 0 0 h 0 0 cm /name Do Q`
fn draw_full_page(name: &str, width: i64, height: i64) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            [width, 0, 0, height, 0, 0]
                .into_iter()
                .map(Object::Integer)
                .collect(),
        ),
        Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]
}
