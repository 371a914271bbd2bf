//! Page assembler
//!
//! Fans out per-page fetches through a bounded pool and reassembles the
//! results in page order. Completion order never leaks into the output: every
//! result is keyed by its page number and the map is projected afterwards.

use std::collections::BTreeMap;
use std::io::Cursor;

use futures::stream::{self, StreamExt};
use image::ImageReader;

use crate::config::MAX_CONCURRENCY;
use crate::error::{Result, RipError};
use crate::vendor::{Background, BookRef, PageAsset, PageSource, Quality};

use super::range::PageRange;

/// Ordered pages plus the pages that had to be dropped
#[derive(Debug, Default)]
pub struct AssembledPages {
    /// Strictly ascending by page number
    pub pages: Vec<PageAsset>,
    /// Pages whose background could not be fetched or decoded
    pub skipped: Vec<u32>,
}

impl AssembledPages {
    pub fn page_numbers(&self) -> Vec<u32> {
        self.pages.iter().map(|p| p.page).collect()
    }
}

/// Fetch every page in `range` with at most `concurrency` pages in flight
pub async fn assemble(
    source: &dyn PageSource,
    book: &BookRef,
    range: PageRange,
    quality: Quality,
    concurrency: usize,
) -> AssembledPages {
    let concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
    tracing::info!(
        "Fetching pages {}-{} of {} ({} at a time)",
        range.first(),
        range.last(),
        book.book_id,
        concurrency
    );

    let results: BTreeMap<u32, Result<PageAsset>> = stream::iter(range.pages())
        .map(|page| async move { (page, fetch_page(source, book, page, quality).await) })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut assembled = AssembledPages::default();
    for (page, result) in results {
        match result {
            Ok(asset) => assembled.pages.push(asset),
            Err(e) => {
                tracing::warn!("Page {} does not have a background, skipping it: {}", page, e);
                assembled.skipped.push(page);
            }
        }
    }

    tracing::info!(
        "Assembled {} pages, skipped {}",
        assembled.pages.len(),
        assembled.skipped.len()
    );
    assembled
}

async fn fetch_page(
    source: &dyn PageSource,
    book: &BookRef,
    page: u32,
    quality: Quality,
) -> Result<PageAsset> {
    let (overlay, background) = tokio::join!(
        source.overlay(book, page),
        source.background(book, page, quality)
    );

    let background = background?;
    let (width, height) = background_dimensions(page, &background)?;

    let overlay = match overlay {
        Ok(Some(svg)) => Some(svg),
        Ok(None) => {
            tracing::info!("Page {} does not have an .svg component", page);
            None
        }
        Err(e) => {
            tracing::warn!("SVG fetch for page {} failed, using background only: {}", page, e);
            None
        }
    };

    tracing::info!("Got page {} ({}x{})", page, width, height);
    Ok(PageAsset {
        page,
        background,
        overlay,
        width,
        height,
    })
}

/// Read pixel dimensions from the image header
pub fn background_dimensions(page: u32, background: &Background) -> Result<(u32, u32)> {
    let undecodable = |e: image::ImageError| RipError::BackgroundFetch {
        page,
        reason: format!("undecodable {:?} background: {}", background.format, e),
    };

    let (width, height) = ImageReader::new(Cursor::new(&background.data))
        .with_guessed_format()
        .map_err(|e| undecodable(e.into()))?
        .into_dimensions()
        .map_err(undecodable)?;

    if width == 0 || height == 0 {
        return Err(RipError::BackgroundFetch {
            page,
            reason: "background has zero size".to_string(),
        });
    }
    Ok((width, height))
}
