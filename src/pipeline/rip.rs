//! End-to-end rip of one book

use std::time::Duration;

use crate::config::RipConfig;
use crate::error::{Result, RipError};
use crate::pdf::DocumentBuilder;
use crate::vendor::{self, BookRef, PageAsset, Quality, VendorClient};

use super::assembler::assemble;
use super::range::PageSpec;

/// What to rip
#[derive(Debug, Clone)]
pub struct RipRequest {
    pub book_id: String,
    pub session_token: String,
    pub pages: PageSpec,
    /// Raw background quality, validated before any request is made
    pub quality: u8,
    /// Overrides the configured concurrency
    pub concurrency: Option<usize>,
    /// Build the PDF (off when only raw assets are wanted)
    pub build_pdf: bool,
    /// Hand the fetched assets back in the outcome
    pub keep_assets: bool,
}

impl RipRequest {
    pub fn new(book_id: impl Into<String>, session_token: impl Into<String>) -> Self {
        Self {
            book_id: book_id.into(),
            session_token: session_token.into(),
            pages: PageSpec::All,
            quality: Quality::MAX,
            concurrency: None,
            build_pdf: true,
            keep_assets: false,
        }
    }

    fn validate(&self) -> Result<Quality> {
        if self.book_id.trim().is_empty() {
            return Err(RipError::InvalidInput("book id is empty".to_string()));
        }
        if self.session_token.trim().is_empty() {
            return Err(RipError::InvalidInput("session token is empty".to_string()));
        }
        if let Some(0) = self.concurrency {
            return Err(RipError::InvalidInput("concurrency must be at least 1".to_string()));
        }
        Quality::new(self.quality)
    }
}

#[derive(Debug)]
pub struct RipOutcome {
    pub book_id: String,
    /// `None` when the request asked for assets only
    pub pdf: Option<Vec<u8>>,
    pub pages: Vec<u32>,
    pub skipped: Vec<u32>,
    pub outline_len: usize,
    /// Empty unless the request set `keep_assets`
    pub assets: Vec<PageAsset>,
}

pub struct Ripper {
    client: VendorClient,
    config: RipConfig,
    load_system_fonts: bool,
}

impl Ripper {
    pub fn new(client: VendorClient, config: RipConfig) -> Self {
        Self {
            client,
            config,
            load_system_fonts: true,
        }
    }

    /// Skip the system font scan when overlays carry no text
    pub fn with_system_fonts(mut self, load: bool) -> Self {
        self.load_system_fonts = load;
        self
    }

    pub async fn rip(&self, request: RipRequest) -> Result<RipOutcome> {
        let quality = request.validate()?;
        let concurrency = request
            .concurrency
            .unwrap_or_else(|| self.config.effective_concurrency());

        let credentials =
            vendor::mint(&self.client, &request.book_id, &request.session_token).await?;
        let book = BookRef::new(request.book_id.clone(), credentials);

        let metadata = self.client.metadata(&book).await?;
        let range = request.pages.resolve(metadata.page_count)?;
        tracing::info!(
            "Book {} has {} pages, ripping {}-{}",
            book.book_id,
            metadata.page_count,
            range.first(),
            range.last()
        );

        let timeout_secs = self.config.timeout_secs;
        let assembled = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            assemble(&self.client, &book, range, quality, concurrency),
        )
        .await
        .map_err(|_| RipError::Timeout(timeout_secs))?;

        if assembled.pages.is_empty() {
            return Err(RipError::NoPages(format!(
                "no page of {} in {}-{} could be fetched",
                book.book_id,
                range.first(),
                range.last()
            )));
        }

        let page_numbers = assembled.page_numbers();
        let skipped = assembled.skipped;
        let mut pages = assembled.pages;

        let mut pdf = None;
        let mut outline_len = 0;
        if request.build_pdf {
            let headers = metadata.headers;
            let load_system_fonts = self.load_system_fonts;
            let requested = range.pages();

            let (built, returned) = tokio::task::spawn_blocking(move || {
                let builder = if load_system_fonts {
                    DocumentBuilder::new()
                } else {
                    DocumentBuilder::without_system_fonts()
                };
                let built = builder.build(&pages, &headers, requested).and_then(|doc| {
                    let outline_len = doc.outline.len();
                    Ok((doc.to_bytes()?, outline_len))
                });
                (built, pages)
            })
            .await
            .map_err(|e| RipError::Document(format!("PDF build task failed: {}", e)))?;

            let (bytes, written) = built?;
            pdf = Some(bytes);
            outline_len = written;
            pages = returned;
        }

        Ok(RipOutcome {
            book_id: book.book_id,
            pdf,
            pages: page_numbers,
            skipped,
            outline_len,
            assets: if request.keep_assets { pages } else { Vec::new() },
        })
    }
}
