//! Local output directory layout
//!
//! ```text
//! {root}/pdfs/{book}.pdf
//! {root}/svgs/{book}/page-0001.svg
//! {root}/bgs/{book}/page-0001.jpg
//! ```

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::vendor::{BackgroundFormat, PageAsset};

#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

/// Files written for one book
#[derive(Debug, Default)]
pub struct WrittenFiles {
    pub pdf: Option<PathBuf>,
    pub svgs: Vec<PathBuf>,
    pub backgrounds: Vec<PathBuf>,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pdf_path(&self, book_id: &str) -> PathBuf {
        self.root.join("pdfs").join(format!("{}.pdf", book_id))
    }

    pub fn svg_path(&self, book_id: &str, page: u32) -> PathBuf {
        self.root
            .join("svgs")
            .join(book_id)
            .join(format!("page-{:04}.svg", page))
    }

    pub fn background_path(&self, book_id: &str, page: u32, format: BackgroundFormat) -> PathBuf {
        self.root
            .join("bgs")
            .join(book_id)
            .join(format!("page-{:04}.{}", page, format.extension()))
    }

    pub async fn write_pdf(&self, book_id: &str, pdf: &[u8]) -> Result<PathBuf> {
        let path = self.pdf_path(book_id);
        write_file(&path, pdf).await?;
        tracing::info!("Saved PDF to {}", path.display());
        Ok(path)
    }

    /// Dump every overlay and background as fetched
    pub async fn write_assets(&self, book_id: &str, assets: &[PageAsset]) -> Result<WrittenFiles> {
        let mut written = WrittenFiles::default();
        for asset in assets {
            if let Some(svg) = &asset.overlay {
                let path = self.svg_path(book_id, asset.page);
                write_file(&path, svg).await?;
                written.svgs.push(path);
            }

            let path = self.background_path(book_id, asset.page, asset.background.format);
            write_file(&path, &asset.background.data).await?;
            written.backgrounds.push(path);
        }

        tracing::info!(
            "Saved {} overlays and {} backgrounds under {}",
            written.svgs.len(),
            written.backgrounds.len(),
            self.root.display()
        );
        Ok(written)
    }
}

async fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, data).await?;
    tracing::debug!("Wrote {} ({} bytes)", path.display(), data.len());
    Ok(())
}
