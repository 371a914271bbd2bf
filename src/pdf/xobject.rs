//! Page layers as PDF image XObjects
//!
//! JPEG backgrounds are embedded untouched (`DCTDecode`). Everything else is
//! decoded to 8-bit RGB with an optional grayscale soft mask and left for
//! `Document::compress` to Flate-encode. SVG overlays are rasterized with
//! resvg at the page's pixel size.

use std::io::Cursor;

use image::codecs::jpeg::JpegDecoder;
use image::{ColorType, ImageDecoder};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use resvg::{tiny_skia, usvg};

use crate::error::{Result, RipError};
use crate::vendor::{Background, BackgroundFormat};

/// An image stream plus its optional alpha channel
pub struct ImageXObject {
    pub width: u32,
    pub height: u32,
    image: Stream,
    soft_mask: Option<Stream>,
}

impl ImageXObject {
    pub fn has_soft_mask(&self) -> bool {
        self.soft_mask.is_some()
    }

    /// Insert into `doc`, linking the soft mask, and return the image's id
    pub fn add_to(self, doc: &mut Document) -> ObjectId {
        let mut image = self.image;
        if let Some(mask) = self.soft_mask {
            let mask_id = doc.add_object(mask);
            image.dict.set("SMask", mask_id);
        }
        doc.add_object(image)
    }
}

fn image_dict(width: u32, height: u32, color_space: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8_i64,
    }
}

/// Build the background layer for a page
pub fn background_xobject(page: u32, background: &Background) -> Result<ImageXObject> {
    match background.format {
        BackgroundFormat::Jpeg => jpeg_passthrough(&background.data).or_else(|e| {
            tracing::warn!("Page {} JPEG cannot be embedded directly ({}), re-encoding", page, e);
            decoded_xobject(&background.data)
        }),
        BackgroundFormat::Png => decoded_xobject(&background.data),
    }
}

/// Component count from the first SOF marker (1 gray, 3 YCbCr/RGB, 4 CMYK)
fn jpeg_components(data: &[u8]) -> Option<u8> {
    let mut i = 2;
    while i + 9 < data.len() {
        if data[i] != 0xFF {
            i += 1;
            continue;
        }

        let marker = data[i + 1];
        if matches!(
            marker,
            0xC0 | 0xC1 | 0xC2 | 0xC3 | 0xC5 | 0xC6 | 0xC7 | 0xC9 | 0xCA | 0xCB | 0xCD | 0xCE | 0xCF
        ) {
            return Some(data[i + 9]);
        }

        // Fill bytes between markers
        if marker == 0xFF {
            i += 1;
            continue;
        }
        let length = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        i += 2 + length;
    }
    None
}

fn jpeg_passthrough(data: &[u8]) -> Result<ImageXObject> {
    // The decoder converts CMYK to RGB, so its color type cannot be trusted here
    match jpeg_components(data) {
        Some(1) | Some(3) => {}
        other => {
            return Err(RipError::Document(format!(
                "JPEG with {:?} components cannot be embedded as-is",
                other
            )))
        }
    }

    let decoder = JpegDecoder::new(Cursor::new(data)).map_err(image_error)?;
    let (width, height) = decoder.dimensions();
    let color_space = match decoder.color_type() {
        ColorType::L8 | ColorType::L16 => "DeviceGray",
        ColorType::Rgb8 | ColorType::Rgb16 => "DeviceRGB",
        other => {
            return Err(RipError::Document(format!(
                "unsupported JPEG color type {:?}",
                other
            )))
        }
    };

    let mut dict = image_dict(width, height, color_space);
    dict.set("Filter", "DCTDecode");

    Ok(ImageXObject {
        width,
        height,
        image: Stream::new(dict, data.to_vec()).with_compression(false),
        soft_mask: None,
    })
}

fn decoded_xobject(data: &[u8]) -> Result<ImageXObject> {
    let decoded = image::load_from_memory(data).map_err(image_error)?;
    let (width, height) = (decoded.width(), decoded.height());

    if !decoded.color().has_alpha() {
        let rgb = decoded.to_rgb8().into_raw();
        return Ok(ImageXObject {
            width,
            height,
            image: Stream::new(image_dict(width, height, "DeviceRGB"), rgb),
            soft_mask: None,
        });
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }
    Ok(split_xobject(width, height, rgb, alpha))
}

fn split_xobject(width: u32, height: u32, rgb: Vec<u8>, alpha: Vec<u8>) -> ImageXObject {
    ImageXObject {
        width,
        height,
        image: Stream::new(image_dict(width, height, "DeviceRGB"), rgb),
        soft_mask: Some(Stream::new(image_dict(width, height, "DeviceGray"), alpha)),
    }
}

/// Parse options for overlays; system fonts are needed for text layers
pub fn overlay_options(load_system_fonts: bool) -> usvg::Options<'static> {
    let mut options = usvg::Options::default();
    if load_system_fonts {
        options.fontdb_mut().load_system_fonts();
    }
    options
}

/// Rasterize an SVG overlay, stretched to exactly `width` x `height` pixels
pub fn overlay_xobject(
    svg: &[u8],
    width: u32,
    height: u32,
    options: &usvg::Options<'_>,
) -> Result<ImageXObject> {
    let tree = usvg::Tree::from_data(svg, options)
        .map_err(|e| RipError::Document(format!("invalid SVG overlay: {}", e)))?;

    let mut pixmap = tiny_skia::Pixmap::new(width, height).ok_or_else(|| {
        RipError::Document(format!("cannot allocate {}x{} overlay", width, height))
    })?;

    let size = tree.size();
    let transform = tiny_skia::Transform::from_scale(
        width as f32 / size.width(),
        height as f32 / size.height(),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    let pixel_count = (width * height) as usize;
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        rgb.extend_from_slice(&[color.red(), color.green(), color.blue()]);
        alpha.push(color.alpha());
    }

    Ok(split_xobject(width, height, rgb, alpha))
}

fn image_error(e: image::ImageError) -> RipError {
    RipError::Document(format!("image decode failed: {}", e))
}
