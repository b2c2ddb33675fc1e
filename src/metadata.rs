//! Image metadata extraction.
//!
//! Produces the label/value table shown on an image's detail page: a fixed
//! set of intrinsic properties followed by the EXIF tag table, if any.

use image::{AnimationDecoder, ColorType, GenericImageView, ImageFormat};
use std::io::Cursor;
use tracing::debug;

use crate::error::DecodeError;

/// Label of the row emitted when an image carries no EXIF table.
pub const EXIF_UNAVAILABLE: &str = "EXIF data not available";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageProperties {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    /// Container name, e.g. `JPEG`.
    pub format: String,
    /// Pixel layout, e.g. `RGB` or `L`.
    pub mode: String,
    pub animated: bool,
    pub frames: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExifEntry {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetadata {
    pub properties: ImageProperties,
    /// `None` when the container has no EXIF table.
    pub exif: Option<Vec<ExifEntry>>,
}

impl ImageMetadata {
    /// Display rows: intrinsic properties first, then EXIF in container order.
    pub fn entries(&self) -> Vec<(String, String)> {
        let p = &self.properties;
        let mut rows = vec![
            ("Filename".to_string(), p.filename.clone()),
            ("Image Size".to_string(), format!("({}, {})", p.width, p.height)),
            ("Image Height".to_string(), p.height.to_string()),
            ("Image Width".to_string(), p.width.to_string()),
            ("Image Format".to_string(), p.format.clone()),
            ("Image Mode".to_string(), p.mode.clone()),
            ("Image is Animated".to_string(), p.animated.to_string()),
            ("Frames in Image".to_string(), p.frames.to_string()),
        ];
        match &self.exif {
            Some(entries) => rows.extend(
                entries
                    .iter()
                    .map(|entry| (entry.label.clone(), entry.value.clone())),
            ),
            None => rows.push((EXIF_UNAVAILABLE.to_string(), String::new())),
        }
        rows
    }
}

/// Decode `bytes` and collect its properties and EXIF table.
pub fn extract(filename: &str, bytes: &[u8]) -> Result<ImageMetadata, DecodeError> {
    let format = image::guess_format(bytes).map_err(|_| DecodeError::UnsupportedFormat)?;
    let img = image::load_from_memory_with_format(bytes, format)?;
    let (width, height) = img.dimensions();

    let frames = count_frames(format, bytes);
    let properties = ImageProperties {
        filename: filename.to_string(),
        width,
        height,
        format: format_name(format),
        mode: mode_name(img.color()).to_string(),
        animated: frames > 1,
        frames,
    };

    Ok(ImageMetadata {
        properties,
        exif: read_exif(bytes),
    })
}

/// [`extract`] on the blocking thread pool.
pub async fn extract_blocking(
    filename: String,
    bytes: Vec<u8>,
) -> Result<ImageMetadata, DecodeError> {
    tokio::task::spawn_blocking(move || extract(&filename, &bytes))
        .await
        .map_err(|e| DecodeError::Task(e.to_string()))?
}

fn read_exif(bytes: &[u8]) -> Option<Vec<ExifEntry>> {
    let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => return None,
        Err(e) => {
            debug!("Unreadable EXIF table: {e}");
            return None;
        }
    };

    let entries = exif
        .fields()
        .filter(|field| field.ifd_num == exif::In::PRIMARY)
        .map(|field| ExifEntry {
            label: tag_label(field.tag),
            value: field_value(field, &exif),
        })
        .collect();
    Some(entries)
}

/// Display form of a field; ASCII strings are shown bare, without quotes.
fn field_value(field: &exif::Field, exif: &exif::Exif) -> String {
    match &field.value {
        exif::Value::Ascii(strings) => strings
            .iter()
            .map(|s| String::from_utf8_lossy(s).trim_end_matches('\0').to_string())
            .collect::<Vec<_>>()
            .join(", "),
        _ => field.display_value().with_unit(exif).to_string(),
    }
}

/// Standard tag name, or the numeric id for tags outside the standard table.
fn tag_label(tag: exif::Tag) -> String {
    if tag.description().is_some() {
        tag.to_string()
    } else {
        tag.number().to_string()
    }
}

/// Frame count. Only GIF animation is decoded; animated WebP and APNG
/// report a single frame.
fn count_frames(format: ImageFormat, bytes: &[u8]) -> u32 {
    if format != ImageFormat::Gif {
        return 1;
    }
    let Ok(decoder) = image::codecs::gif::GifDecoder::new(Cursor::new(bytes)) else {
        return 1;
    };
    let frames = decoder
        .into_frames()
        .take_while(Result::is_ok)
        .count();
    u32::try_from(frames).unwrap_or(u32::MAX).max(1)
}

fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "JPEG".to_string(),
        ImageFormat::Png => "PNG".to_string(),
        ImageFormat::Gif => "GIF".to_string(),
        ImageFormat::WebP => "WEBP".to_string(),
        ImageFormat::Tiff => "TIFF".to_string(),
        ImageFormat::Bmp => "BMP".to_string(),
        other => format!("{other:?}").to_uppercase(),
    }
}

fn mode_name(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 => "L",
        ColorType::La8 => "LA",
        ColorType::Rgb8 => "RGB",
        ColorType::Rgba8 => "RGBA",
        ColorType::L16 => "I;16",
        ColorType::La16 => "LA;16",
        ColorType::Rgb16 => "RGB;16",
        ColorType::Rgba16 => "RGBA;16",
        ColorType::Rgb32F => "RGB;F",
        ColorType::Rgba32F => "RGBA;F",
        _ => "unknown",
    }
}
