//! Read the embedded metadata containers of an image file.
//!
//! PNG text chunks (`tEXt`, `zTXt`, `iTXt`) are read through `png::Info`.
//! JPEG comments come from `COM` segments via `img_parts`. EXIF blobs are
//! obtained through the `image` decoder for every format it supports.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use image::{ImageDecoder, ImageFormat, ImageReader};
use img_parts::Bytes;
use img_parts::jpeg::{Jpeg, markers};
use serde::Serialize;
use tracing::{debug, warn};

use super::MetadataError;

/// A metadata value as found in the container: text, or raw bytes that are
/// decoded only when a string is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaValue {
    Text(String),
    Bytes(Vec<u8>),
}

impl MetaValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetaValue::Text(s) => Some(s),
            MetaValue::Bytes(_) => None,
        }
    }

    /// Text as-is; bytes decoded as UTF-8 with invalid sequences dropped.
    pub fn to_text_lossy(&self) -> String {
        match self {
            MetaValue::Text(s) => s.clone(),
            MetaValue::Bytes(b) => decode_utf8_dropping_invalid(b),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Text(s)
    }
}

impl From<Vec<u8>> for MetaValue {
    fn from(b: Vec<u8>) -> Self {
        MetaValue::Bytes(b)
    }
}

/// The embedded fields of one image, before any producer format is known.
///
/// `text` holds the textual chunks (PNG only). `info` holds every
/// informational field: the textual chunks again, plus `exif` and `comment`
/// byte blobs where present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMetadata {
    pub text: BTreeMap<String, MetaValue>,
    pub info: BTreeMap<String, MetaValue>,
}

impl RawMetadata {
    pub fn insert_text(&mut self, key: &str, value: impl Into<MetaValue>) {
        self.text.insert(key.to_string(), value.into());
    }

    pub fn insert_info(&mut self, key: &str, value: impl Into<MetaValue>) {
        self.info.insert(key.to_string(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.info.is_empty()
    }

    /// Textual chunks as a JSON object, bytes decoded permissively.
    pub fn text_json(&self) -> serde_json::Value {
        fields_to_json(&self.text)
    }

    /// Informational fields as a JSON object, bytes decoded permissively.
    pub fn info_json(&self) -> serde_json::Value {
        fields_to_json(&self.info)
    }
}

/// Pass-through description of the source image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageHandle {
    pub path: String,
    pub format: String,
    pub width: u32,
    pub height: u32,
}

/// Open `path`, sniff its format, and collect its embedded metadata.
pub fn read_image(path: &Path) -> Result<(ImageHandle, RawMetadata), MetadataError> {
    let path_str = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|source| MetadataError::Open {
        path: path_str.clone(),
        source,
    })?;

    let format = image::guess_format(&bytes).map_err(|_| MetadataError::UnsupportedFormat {
        path: path_str.clone(),
    })?;

    let mut decoder = ImageReader::with_format(Cursor::new(bytes.as_slice()), format)
        .into_decoder()
        .map_err(|source| MetadataError::Decode {
            path: path_str.clone(),
            source,
        })?;
    let (width, height) = decoder.dimensions();

    let mut raw = RawMetadata::default();

    if format == ImageFormat::Png {
        for (key, value) in png_text_chunks(&bytes) {
            raw.insert_text(&key, value.clone());
            raw.insert_info(&key, value);
        }
    }
    if format == ImageFormat::Jpeg
        && let Some(comment) = jpeg_comment(&bytes)
    {
        raw.insert_info("comment", comment);
    }

    match decoder.exif_metadata() {
        Ok(Some(exif)) => raw.insert_info("exif", exif),
        Ok(None) => {}
        Err(e) => warn!(path = %path_str, error = %e, "Failed to read EXIF block"),
    }

    debug!(
        path = %path_str,
        text_fields = raw.text.len(),
        info_fields = raw.info.len(),
        "Collected image metadata"
    );

    let handle = ImageHandle {
        path: path_str,
        format: format_name(format).to_string(),
        width,
        height,
    };
    Ok((handle, raw))
}

/// Collect every `tEXt`, `zTXt` and `iTXt` chunk of a PNG byte stream,
/// including chunks placed after the image data. Non-PNG input yields an
/// empty map; a stream that breaks off yields what was read before the break.
pub fn png_text_chunks(bytes: &[u8]) -> BTreeMap<String, String> {
    let mut chunks = BTreeMap::new();
    let mut reader = match png::Decoder::new(Cursor::new(bytes)).read_info() {
        Ok(reader) => reader,
        Err(e) => {
            debug!(error = %e, "Not a readable PNG stream");
            return chunks;
        }
    };
    if let Err(e) = reader.finish() {
        debug!(error = %e, "PNG stream ended early, keeping text read so far");
    }

    let info = reader.info();
    for chunk in &info.uncompressed_latin1_text {
        chunks.insert(chunk.keyword.clone(), chunk.text.clone());
    }
    for chunk in &info.compressed_latin1_text {
        match chunk.get_text() {
            Ok(text) => {
                chunks.insert(chunk.keyword.clone(), text);
            }
            Err(e) => debug!(keyword = %chunk.keyword, error = %e, "Failed to inflate zTXt chunk"),
        }
    }
    for chunk in &info.utf8_text {
        match chunk.get_text() {
            Ok(text) => {
                chunks.insert(chunk.keyword.clone(), text);
            }
            Err(e) => debug!(keyword = %chunk.keyword, error = %e, "Failed to read iTXt chunk"),
        }
    }

    chunks
}

/// Concatenated `COM` segments of a JPEG stream, if any.
pub fn jpeg_comment(bytes: &[u8]) -> Option<Vec<u8>> {
    let jpeg = match Jpeg::from_bytes(Bytes::copy_from_slice(bytes)) {
        Ok(jpeg) => jpeg,
        Err(e) => {
            debug!(error = %e, "Not a readable JPEG stream");
            return None;
        }
    };

    let comment: Vec<u8> = jpeg
        .segments_by_marker(markers::COM)
        .flat_map(|segment| segment.contents().iter().copied())
        .collect();
    (!comment.is_empty()).then_some(comment)
}

pub(crate) fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

pub(crate) fn decode_utf8_dropping_invalid(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

fn fields_to_json(fields: &BTreeMap<String, MetaValue>) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = fields
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.to_text_lossy())))
        .collect();
    serde_json::Value::Object(map)
}

fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Bmp => "bmp",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 2x2 RGB PNG carrying the given chunks, written by `png` itself.
    fn png_with(
        text: &[(&str, &str)],
        ztxt: &[(&str, &str)],
        itxt: &[(&str, &str)],
    ) -> Vec<u8> {
        let mut out = Vec::new();
        let mut encoder = png::Encoder::new(&mut out, 2, 2);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        for (k, v) in text {
            encoder.add_text_chunk(k.to_string(), v.to_string()).unwrap();
        }
        for (k, v) in ztxt {
            encoder.add_ztxt_chunk(k.to_string(), v.to_string()).unwrap();
        }
        for (k, v) in itxt {
            encoder.add_itxt_chunk(k.to_string(), v.to_string()).unwrap();
        }
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&[0u8; 12]).unwrap();
        writer.finish().unwrap();
        out
    }

    #[test]
    fn test_png_text_chunks() {
        let png = png_with(
            &[("parameters", "a cat\nSteps: 20")],
            &[("workflow", "{\"workflow\": true}")],
            &[("prompt", "{\"3\": {}} \u{00e9}\u{4e2d}")],
        );

        let chunks = png_text_chunks(&png);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks["parameters"], "a cat\nSteps: 20");
        assert_eq!(chunks["workflow"], "{\"workflow\": true}");
        assert_eq!(chunks["prompt"], "{\"3\": {}} \u{00e9}\u{4e2d}");
    }

    #[test]
    fn test_non_png_has_no_chunks() {
        assert!(png_text_chunks(b"GIF89a....").is_empty());
        assert!(png_text_chunks(b"").is_empty());
    }

    #[test]
    fn test_png_without_text() {
        assert!(png_text_chunks(&png_with(&[], &[], &[])).is_empty());
    }

    #[test]
    fn test_jpeg_comment() {
        let mut jpeg = vec![0xFF, 0xD8];
        jpeg.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00]);
        let body = b"masterpiece, best quality";
        jpeg.extend_from_slice(&[0xFF, 0xFE]);
        jpeg.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
        jpeg.extend_from_slice(body);
        jpeg.extend_from_slice(&[0xFF, 0xD9]);

        assert_eq!(jpeg_comment(&jpeg).unwrap(), body.to_vec());
    }

    #[test]
    fn test_jpeg_without_comment() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00, 0xFF, 0xD9];
        assert!(jpeg_comment(&jpeg).is_none());
        assert!(jpeg_comment(b"not a jpeg").is_none());
    }

    #[test]
    fn test_lossy_decode_drops_invalid_bytes() {
        let value = MetaValue::Bytes(vec![b'a', 0xFF, b'b', 0xC3]);
        assert_eq!(value.to_text_lossy(), "ab");
    }
}
