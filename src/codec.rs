//! Codec Registry (C1): the immutable table of supported image codecs.
//!
//! Mirrors the `Jpeg`/`Png`/`WebpLossy`/`WebpLossless` class hierarchy of the
//! original tool as an enum, since Rust has no first-class class objects to
//! pass around: `Codec` is the runtime value, its associated functions are
//! the "methods".

use crate::error::{RecbzError, Result};
use image::{DynamicImage, ImageFormat};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Canonical short name used in CLI flags, config files, and blacklists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    Jpeg,
    Png,
    WebpLossy,
    WebpLossless,
}

pub const ALL_CODECS: [Codec; 4] = [
    Codec::Png,
    Codec::Jpeg,
    Codec::WebpLossy,
    Codec::WebpLossless,
];

impl Codec {
    /// Canonical short name, as used in `--imgfmt` and blacklist strings.
    pub fn name(self) -> &'static str {
        match self {
            Codec::Jpeg => "jpeg",
            Codec::Png => "png",
            Codec::WebpLossy => "webp",
            Codec::WebpLossless => "webpll",
        }
    }

    /// Human-readable description, used in the analyzer's ranked table.
    pub fn desc(self) -> &'static str {
        match self {
            Codec::Jpeg => "JPEG",
            Codec::Png => "PNG",
            Codec::WebpLossy => "WebP",
            Codec::WebpLossless => "WebP Lossless",
        }
    }

    /// Ordered list of recognized extensions; the first is the canonical
    /// output extension.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Codec::Jpeg => &["jpeg", "jpg"],
            Codec::Png => &["png"],
            Codec::WebpLossy => &["webp"],
            Codec::WebpLossless => &["webp"],
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Codec::Jpeg => "image/jpeg",
            Codec::Png => "image/png",
            Codec::WebpLossy | Codec::WebpLossless => "image/webp",
        }
    }

    pub fn is_lossless(self) -> bool {
        matches!(self, Codec::Png | Codec::WebpLossless)
    }

    pub fn from_name(name: &str) -> Result<Codec> {
        match name {
            "jpeg" => Ok(Codec::Jpeg),
            "png" => Ok(Codec::Png),
            "webp" => Ok(Codec::WebpLossy),
            "webpll" => Ok(Codec::WebpLossless),
            other => Err(RecbzError::InvalidFormatName(other.to_string())),
        }
    }

    /// Detect the codec a file on disk was (or would be) saved as.
    ///
    /// WebP lossy/lossless share an extension and a container, so plain
    /// format sniffing can't tell them apart: byte 15 of the RIFF header is
    /// `L` for lossless VP8L streams, anything else for lossy VP8.
    pub fn detect(path: &Path) -> Result<Codec> {
        let fmt = image::ImageReader::open(path)
            .map_err(|_| RecbzError::PageIOError(path.to_path_buf()))?
            .with_guessed_format()
            .map_err(|_| RecbzError::PageIOError(path.to_path_buf()))?
            .format()
            .ok_or_else(|| RecbzError::InvalidImageFormat(path.to_path_buf()))?;

        match fmt {
            ImageFormat::Png => Ok(Codec::Png),
            ImageFormat::Jpeg => Ok(Codec::Jpeg),
            ImageFormat::WebP => {
                if Self::webp_header_is_lossless(path)? {
                    Ok(Codec::WebpLossless)
                } else {
                    Ok(Codec::WebpLossy)
                }
            }
            _ => Err(RecbzError::InvalidImageFormat(path.to_path_buf())),
        }
    }

    fn webp_header_is_lossless(path: &Path) -> Result<bool> {
        let mut file =
            fs::File::open(path).map_err(|_| RecbzError::PageIOError(path.to_path_buf()))?;
        let mut header = [0u8; 16];
        let n = file
            .read(&mut header)
            .map_err(|_| RecbzError::PageIOError(path.to_path_buf()))?;
        if n < 16 {
            return Err(RecbzError::InvalidImageFormat(path.to_path_buf()));
        }
        Ok(header[15] == b'L')
    }

    /// Encode `img` to `dest` using this codec's fixed save parameters.
    pub fn save(self, img: &DynamicImage, dest: &Path, quality: u8) -> Result<()> {
        match self {
            Codec::Jpeg => {
                let rgb = img.to_rgb8();
                let file = fs::File::create(dest)
                    .map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
                let mut encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(file, quality);
                encoder
                    .encode_image(&rgb)
                    .map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
                Ok(())
            }
            Codec::Png => {
                let file = fs::File::create(dest)
                    .map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
                let encoder = image::codecs::png::PngEncoder::new_with_quality(
                    file,
                    image::codecs::png::CompressionType::Best,
                    image::codecs::png::FilterType::Adaptive,
                );
                img.write_with_encoder(encoder)
                    .map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
                Ok(())
            }
            Codec::WebpLossy => {
                let rgb = img.to_rgb8();
                let encoder = webp::Encoder::from_rgb(&rgb, rgb.width(), rgb.height());
                let data = encoder.encode(quality as f32);
                fs::write(dest, &*data).map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
                Ok(())
            }
            Codec::WebpLossless => {
                let rgb = img.to_rgb8();
                let encoder = webp::Encoder::from_rgb(&rgb, rgb.width(), rgb.height());
                let data = encoder.encode_lossless();
                fs::write(dest, &*data).map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
                Ok(())
            }
        }
    }
}

/// Parses a space-separated blacklist string into the set of codecs the
/// analyzer should skip. Unknown tokens are ignored, matching the source's
/// lenient `blacklisted_fmts.lower().split(' ')`.
pub fn candidate_codecs(blacklist: &str) -> Result<Vec<Codec>> {
    let blacklisted: Vec<&str> = blacklist.split_whitespace().collect();
    let valid: Vec<Codec> = ALL_CODECS
        .iter()
        .copied()
        .filter(|c| !blacklisted.contains(&c.name()))
        .collect();
    if valid.is_empty() {
        return Err(RecbzError::Other(anyhow::anyhow!(
            "valid_formats is 0: blacklist '{blacklist}' excludes every codec"
        )));
    }
    Ok(valid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_roundtrip() {
        for c in ALL_CODECS {
            assert_eq!(Codec::from_name(c.name()).unwrap(), c);
        }
    }

    #[test]
    fn from_name_rejects_unknown() {
        assert!(Codec::from_name("bogus").is_err());
    }

    #[test]
    fn candidate_codecs_excludes_blacklist() {
        let codecs = candidate_codecs("webp webpll").unwrap();
        assert_eq!(codecs, vec![Codec::Png, Codec::Jpeg]);
    }

    #[test]
    fn candidate_codecs_empty_blacklist_is_everything() {
        let codecs = candidate_codecs("").unwrap();
        assert_eq!(codecs.len(), 4);
    }

    #[test]
    fn candidate_codecs_rejects_full_blacklist() {
        assert!(candidate_codecs("jpeg png webp webpll").is_err());
    }

    #[test]
    fn extensions_agree_with_save_targets() {
        assert_eq!(Codec::Jpeg.extensions()[0], "jpeg");
        assert_eq!(Codec::Png.extensions()[0], "png");
        assert_eq!(Codec::WebpLossy.extensions()[0], "webp");
    }
}
