//! Transform Kernel (C3): the pure per-page conversion function.
//!
//! `transform` is the unit of work the Worker Pool schedules. It never
//! mutates the source `Page` in place; it opens a fresh handle from the
//! source's path, exactly as the original reopens `Page(source.fp)` before
//! converting, so a worker only ever needs the path to reconstitute state.

use crate::codec::Codec;
use crate::error::{RecbzError, Result};
use crate::page::Page;
use image::imageops::FilterType;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// Target codec, or `None` to preserve the source codec.
    pub format: Option<Codec>,
    pub quality: u8,
    /// `(0, 0)` means "no resize".
    pub size: (u32, u32),
    pub grayscale: bool,
    pub no_upscale: bool,
    pub no_downscale: bool,
    pub resample_filter: FilterType,
    /// When true, a page-level I/O or format error is recovered as a
    /// failed result rather than propagated.
    pub ignore_page_err: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            format: None,
            quality: 80,
            size: (0, 0),
            grayscale: false,
            no_upscale: false,
            no_downscale: false,
            resample_filter: FilterType::Lanczos3,
            ignore_page_err: false,
        }
    }
}

/// `(success, page)`. On failure with `ignore_page_err` set, `page` is the
/// untouched source page, preserved for error reporting.
pub type TransformResult = (bool, Page);

/// Run the full transform pipeline on one page.
///
/// `dest_dir`, when given, is where the converted page is written (the
/// analyzer's per-codec subdirectories); otherwise the page is written back
/// next to its source.
pub fn transform(
    source: &Page,
    options: &TransformOptions,
    dest_dir: Option<&Path>,
) -> Result<TransformResult> {
    let mut page = Page::open(&source.path, &source.cache_relative);

    let source_fmt = match page.fmt() {
        Ok(fmt) => fmt,
        Err(e) => {
            return if options.ignore_page_err {
                Ok((false, page))
            } else {
                Err(e)
            };
        }
    };
    let mut img = match page.img().map(|i| i.clone()) {
        Ok(img) => img,
        Err(e) => {
            return if options.ignore_page_err {
                Ok((false, page))
            } else {
                Err(e)
            };
        }
    };

    let target_fmt = options.format.unwrap_or(source_fmt);
    page.set_fmt(target_fmt);

    if matches!(target_fmt, Codec::Jpeg) && !matches!(img, image::DynamicImage::ImageRgb8(_)) {
        img = image::DynamicImage::ImageRgb8(img.to_rgb8());
    }

    if options.grayscale {
        img = image::DynamicImage::ImageLuma8(img.to_luma8());
    }

    if options.size.0 != 0 && options.size.1 != 0 {
        use image::GenericImageView;
        let (w, h) = img.dimensions();
        let landscape = w > h;
        let (target_w, target_h) = if landscape {
            (options.size.1, options.size.0)
        } else {
            (options.size.0, options.size.1)
        };

        let downscaling = w > target_w && h > target_h;
        let should_resize = if downscaling {
            !options.no_downscale
        } else {
            !options.no_upscale
        };
        if should_resize {
            img = img.resize_exact(target_w, target_h, options.resample_filter);
        }
    }

    let ext = target_fmt.extensions()[0];
    let dest: PathBuf = match dest_dir {
        Some(dir) => dir.join(format!("{}.{}", page.stem, ext)),
        None => {
            let parent = page.path.parent().unwrap_or_else(|| Path::new("."));
            parent.join(format!("{}.{}", page.stem, ext))
        }
    };

    page.set_img(img);
    match page.save(&dest, options.quality) {
        Ok(()) => Ok((true, page)),
        Err(e) => {
            if options.ignore_page_err {
                Ok((false, page))
            } else {
                Err(e)
            }
        }
    }
}

/// Cooperative cancellation sentinel threaded through the worker pool:
/// a cancelled task returns this error without having written anything.
pub fn cancelled() -> RecbzError {
    RecbzError::WorkerPoolInterrupt
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};
    use tempfile::tempdir;

    fn make_source_page(dir: &Path, name: &str, w: u32, h: u32) -> Page {
        let img = DynamicImage::ImageRgb8(RgbImage::new(w, h));
        let path = dir.join(name);
        img.save(&path).unwrap();
        let mut page = Page::open(&path, name);
        page.set_fmt(Codec::Png);
        page
    }

    #[test]
    fn landscape_swaps_target_dimensions() {
        let dir = tempdir().unwrap();
        let source = make_source_page(dir.path(), "land.png", 2000, 1000);
        let opts = TransformOptions {
            size: (1072, 1448),
            ..Default::default()
        };
        let (ok, mut page) = transform(&source, &opts, None).unwrap();
        assert!(ok);
        let (w, h) = page.size().unwrap();
        assert_eq!((w, h), (1448, 1072));
    }

    #[test]
    fn portrait_keeps_target_dimensions() {
        let dir = tempdir().unwrap();
        let source = make_source_page(dir.path(), "port.png", 1000, 2000);
        let opts = TransformOptions {
            size: (1072, 1448),
            ..Default::default()
        };
        let (ok, mut page) = transform(&source, &opts, None).unwrap();
        assert!(ok);
        let (w, h) = page.size().unwrap();
        assert_eq!((w, h), (1072, 1448));
    }

    #[test]
    fn no_downscale_skips_shrinking_both_dims() {
        let dir = tempdir().unwrap();
        let source = make_source_page(dir.path(), "big.png", 4000, 4000);
        let opts = TransformOptions {
            size: (1072, 1448),
            no_downscale: true,
            ..Default::default()
        };
        let (ok, mut page) = transform(&source, &opts, None).unwrap();
        assert!(ok);
        let (w, h) = page.size().unwrap();
        assert_eq!((w, h), (4000, 4000));
    }

    #[test]
    fn grayscale_produces_single_channel() {
        let dir = tempdir().unwrap();
        let source = make_source_page(dir.path(), "gray.png", 50, 50);
        let opts = TransformOptions {
            grayscale: true,
            ..Default::default()
        };
        let (ok, mut page) = transform(&source, &opts, None).unwrap();
        assert!(ok);
        assert_eq!(page.fmt().unwrap(), Codec::Png);
        let img = page.img().unwrap();
        assert!(matches!(img, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn recodes_to_requested_target_and_extension() {
        let dir = tempdir().unwrap();
        let source = make_source_page(dir.path(), "src.png", 16, 16);
        let opts = TransformOptions {
            format: Some(Codec::Jpeg),
            quality: 90,
            ..Default::default()
        };
        let (ok, mut page) = transform(&source, &opts, None).unwrap();
        assert!(ok);
        assert_eq!(page.fmt().unwrap(), Codec::Jpeg);
        assert_eq!(page.path.extension().unwrap(), "jpeg");
    }

    #[test]
    fn ignore_page_err_recovers_bad_source() {
        let dir = tempdir().unwrap();
        let bad_path = dir.path().join("not-an-image.txt");
        std::fs::write(&bad_path, b"hello").unwrap();
        let source = Page::open(&bad_path, "not-an-image.txt");
        let opts = TransformOptions {
            ignore_page_err: true,
            ..Default::default()
        };
        let (ok, _) = transform(&source, &opts, None).unwrap();
        assert!(!ok);
    }

    #[test]
    fn without_ignore_flag_bad_source_is_fatal() {
        let dir = tempdir().unwrap();
        let bad_path = dir.path().join("not-an-image.txt");
        std::fs::write(&bad_path, b"hello").unwrap();
        let source = Page::open(&bad_path, "not-an-image.txt");
        let opts = TransformOptions::default();
        assert!(transform(&source, &opts, None).is_err());
    }
}
