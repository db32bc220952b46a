//! Analyzer (C8): samples pages and ranks candidate codecs by estimated
//! output size.
//!
//! Two levels of parallelism: one OS thread per candidate codec (the outer,
//! small fan-out), each running its own worker pool over the sample (the
//! inner, per-page fan-out) — mirrors the source's thread-pool-of-processes
//! split.

use crate::archive::Archive;
use crate::error::Result;
use crate::pool;
use crate::transform::{self, TransformOptions};
use std::fs;

pub const SOURCE_LABEL: &str = "Source";

#[derive(Debug, Clone)]
pub struct FmtSize {
    pub bytes: u64,
    pub desc: String,
    pub name: String,
}

/// Extract the configured sample, compute its as-is size, then transcode it
/// to every candidate codec in parallel and rank the results ascending by
/// size with the source entry prepended.
pub fn compute_fmt_sizes(archive: &mut Archive) -> Result<Vec<FmtSize>> {
    let samples_count = archive.options.samples_count;
    let mut sample = archive.sample_pages(samples_count)?;

    let source_bytes: u64 = sample
        .iter()
        .map(|p| fs::metadata(&p.path).map(|m| m.len()).unwrap_or(0))
        .sum();
    let source_fmt = sample
        .first_mut()
        .map(|p| p.fmt())
        .transpose()?
        .unwrap_or(crate::codec::Codec::Png);
    let source_entry = FmtSize {
        bytes: source_bytes,
        desc: format!("{SOURCE_LABEL} ({})", source_fmt.desc()),
        name: source_fmt.name().to_string(),
    };

    let candidates = archive.candidate_codecs()?;
    let cache_root = archive.cache_path().to_path_buf();
    let quality = archive.options.img_quality;
    let processes = archive.options.processes;

    let per_codec_results: Result<Vec<FmtSize>> = std::thread::scope(|scope| {
        let handles: Vec<_> = candidates
            .iter()
            .map(|&codec| {
                let sample = sample.clone();
                let cache_root = cache_root.clone();
                scope.spawn(move || -> Result<FmtSize> {
                    let dir = cache_root.join(codec.name());
                    fs::create_dir_all(&dir).map_err(|e| {
                        crate::error::RecbzError::Other(anyhow::anyhow!(e))
                    })?;
                    let opts = TransformOptions {
                        format: Some(codec),
                        quality,
                        ..Default::default()
                    };
                    let converted = pool::map_workers(&sample, processes, false, |page| {
                        transform::transform(page, &opts, Some(&dir))
                    })?;
                    let nbytes: u64 = converted
                        .iter()
                        .filter(|(ok, _)| *ok)
                        .map(|(_, page)| fs::metadata(&page.path).map(|m| m.len()).unwrap_or(0))
                        .sum();
                    Ok(FmtSize {
                        bytes: nbytes,
                        desc: codec.desc().to_string(),
                        name: codec.name().to_string(),
                    })
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|_| Err(pool::cancelled())))
            .collect()
    });

    let mut results = per_codec_results?;
    results.sort_by_key(|r| r.bytes);
    results.insert(0, source_entry);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ScratchRoot;
    use crate::config::ConversionOptions;
    use image::{DynamicImage, RgbImage};
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn make_test_cbz(path: &std::path::Path, page_count: usize) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let opts = SimpleFileOptions::default();
        for i in 0..page_count {
            let img = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
            let mut buf = std::io::Cursor::new(Vec::new());
            img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
            zip.start_file(format!("{i:03}.png"), opts).unwrap();
            zip.write_all(buf.get_ref()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn ranked_results_include_source_entry_first_position_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let cbz = dir.path().join("test.cbz");
        make_test_cbz(&cbz, 20);

        let root = ScratchRoot::create().unwrap();
        let mut opts = ConversionOptions::default();
        opts.samples_count = 5;
        let mut archive = Archive::new(&cbz, &root, opts).unwrap();
        let results = compute_fmt_sizes(&mut archive).unwrap();
        assert!(results[0].desc.starts_with(SOURCE_LABEL));
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn results_are_sorted_ascending_after_source() {
        let dir = tempfile::tempdir().unwrap();
        let cbz = dir.path().join("test.cbz");
        make_test_cbz(&cbz, 20);

        let root = ScratchRoot::create().unwrap();
        let mut opts = ConversionOptions::default();
        opts.samples_count = 5;
        let mut archive = Archive::new(&cbz, &root, opts).unwrap();
        let results = compute_fmt_sizes(&mut archive).unwrap();
        let ranked = &results[1..];
        assert!(ranked.windows(2).all(|w| w[0].bytes <= w[1].bytes));
    }
}
