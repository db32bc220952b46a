//! Archive (C6): owns a cache, extracts a source ZIP into Pages, manages
//! the chapter index, drives conversion, and writes the output archive.

use crate::analyzer::{self, FmtSize};
use crate::cache::{Cache, ScratchRoot};
use crate::codec::{self, Codec};
use crate::config::{ArchiveFormat, ConversionOptions};
use crate::error::{RecbzError, Result};
use crate::page::Page;
use crate::pool;
use crate::transform::{self, TransformOptions};
use crate::util;
use crate::writer;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipArchive;

pub const ZIP_COMMENT: &str = "repacked with reCBZ";
pub const CHAPTER_PREFIX: &str = "v";

pub struct Archive {
    pub source_path: PathBuf,
    pub source_stem: String,
    pub options: ConversionOptions,
    cache: Cache,
    index: Vec<Page>,
    chapter_lengths: Vec<usize>,
    pub bad_files: Vec<PathBuf>,
}

impl Archive {
    pub fn new(path: impl AsRef<Path>, root: &ScratchRoot, options: ConversionOptions) -> Result<Self> {
        let source_path = path.as_ref().to_path_buf();
        if !source_path.exists() {
            return Err(RecbzError::InvalidPath(source_path));
        }
        let source_stem = util::file_stem_str(&source_path);
        let cache = Cache::new(root)?;
        Ok(Self {
            source_path,
            source_stem,
            options,
            cache,
            index: Vec::new(),
            chapter_lengths: Vec::new(),
            bad_files: Vec::new(),
        })
    }

    pub fn cache_path(&self) -> &Path {
        self.cache.path()
    }

    /// True if the source archive's ZIP comment equals the repack marker;
    /// used to implement `--noprev`.
    pub fn already_repacked(&self) -> Result<bool> {
        let file = fs::File::open(&self.source_path)
            .map_err(|_| RecbzError::InvalidArchive(self.source_path.clone()))?;
        let zip = ZipArchive::new(file)
            .map_err(|_| RecbzError::InvalidArchive(self.source_path.clone()))?;
        Ok(zip.comment() == ZIP_COMMENT.as_bytes())
    }

    /// Extract `count` pages from the middle of the archive (0 = all),
    /// using the centered even-stride sampling rule. Does not populate the
    /// memoized index; callers who want the memoized list should use
    /// `fetch_pages`.
    pub fn extract(&mut self, count: usize) -> Result<Vec<Page>> {
        let file = fs::File::open(&self.source_path)
            .map_err(|_| RecbzError::InvalidArchive(self.source_path.clone()))?;
        let mut zip = ZipArchive::new(file)
            .map_err(|_| RecbzError::InvalidArchive(self.source_path.clone()))?;

        let total = zip.len();
        if total == 0 {
            return Err(RecbzError::InvalidArchive(self.source_path.clone()));
        }

        let selected: Vec<usize> = if count > 0 {
            if count * 2 > total {
                return Err(RecbzError::ArchiveTooSmall {
                    path: self.source_path.clone(),
                    entries: total,
                    needed: count * 2,
                });
            }
            let delta = total / 2;
            (delta - count..delta + count).step_by(2).collect()
        } else {
            (0..total).collect()
        };

        for i in selected {
            let mut entry = zip
                .by_index(i)
                .map_err(|_| RecbzError::InvalidArchive(self.source_path.clone()))?;
            if entry.is_dir() {
                continue;
            }
            let out_path = match entry.enclosed_name() {
                Some(name) => self.cache.path().join(name),
                None => continue,
            };
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
            }
            let mut out_file =
                fs::File::create(&out_path).map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
            std::io::copy(&mut entry, &mut out_file)
                .map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
        }

        let mut raw_paths: Vec<PathBuf> = WalkDir::new(self.cache.path())
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().to_path_buf())
            .collect();
        raw_paths = util::human_sort_paths(raw_paths);

        let cache_root = self.cache.path().to_path_buf();
        let pages = raw_paths
            .into_iter()
            .map(|path| {
                let relative = path
                    .strip_prefix(&cache_root)
                    .unwrap_or(&path)
                    .to_path_buf();
                Page::open(path, relative)
            })
            .collect();
        Ok(pages)
    }

    /// Mutable access to the current page index, e.g. to inspect each
    /// page's detected codec after conversion.
    pub fn pages_mut(&mut self) -> &mut [Page] {
        &mut self.index
    }

    /// Memoizing: populates the index on first call via a full extract.
    pub fn fetch_pages(&mut self) -> Result<&[Page]> {
        if self.index.is_empty() {
            self.index = self.extract(0)?;
        }
        Ok(&self.index)
    }

    /// Partitions the current page list by chapter lengths. An archive with
    /// no explicit chapters yet is treated as one chapter spanning every
    /// page.
    pub fn fetch_chapters(&mut self) -> Result<Vec<Vec<Page>>> {
        let pages = self.fetch_pages()?.to_vec();
        if self.chapter_lengths.is_empty() {
            self.chapter_lengths = vec![pages.len()];
        }
        let mut chapters = Vec::with_capacity(self.chapter_lengths.len());
        let mut rest = &pages[..];
        for &len in &self.chapter_lengths {
            let (chapter, remainder) = rest.split_at(len.min(rest.len()));
            chapters.push(chapter.to_vec());
            rest = remainder;
        }
        Ok(chapters)
    }

    /// Appends `other`'s pages (optionally sliced by `[start, end)`) as a
    /// new chapter of this archive.
    pub fn add_chapter(
        &mut self,
        other: &mut Archive,
        start: Option<usize>,
        end: Option<usize>,
    ) -> Result<()> {
        self.fetch_chapters()?;
        let other_pages = other.fetch_pages()?.to_vec();
        let start = start.unwrap_or(0);
        let end = end.unwrap_or(other_pages.len());
        let slice = &other_pages[start.min(other_pages.len())..end.min(other_pages.len())];
        self.chapter_lengths.push(slice.len());
        self.index.extend_from_slice(slice);
        Ok(())
    }

    /// Run the transform kernel over every page via the worker pool,
    /// splitting results into successes (the new index) and `bad_files`.
    pub fn convert_pages(
        &mut self,
        fmt: Option<Codec>,
        quality: Option<u8>,
        grayscale: Option<bool>,
        size: Option<(u32, u32)>,
    ) -> Result<&[Page]> {
        self.fetch_pages()?;
        let opts = TransformOptions {
            format: fmt.or(self.options.img_format),
            quality: quality.unwrap_or(self.options.img_quality),
            size: size.unwrap_or(self.options.img_size),
            grayscale: grayscale.unwrap_or(self.options.grayscale),
            no_upscale: self.options.no_upscale,
            no_downscale: self.options.no_downscale,
            ignore_page_err: self.options.ignore_page_err,
            ..Default::default()
        };

        let source_pages = self.index.clone();
        let results = pool::map_workers(
            &source_pages,
            self.options.processes,
            false,
            |page| transform::transform(page, &opts, None),
        )?;

        let mut new_index = Vec::with_capacity(results.len());
        let mut bad_files = Vec::new();
        for (ok, page) in results {
            if ok {
                new_index.push(page);
            } else {
                bad_files.push(page.path.clone());
            }
        }
        self.index = new_index;
        self.bad_files = bad_files;
        Ok(&self.index)
    }

    pub fn compute_fmt_sizes(&mut self) -> Result<Vec<FmtSize>> {
        analyzer::compute_fmt_sizes(self)
    }

    pub fn sample_pages(&mut self, count: usize) -> Result<Vec<Page>> {
        self.extract(count)
    }

    pub fn candidate_codecs(&self) -> Result<Vec<Codec>> {
        codec::candidate_codecs(&self.options.blacklisted_fmts)
    }

    /// Resolve the output path per naming policy, delete any pre-existing
    /// file there, and delegate to the appropriate writer.
    pub fn write_archive(&mut self, format: ArchiveFormat, file_stem_override: Option<&str>) -> Result<PathBuf> {
        if format == ArchiveFormat::Mobi {
            return Err(RecbzError::NotImplemented("mobi"));
        }

        let stem = file_stem_override.unwrap_or(&self.source_stem);
        let dest = self.resolve_output_path(stem, format)?;
        if dest.exists() {
            fs::remove_file(&dest).map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
        }

        match format {
            ArchiveFormat::Cbz | ArchiveFormat::Zip => {
                let chapters = self.fetch_chapters()?;
                writer::write_zip(&chapters, &dest, self.options.compress_zip)?;
            }
            ArchiveFormat::Epub => {
                let mut paths: Vec<PathBuf> = self.index.iter().map(|p| p.path.clone()).collect();
                paths = util::human_sort_paths(paths);
                self.index.sort_by_key(|p| {
                    paths.iter().position(|x| x == &p.path).unwrap_or(usize::MAX)
                });
                let chapters = self.fetch_chapters()?;
                writer::write_epub(stem, &chapters, &dest, &self.options)?;
            }
            ArchiveFormat::Mobi => unreachable!(),
        }
        Ok(dest)
    }

    fn resolve_output_path(&self, stem: &str, format: ArchiveFormat) -> Result<PathBuf> {
        let profile_ext = self.options.device_profile.map(|p| p.epub_ext);
        let ext = if format == ArchiveFormat::Epub {
            profile_ext.unwrap_or(".epub")
        } else {
            return Ok(self.plain_output_path(&format!("{stem}.{}", format.extension())));
        };
        let clean_stem = util::strip_known_double_suffix(stem);
        Ok(self.plain_output_path(&format!("{clean_stem}{ext}")))
    }

    fn plain_output_path(&self, file_name: &str) -> PathBuf {
        if self.options.overwrite {
            let parent = self.source_path.parent().unwrap_or_else(|| Path::new("."));
            parent.join(file_name)
        } else {
            let stem = Path::new(file_name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let ext = Path::new(file_name)
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();
            PathBuf::from(format!("{stem} [reCBZ].{ext}"))
        }
    }

    pub fn add_page(&mut self, path: impl AsRef<Path>, index: i64) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RecbzError::InvalidPath(path.to_path_buf()));
        }
        Codec::detect(path)?;
        let page = Page::open(path, path.file_name().unwrap_or_default());
        let len = self.index.len() as i64;
        let pos = if index < 0 { (len + index).max(0) } else { index.min(len) } as usize;
        self.index.insert(pos, page);
        Ok(())
    }

    pub fn remove_page(&mut self, index: i64) -> Result<Page> {
        let len = self.index.len() as i64;
        let pos = if index < 0 { len + index } else { index };
        if pos < 0 || pos >= len {
            return Err(RecbzError::Other(anyhow::anyhow!(
                "page index {index} out of range"
            )));
        }
        Ok(self.index.remove(pos as usize))
    }

    pub fn cleanup(&self) -> Result<()> {
        self.cache.cleanup()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn make_test_cbz(path: &Path, page_count: usize) {
        let file = fs::File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let opts = SimpleFileOptions::default();
        for i in 0..page_count {
            let img = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
            let mut buf = std::io::Cursor::new(Vec::new());
            img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
            zip.start_file(format!("{i:03}.png"), opts).unwrap();
            zip.write_all(buf.get_ref()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn extract_all_returns_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cbz = dir.path().join("test.cbz");
        make_test_cbz(&cbz, 12);

        let root = ScratchRoot::create().unwrap();
        let mut archive = Archive::new(&cbz, &root, ConversionOptions::default()).unwrap();
        let pages = archive.extract(0).unwrap();
        assert_eq!(pages.len(), 12);
    }

    #[test]
    fn sampling_too_large_is_archive_too_small() {
        let dir = tempfile::tempdir().unwrap();
        let cbz = dir.path().join("test.cbz");
        make_test_cbz(&cbz, 9);

        let root = ScratchRoot::create().unwrap();
        let mut archive = Archive::new(&cbz, &root, ConversionOptions::default()).unwrap();
        let result = archive.extract(10);
        assert!(matches!(result, Err(RecbzError::ArchiveTooSmall { .. })));
    }

    #[test]
    fn sampling_exact_half_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let cbz = dir.path().join("test.cbz");
        make_test_cbz(&cbz, 20);

        let root = ScratchRoot::create().unwrap();
        let mut archive = Archive::new(&cbz, &root, ConversionOptions::default()).unwrap();
        let pages = archive.extract(10).unwrap();
        assert_eq!(pages.len(), 10);
    }

    #[test]
    fn fetch_chapters_concat_equals_fetch_pages() {
        let dir = tempfile::tempdir().unwrap();
        let cbz = dir.path().join("test.cbz");
        make_test_cbz(&cbz, 15);

        let root = ScratchRoot::create().unwrap();
        let mut archive = Archive::new(&cbz, &root, ConversionOptions::default()).unwrap();
        archive.fetch_pages().unwrap();
        let pages: Vec<PathBuf> = archive.fetch_pages().unwrap().iter().map(|p| p.path.clone()).collect();
        let chapters = archive.fetch_chapters().unwrap();
        let concat: Vec<PathBuf> = chapters.iter().flatten().map(|p| p.path.clone()).collect();
        assert_eq!(pages, concat);
    }

    #[test]
    fn convert_pages_partitions_successes_and_failures() {
        let dir = tempfile::tempdir().unwrap();
        let cbz = dir.path().join("test.cbz");
        make_test_cbz(&cbz, 6);

        let root = ScratchRoot::create().unwrap();
        let mut opts = ConversionOptions::default();
        opts.img_format = Some(Codec::Jpeg);
        let mut archive = Archive::new(&cbz, &root, opts).unwrap();
        archive.fetch_pages().unwrap();
        let before = archive.fetch_pages().unwrap().len();
        archive.convert_pages(None, None, None, None).unwrap();
        assert_eq!(archive.index.len() + archive.bad_files.len(), before);
        assert_eq!(archive.bad_files.len(), 0);
    }

    #[test]
    fn remove_page_supports_negative_index() {
        let dir = tempfile::tempdir().unwrap();
        let cbz = dir.path().join("test.cbz");
        make_test_cbz(&cbz, 5);

        let root = ScratchRoot::create().unwrap();
        let mut archive = Archive::new(&cbz, &root, ConversionOptions::default()).unwrap();
        archive.fetch_pages().unwrap();
        let last_path = archive.index.last().unwrap().path.clone();
        let removed = archive.remove_page(-1).unwrap();
        assert_eq!(removed.path, last_path);
    }

    #[test]
    fn cleanup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cbz = dir.path().join("test.cbz");
        make_test_cbz(&cbz, 3);

        let root = ScratchRoot::create().unwrap();
        let archive = Archive::new(&cbz, &root, ConversionOptions::default()).unwrap();
        archive.cleanup().unwrap();
        archive.cleanup().unwrap();
    }
}
