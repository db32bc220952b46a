//! Archive Writers (C7): the ZIP/CBZ writer and the EPUB writer.
//!
//! The ZIP writer is hand-rolled over the `zip` crate, matching the
//! teacher's direct-to-crate style elsewhere in the pipeline. The EPUB
//! writer delegates OPF/XHTML/NCX assembly to `epub-builder`, only
//! supplying the content the source's `epub.py` module built by hand.

use crate::archive::{CHAPTER_PREFIX, ZIP_COMMENT};
use crate::config::ConversionOptions;
use crate::error::{RecbzError, Result};
use crate::page::Page;
use epub_builder::{EpubBuilder, EpubContent, ReferenceType, ZipLibrary};
use std::fs;
use std::io::Read;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Write `chapters` (in order, pages within each in order) to `dest` as a
/// flat or chapter-prefixed ZIP, with the fixed repack comment.
pub fn write_zip(chapters: &[Vec<Page>], dest: &Path, compress: bool) -> Result<()> {
    let file = fs::File::create(dest).map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
    let mut zip = ZipWriter::new(file);
    let method = if compress {
        CompressionMethod::Deflated
    } else {
        CompressionMethod::Stored
    };
    let opts = if compress {
        SimpleFileOptions::default()
            .compression_method(method)
            .compression_level(Some(9))
    } else {
        SimpleFileOptions::default().compression_method(method)
    };

    let lead_zeroes = chapters.len().to_string().len();
    for (i, chapter) in chapters.iter().enumerate() {
        for page in chapter {
            let entry_name = if chapters.len() > 1 {
                format!(
                    "{CHAPTER_PREFIX}{:0width$}/{}",
                    i + 1,
                    page.cache_relative.display(),
                    width = lead_zeroes
                )
            } else {
                page.cache_relative.display().to_string()
            };
            zip.start_file(entry_name, opts)
                .map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
            let mut source = fs::File::open(&page.path)
                .map_err(|_| RecbzError::PageIOError(page.path.clone()))?;
            std::io::copy(&mut source, &mut zip)
                .map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
        }
    }
    zip.set_comment(ZIP_COMMENT);
    zip.finish().map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
    Ok(())
}

/// Split `stem` into `(title, author)` on the first `" - "`, falling back
/// to a fixed program name when there's no split.
fn split_title_author(stem: &str) -> (String, String) {
    match stem.split_once(" - ") {
        Some((title, author)) => (title.to_string(), author.to_string()),
        None => (stem.to_string(), "reCBZ".to_string()),
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    fs::File::open(path)
        .map_err(|_| RecbzError::PageIOError(path.to_path_buf()))?
        .read_to_end(&mut buf)
        .map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
    Ok(buf)
}

/// `(width, height)` for one page: the device profile's target size when a
/// profile is active, swapped for landscape pages the same way the
/// transform kernel swaps; else the page's own dimensions.
fn page_dims(page: &mut Page, options: &ConversionOptions) -> Result<(u32, u32)> {
    if let Some(profile) = options.device_profile {
        let (w, h) = profile.size;
        if page.landscape()? {
            Ok((h, w))
        } else {
            Ok((w, h))
        }
    } else {
        page.size()
    }
}

/// Build the EPUB package. `chapters` with exactly one entry produce no
/// chapter-scoped TOC beyond the single first-page entry; more than one
/// produce one TOC entry per chapter named `Ch <i>`.
pub fn write_epub(
    stem: &str,
    chapters: &[Vec<Page>],
    dest: &Path,
    options: &ConversionOptions,
) -> Result<()> {
    let (title, author) = split_title_author(stem);
    let mut builder = EpubBuilder::new(ZipLibrary::new().map_err(epub_err)?).map_err(epub_err)?;
    builder.metadata("title", title.clone()).map_err(epub_err)?;
    builder.metadata("author", author).map_err(epub_err)?;
    builder.metadata("lang", "en").map_err(epub_err)?;
    builder.inline_toc();

    let mut chapters: Vec<Vec<Page>> = chapters.to_vec();
    {
        let cover = chapters
            .first_mut()
            .and_then(|c| c.first_mut())
            .ok_or_else(|| RecbzError::Other(anyhow::anyhow!("no pages in archive")))?;
        let cover_fmt = cover.fmt()?;
        let cover_bytes = read_file(&cover.path)?;
        builder
            .add_cover_image(
                format!("cover.{}", cover_fmt.extensions()[0]),
                &cover_bytes[..],
                cover_fmt.mime(),
            )
            .map_err(epub_err)?;
    }

    let lead_zeroes = chapters.len().to_string().len();
    let mut page_i = 1usize;
    for (chapter_i, chapter) in chapters.iter_mut().enumerate() {
        let chapter_name = format!("Ch {:0width$}", chapter_i + 1, width = lead_zeroes);
        for (j, page) in chapter.iter_mut().enumerate() {
            let fmt = page.fmt()?;
            let (w, h) = page_dims(page, options)?;
            let static_dest = format!("static/{page_i}.{}", fmt.extensions()[0]);
            let image_bytes = read_file(&page.path)?;
            builder
                .add_resource(static_dest.clone(), &image_bytes[..], fmt.mime())
                .map_err(epub_err)?;

            let xhtml = format!(
                "<html><head></head><body><img src=\"{static_dest}\" width=\"{w}\" height=\"{h}\"/></body></html>"
            );
            let page_path = format!("page_{page_i}.xhtml");
            let mut content = EpubContent::new(page_path, xhtml.as_bytes())
                .title(format!("{chapter_name} Page {}", j + 1))
                .reftype(ReferenceType::Text);
            if chapters.len() > 1 && j == 0 {
                content = content.title(chapter_name.clone());
            }
            builder.add_content(content).map_err(epub_err)?;
            page_i += 1;
        }
    }

    if options.right_to_left {
        builder.metadata("direction", "rtl").map_err(epub_err)?;
    }
    if let Some(profile) = options.device_profile {
        for tag in profile.epub_tags {
            match tag {
                crate::profiles::EpubTag::Property(name, content) => {
                    builder.metadata(name.to_string(), content.to_string()).map_err(epub_err)?;
                }
                crate::profiles::EpubTag::NameContent(name, content) => {
                    builder.metadata(name.to_string(), content.to_string()).map_err(epub_err)?;
                }
            }
        }
    }

    let mut out = fs::File::create(dest).map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
    builder.generate(&mut out).map_err(epub_err)?;
    Ok(())
}

fn epub_err(e: impl std::fmt::Display) -> RecbzError {
    RecbzError::Other(anyhow::anyhow!("epub writer: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_title_author_splits_on_dash() {
        let (title, author) = split_title_author("Foo Comic - Jane Doe");
        assert_eq!(title, "Foo Comic");
        assert_eq!(author, "Jane Doe");
    }

    #[test]
    fn split_title_author_defaults_author_without_dash() {
        let (title, author) = split_title_author("Foo Comic");
        assert_eq!(title, "Foo Comic");
        assert_eq!(author, "reCBZ");
    }
}
