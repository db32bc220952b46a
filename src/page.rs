//! Page (C2): a handle for one image on disk inside an archive's cache.
//!
//! Decoded state is intentionally not `Send` in any way that survives a
//! worker boundary: a `Page` only carries a path plus a cached format tag
//! across threads, and rematerializes its `DynamicImage` fresh on the worker
//! side the way the source's `__reduce__` pickles just the path.

use crate::codec::Codec;
use crate::error::{RecbzError, Result};
use image::DynamicImage;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Page {
    pub path: PathBuf,
    pub name: String,
    pub stem: String,
    /// Path relative to the owning archive's cache root, computed at
    /// extract time. Used to place the page inside the output archive.
    pub cache_relative: PathBuf,
    fmt: Option<Codec>,
    img: Option<DynamicImage>,
}

impl Page {
    /// Construct a page, deferring decode. `cache_relative` should be the
    /// path relative to the owning archive's cache root; pages created
    /// outside a cache (e.g. via `add_page`) may pass an empty path.
    pub fn open(path: impl Into<PathBuf>, cache_relative: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            stem,
            cache_relative: cache_relative.into(),
            fmt: None,
            img: None,
        }
    }

    /// Return the cached codec, or detect it from the file on disk.
    pub fn fmt(&mut self) -> Result<Codec> {
        if let Some(fmt) = self.fmt {
            return Ok(fmt);
        }
        let fmt = Codec::detect(&self.path)?;
        self.fmt = Some(fmt);
        Ok(fmt)
    }

    pub fn set_fmt(&mut self, fmt: Codec) {
        self.fmt = Some(fmt);
    }

    /// Return the decoded image, opening it on first access. The handle
    /// stays materialized until the next `save`.
    pub fn img(&mut self) -> Result<&DynamicImage> {
        if self.img.is_none() {
            let img = image::open(&self.path)
                .map_err(|_| RecbzError::PageIOError(self.path.clone()))?;
            self.img = Some(img);
        }
        Ok(self.img.as_ref().unwrap())
    }

    pub fn set_img(&mut self, img: DynamicImage) {
        self.img = Some(img);
    }

    pub fn size(&mut self) -> Result<(u32, u32)> {
        use image::GenericImageView;
        Ok(self.img()?.dimensions())
    }

    pub fn landscape(&mut self) -> Result<bool> {
        let (w, h) = self.size()?;
        Ok(w > h)
    }

    /// Encode using the current `fmt` to `dest`, then rebase this page's
    /// path fields onto `dest` and release the decoded handle.
    pub fn save(&mut self, dest: &Path, quality: u8) -> Result<()> {
        let fmt = self.fmt()?;
        let img = self
            .img
            .as_ref()
            .ok_or_else(|| RecbzError::Other(anyhow::anyhow!("save() called with no decoded image")))?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
        }
        fmt.save(img, dest, quality)?;

        let new_name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        // keep the cache-relative directory but follow the new extension,
        // so the output writer places the page next to its original
        // siblings under its new name.
        self.cache_relative = match self.cache_relative.parent() {
            Some(parent) if parent != Path::new("") => parent.join(&new_name),
            _ => PathBuf::from(&new_name),
        };
        self.path = dest.to_path_buf();
        self.name = new_name;
        self.stem = dest
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.img = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_splits_name_and_stem() {
        let page = Page::open("/tmp/cache/001.jpg", "001.jpg");
        assert_eq!(page.name, "001.jpg");
        assert_eq!(page.stem, "001");
    }

    #[test]
    fn fmt_is_memoized_once_set() {
        let mut page = Page::open("/nonexistent/does-not-exist.jpg", "does-not-exist.jpg");
        page.set_fmt(Codec::Jpeg);
        assert_eq!(page.fmt().unwrap(), Codec::Jpeg);
    }
}
