//! Configuration Layer (C11): defaults → TOML file → device profile → CLI
//! flags, composed in that order into one immutable [`ConversionOptions`]
//! snapshot shared read-only across archives and worker threads.

use crate::codec::Codec;
use crate::error::Result;
use crate::profiles::{self, DeviceProfile};
use serde::Deserialize;
use std::path::PathBuf;

/// TOML config file shape, mirroring `ConversionOptions` in three sections.
/// Every field is optional so a config file only needs to set what it wants
/// to override relative to the built-in defaults.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub general: Option<GeneralSection>,
    pub archive: Option<ArchiveSection>,
    pub image: Option<ImageSection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GeneralSection {
    pub overwrite: Option<bool>,
    pub ignore_page_err: Option<bool>,
    pub force_write: Option<bool>,
    pub no_write: Option<bool>,
    pub processes: Option<usize>,
    pub samples_count: Option<usize>,
    pub verbosity: Option<u8>,
    pub silent: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ArchiveSection {
    pub archive_format: Option<String>,
    pub compress_zip: Option<bool>,
    pub right_to_left: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImageSection {
    pub img_format: Option<String>,
    pub img_quality: Option<u8>,
    pub img_size: Option<(u32, u32)>,
    pub no_upscale: Option<bool>,
    pub no_downscale: Option<bool>,
    pub grayscale: Option<bool>,
    pub blacklisted_fmts: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Cbz,
    Zip,
    Epub,
    Mobi,
}

impl ArchiveFormat {
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "cbz" => Ok(Self::Cbz),
            "zip" => Ok(Self::Zip),
            "epub" => Ok(Self::Epub),
            "mobi" => Ok(Self::Mobi),
            other => Err(crate::error::RecbzError::InvalidFormatName(other.to_string())),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Cbz => "cbz",
            Self::Zip => "zip",
            Self::Epub => "epub",
            Self::Mobi => "mobi",
        }
    }
}

/// The fully-resolved, immutable per-run options. One instance is built at
/// startup and shared (read-only) by every `Archive` and worker thread.
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    pub overwrite: bool,
    pub ignore_page_err: bool,
    pub force_write: bool,
    pub no_write: bool,
    pub processes: usize,
    pub samples_count: usize,
    pub verbosity: u8,
    pub silent: bool,
    pub archive_format: ArchiveFormat,
    pub compress_zip: bool,
    pub right_to_left: bool,
    pub img_format: Option<Codec>,
    pub img_quality: u8,
    pub img_size: (u32, u32),
    pub no_upscale: bool,
    pub no_downscale: bool,
    pub grayscale: bool,
    pub blacklisted_fmts: String,
    pub noprev: bool,
    pub device_profile: Option<DeviceProfile>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            ignore_page_err: false,
            force_write: false,
            no_write: false,
            processes: default_process_count(),
            samples_count: 10,
            verbosity: 0,
            silent: false,
            archive_format: ArchiveFormat::Cbz,
            compress_zip: false,
            right_to_left: false,
            img_format: None,
            img_quality: 80,
            img_size: (0, 0),
            no_upscale: false,
            no_downscale: false,
            grayscale: false,
            blacklisted_fmts: String::new(),
            noprev: false,
            device_profile: None,
        }
    }
}

/// All-but-one logical core; a single-core box still yields 1, never 0.
fn default_process_count() -> usize {
    let cores = num_cpus::get();
    if (1..3).contains(&cores) {
        cores
    } else {
        cores.saturating_sub(1).max(1)
    }
}

impl ConversionOptions {
    /// Layer a parsed TOML file on top of the current (default) values.
    pub fn apply_file(mut self, file: &FileConfig) -> Self {
        if let Some(g) = &file.general {
            if let Some(v) = g.overwrite {
                self.overwrite = v;
            }
            if let Some(v) = g.ignore_page_err {
                self.ignore_page_err = v;
            }
            if let Some(v) = g.force_write {
                self.force_write = v;
            }
            if let Some(v) = g.no_write {
                self.no_write = v;
            }
            if let Some(v) = g.processes {
                self.processes = v;
            }
            if let Some(v) = g.samples_count {
                self.samples_count = v;
            }
            if let Some(v) = g.verbosity {
                self.verbosity = v;
            }
            if let Some(v) = g.silent {
                self.silent = v;
            }
        }
        if let Some(a) = &file.archive {
            if let Some(v) = &a.archive_format {
                if let Ok(fmt) = ArchiveFormat::from_name(v) {
                    self.archive_format = fmt;
                }
            }
            if let Some(v) = a.compress_zip {
                self.compress_zip = v;
            }
            if let Some(v) = a.right_to_left {
                self.right_to_left = v;
            }
        }
        if let Some(i) = &file.image {
            if let Some(v) = &i.img_format {
                if let Ok(codec) = Codec::from_name(v) {
                    self.img_format = Some(codec);
                }
            }
            if let Some(v) = i.img_quality {
                self.img_quality = v;
            }
            if let Some(v) = i.img_size {
                self.img_size = v;
            }
            if let Some(v) = i.no_upscale {
                self.no_upscale = v;
            }
            if let Some(v) = i.no_downscale {
                self.no_downscale = v;
            }
            if let Some(v) = i.grayscale {
                self.grayscale = v;
            }
            if let Some(v) = &i.blacklisted_fmts {
                self.blacklisted_fmts = v.clone();
            }
        }
        self
    }

    /// Pre-apply a device profile: grayscale, size, archive format (forced
    /// to epub), and blacklist are seeded from the profile. Must run before
    /// CLI flags are applied so an explicit later flag still wins.
    pub fn apply_profile(mut self, profile: DeviceProfile) -> Self {
        self.grayscale = profile.gray;
        self.img_size = profile.size;
        self.archive_format = ArchiveFormat::Epub;
        self.device_profile = Some(profile);
        self
    }

    pub fn resolve_config_path(explicit: Option<&PathBuf>) -> Option<PathBuf> {
        explicit.cloned()
    }
}

pub fn parse_file_config(contents: &str) -> Result<FileConfig> {
    toml::from_str(contents).map_err(|e| crate::error::RecbzError::Other(anyhow::anyhow!(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_empty_blacklist_and_no_resize() {
        let opts = ConversionOptions::default();
        assert_eq!(opts.img_size, (0, 0));
        assert!(opts.blacklisted_fmts.is_empty());
        assert_eq!(opts.archive_format, ArchiveFormat::Cbz);
    }

    #[test]
    fn file_config_overrides_defaults() {
        let toml = r#"
            [image]
            img_quality = 95
            grayscale = true
        "#;
        let file = parse_file_config(toml).unwrap();
        let opts = ConversionOptions::default().apply_file(&file);
        assert_eq!(opts.img_quality, 95);
        assert!(opts.grayscale);
    }

    #[test]
    fn profile_then_explicit_size_wins() {
        let profile = profiles::lookup("KOC").unwrap();
        let mut opts = ConversionOptions::default().apply_profile(profile);
        assert_eq!(opts.img_size, (1072, 1448));
        opts.img_size = (600, 800);
        assert_eq!(opts.img_size, (600, 800));
        assert_eq!(opts.archive_format, ArchiveFormat::Epub);
    }

    #[test]
    fn process_count_never_zero() {
        assert!(default_process_count() >= 1);
    }
}
