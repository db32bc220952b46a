//! Device Profile Catalog (C10): static e-reader profiles.
//!
//! Applying a profile pre-seeds grayscale/size/archive-format/blacklist
//! fields before CLI flags are read (see `config::ConversionOptions::apply_profile`);
//! a later explicit `--color`/`--size`/`--imgfmt` still wins.

use crate::error::{RecbzError, Result};

/// One EPUB metadata tag to emit in the package's content OPF, either a
/// `property` tag (Kobo's `rendition:*` triples) or a `name`/`content` pair
/// (Kindle's larger tag set).
#[derive(Debug, Clone, Copy)]
pub enum EpubTag {
    Property(&'static str, &'static str),
    NameContent(&'static str, &'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct DeviceProfile {
    pub nickname: &'static str,
    pub desc: &'static str,
    pub size: (u32, u32),
    pub gray: bool,
    pub epub_ext: &'static str,
    pub epub_tags: &'static [EpubTag],
}

const KOBO_TAGS: &[EpubTag] = &[
    EpubTag::Property("rendition:spread", "portrait"),
    EpubTag::Property("rendition:orientation", "portrait"),
    EpubTag::Property("rendition:layout", "pre-paginated"),
];

const KINDLE_TAGS: &[EpubTag] = &[
    EpubTag::NameContent("fixed-layout", "true"),
    EpubTag::NameContent("book-type", "comic"),
    EpubTag::NameContent("primary-writing-mode", "horizontal-lr"),
    EpubTag::NameContent("zero-gutter", "true"),
    EpubTag::NameContent("zero-margin", "true"),
    EpubTag::NameContent("ke-border-color", "#FFFFFF"),
    EpubTag::NameContent("ke-border-width", "0"),
    EpubTag::NameContent("orientation-lock", "portrait"),
    EpubTag::NameContent("region-mag", "true"),
];

pub const PROFILES: &[DeviceProfile] = &[
    DeviceProfile {
        nickname: "KOF",
        desc: "Kobo Forma/Sage",
        size: (1440, 1920),
        gray: true,
        epub_ext: ".kepub.epub",
        epub_tags: KOBO_TAGS,
    },
    DeviceProfile {
        nickname: "KOL",
        desc: "Kobo Libra 1/2",
        size: (1264, 1680),
        gray: true,
        epub_ext: ".kepub.epub",
        epub_tags: KOBO_TAGS,
    },
    DeviceProfile {
        nickname: "KOE",
        desc: "Kobo Elipsa/Aura One",
        size: (1404, 1872),
        gray: true,
        epub_ext: ".kepub.epub",
        epub_tags: KOBO_TAGS,
    },
    DeviceProfile {
        nickname: "KOC",
        desc: "Kobo Clara HD/2E",
        size: (1072, 1448),
        gray: true,
        epub_ext: ".kepub.epub",
        epub_tags: KOBO_TAGS,
    },
    DeviceProfile {
        nickname: "KON",
        desc: "Kobo Nia",
        size: (758, 1024),
        gray: true,
        epub_ext: ".kepub.epub",
        epub_tags: KOBO_TAGS,
    },
    DeviceProfile {
        nickname: "PW5",
        desc: "Kindle Paperwhite (11th gen)",
        size: (1246, 1648),
        gray: true,
        epub_ext: ".epub",
        epub_tags: KINDLE_TAGS,
    },
    DeviceProfile {
        nickname: "PW3",
        desc: "Kindle Paperwhite (7-10th gen)/Basic (10th gen)",
        size: (1072, 1448),
        gray: true,
        epub_ext: ".epub",
        epub_tags: KINDLE_TAGS,
    },
    DeviceProfile {
        nickname: "PW2",
        desc: "Kindle Paperwhite (5-6th gen)",
        size: (758, 1024),
        gray: true,
        epub_ext: ".epub",
        epub_tags: KINDLE_TAGS,
    },
    DeviceProfile {
        nickname: "KT2",
        desc: "Kindle Basic (7-8th gen)",
        size: (600, 800),
        gray: true,
        epub_ext: ".epub",
        epub_tags: KINDLE_TAGS,
    },
    DeviceProfile {
        nickname: "KOA",
        desc: "Kindle Oasis",
        size: (1264, 1680),
        gray: true,
        epub_ext: ".epub",
        epub_tags: KINDLE_TAGS,
    },
    DeviceProfile {
        nickname: "KVO",
        desc: "Kindle Voyage",
        size: (1080, 1440),
        gray: true,
        epub_ext: ".epub",
        epub_tags: KINDLE_TAGS,
    },
];

/// Case-insensitive nickname lookup, used by `-p/--profile`.
pub fn lookup(nickname: &str) -> Result<DeviceProfile> {
    PROFILES
        .iter()
        .copied()
        .find(|p| p.nickname.eq_ignore_ascii_case(nickname))
        .ok_or_else(|| RecbzError::InvalidProfile(nickname.to_string()))
}

/// Formatted `NICKNAME  Description` lines for `--profiles`.
pub fn list_display() -> Vec<String> {
    PROFILES
        .iter()
        .map(|p| format!("{:<5} {}", p.nickname, p.desc))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup("koc").unwrap().nickname, "KOC");
        assert_eq!(lookup("KOC").unwrap().nickname, "KOC");
    }

    #[test]
    fn lookup_rejects_unknown_nickname() {
        assert!(lookup("ZZZ").is_err());
    }

    #[test]
    fn all_profiles_are_grayscale() {
        assert!(PROFILES.iter().all(|p| p.gray));
    }

    #[test]
    fn kobo_profiles_use_kepub_extension() {
        let koc = lookup("KOC").unwrap();
        assert_eq!(koc.epub_ext, ".kepub.epub");
    }
}
