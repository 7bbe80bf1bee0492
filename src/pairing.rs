//! Intro/loop file naming.
//!
//! Music split for gapless looping is usually shipped as two files sharing a
//! base name: `town_intro.ogg` and `town_loop.ogg`. These helpers find one
//! half from the other.

use std::path::{Path, PathBuf};

use crate::segment::SegmentKind;

/// Stem suffix of an intro segment.
pub const INTRO_SUFFIX: &str = "_intro";
/// Stem suffix of a loop segment.
pub const LOOP_SUFFIX: &str = "_loop";

/// Which half of a pair a file is, judging by its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The stem ends in [`INTRO_SUFFIX`].
    Intro,
    /// The stem ends in [`LOOP_SUFFIX`].
    Loop,
}

impl Role {
    /// Reads the role from the file stem of `path`.
    pub fn of(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?;
        if stem.ends_with(INTRO_SUFFIX) {
            Some(Self::Intro)
        } else if stem.ends_with(LOOP_SUFFIX) {
            Some(Self::Loop)
        } else {
            None
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::Intro => INTRO_SUFFIX,
            Self::Loop => LOOP_SUFFIX,
        }
    }

    fn other(self) -> Self {
        match self {
            Self::Intro => Self::Loop,
            Self::Loop => Self::Intro,
        }
    }
}

/// Base name shared by both halves: `town` for `town_loop.wav`.
pub fn base_name(path: &Path) -> Option<&str> {
    let role = Role::of(path)?;
    let stem = path.file_stem()?.to_str()?;
    stem.strip_suffix(role.suffix())
}

/// Path the other half of the pair would have, in the same directory and
/// with the same extension. Does not look at the file system.
pub fn counterpart_path(path: &Path) -> Option<PathBuf> {
    let role = Role::of(path)?;
    let base = base_name(path)?;

    let mut name = format!("{base}{}", role.other().suffix());
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        name.push('.');
        name.push_str(extension);
    }
    Some(path.with_file_name(name))
}

/// The other half of the pair, if it exists on disk.
pub fn find_counterpart(path: &Path) -> Option<PathBuf> {
    counterpart_path(path).filter(|candidate| candidate.is_file())
}

/// Returns `true` if the extension belongs to a codec this build can decode.
pub fn is_supported(path: &Path) -> bool {
    match SegmentKind::from_path(path) {
        Some(SegmentKind::Wav) => cfg!(feature = "wav"),
        Some(SegmentKind::Vorbis) => cfg!(feature = "vorbis"),
        None => false,
    }
}
