//! Display titles for what is playing.

use std::path::Path;

use crate::pairing::{self, Role};

/// Title shown when the resolver has nothing better.
pub const DEFAULT_TITLE: &str = "BGM Player";

/// Picks a display title for a pair of segment paths.
///
/// Resolvers run on the engine thread when a session starts.
pub trait TitleResolver: Send {
    /// Title for the music made of `intro` (if any) and `looped`.
    fn resolve(&self, intro: Option<&Path>, looped: Option<&Path>) -> Option<String>;
}

impl<F> TitleResolver for F
where
    F: Fn(Option<&Path>, Option<&Path>) -> Option<String> + Send,
{
    fn resolve(&self, intro: Option<&Path>, looped: Option<&Path>) -> Option<String> {
        self(intro, looped)
    }
}

/// Titles music after its file names.
///
/// A single file is titled by its stem. A `<base>_intro` / `<base>_loop`
/// pair (in either slot) is titled `<base>`. Anything else has no title.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileNameTitle;

impl TitleResolver for FileNameTitle {
    fn resolve(&self, intro: Option<&Path>, looped: Option<&Path>) -> Option<String> {
        match (intro, looped) {
            (Some(first), Some(second)) => {
                let roles = (Role::of(first)?, Role::of(second)?);
                if roles.0 == roles.1 {
                    return None;
                }
                let base = pairing::base_name(first)?;
                (Some(base) == pairing::base_name(second)).then(|| base.to_owned())
            }
            (Some(path), None) | (None, Some(path)) => {
                path.file_stem()?.to_str().map(str::to_owned)
            }
            (None, None) => None,
        }
    }
}
