// ============================================================================
// curator-core/src/library.rs
// ============================================================================
//
// LIBRARY NAMING: Destination paths inside the media-server library tree
//
// KEY COMPONENTS:
// - safe_name: strips characters the library file systems reject
// - movie_path / episode_path: destination builders
// - file_ident: fixed-width log prefix identifying a source file

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::processing::plan::ResolutionTier;

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:"*?<>|…]"#).expect("valid regex"));

/// Width of the per-file log prefix.
const IDENT_WIDTH: usize = 13;

/// Makes a title usable as a file or folder name.
///
/// Unsafe characters become spaces, whitespace runs collapse, typographic
/// apostrophes become plain ones and a single trailing period is dropped.
pub fn safe_name(name: &str) -> String {
    let replaced = UNSAFE_CHARS.replace_all(name, " ");
    let mut safe = replaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{2019}', "'");
    if safe.ends_with('.') {
        safe.pop();
    }
    safe
}

/// A movie's place in the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieTarget<'a> {
    pub title: &'a str,
    pub year: i32,
    /// Collection folder grouping related movies
    pub collection: Option<&'a str>,
    /// Appended to the file name when several versions are kept
    pub tier: Option<ResolutionTier>,
}

/// `<root>/[<Collection>/]<Title> (<Year>)/<Title> (<Year>)[.<tier>].mp4`
pub fn movie_path(root: &Path, movie: &MovieTarget<'_>) -> PathBuf {
    let title = safe_name(movie.title);
    let base = format!("{title} ({})", movie.year);

    let mut folder = root.to_path_buf();
    if let Some(collection) = movie.collection {
        folder.push(safe_name(collection));
    }
    folder.push(&base);

    let file_name = match movie.tier {
        Some(tier) => format!("{base}.{tier}.mp4"),
        None => format!("{base}.mp4"),
    };
    folder.join(file_name)
}

/// A TV episode's place in the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeTarget<'a> {
    pub show: &'a str,
    /// Season 0 holds specials
    pub season: u32,
    pub episode: u32,
    pub name: &'a str,
}

/// `<root>/<Show>/Season N|Specials/<Show> - SxxEyy - <Name>.mp4`
pub fn episode_path(root: &Path, episode: &EpisodeTarget<'_>) -> PathBuf {
    let show = safe_name(episode.show);
    let season_folder = if episode.season == 0 {
        "Specials".to_string()
    } else {
        format!("Season {}", episode.season)
    };
    let file_name = format!(
        "{show} - S{:02}E{:02} - {}.mp4",
        episode.season,
        episode.episode,
        safe_name(episode.name)
    );
    root.join(&show).join(season_folder).join(file_name)
}

/// Fixed-width identity of a source file for log prefixes.
pub fn file_ident(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let short: String = name.chars().take(IDENT_WIDTH).collect();
    format!("{short:<width$}", width = IDENT_WIDTH)
}
