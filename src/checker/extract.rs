// src/checker/extract.rs
// =============================================================================
// This module pulls URLs out of free-text video descriptions.
//
// Descriptions aren't Markdown or HTML, just text, so a regex does the job:
// - Match anything shaped like scheme://... up to the next whitespace
// - Trim sentence punctuation that got glued onto the end ("see x.com/a.")
// - Keep a closing ')' when the URL itself opened one (wiki-style links)
//
// No deduplication: the same link twice in one description is reported
// twice, because it is two places the creator has to fix.
// =============================================================================

use once_cell::sync::Lazy;
use regex::Regex;

// scheme, "://", then everything up to whitespace or a character that can't
// appear unencoded in a URL. No '.' or '-' in the scheme, so a label glued
// on in front ("Merch-https://...") stays out of the match.
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[A-Za-z][A-Za-z0-9+]*://[^\s<>"'`{}|\\^\[\]]+"#)
        .expect("URL regex should compile")
});

// Characters that end a sentence rather than a URL
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', '!', '?', ')'];

/// Extracts every URL-looking substring from `text`, in order of appearance.
///
/// Example:
///   "Merch: https://shop.example.com/tee. Discord (https://discord.gg/abc)!"
///   -> ["https://shop.example.com/tee", "https://discord.gg/abc"]
pub fn extract_links(text: &str) -> Vec<String> {
    URL_PATTERN
        .find_iter(text)
        .map(|m| trim_trailing_punctuation(m.as_str()))
        .filter(|url| has_host(url))
        .map(str::to_string)
        .collect()
}

/// A link found in a video's description. The same URL in two videos is two
/// ExtractedLinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    pub source_video_id: String,
    pub raw_url: String,
}

/// Runs extract_links over a description and tags each hit with its video.
pub fn extract_video_links(video_id: &str, description: &str) -> Vec<ExtractedLink> {
    extract_links(description)
        .into_iter()
        .map(|raw_url| ExtractedLink {
            source_video_id: video_id.to_string(),
            raw_url,
        })
        .collect()
}

fn trim_trailing_punctuation(mut url: &str) -> &str {
    while let Some(last) = url.chars().last() {
        if !TRAILING_PUNCTUATION.contains(&last) {
            break;
        }
        // A ')' that closes a '(' inside the URL belongs to the URL
        if last == ')' && url.matches('(').count() >= url.matches(')').count() {
            break;
        }
        url = &url[..url.len() - last.len_utf8()];
    }
    url
}

// Rejects bare "https://" left over after trimming
fn has_host(url: &str) -> bool {
    url.split_once("://")
        .map(|(_, rest)| !rest.is_empty())
        .unwrap_or(false)
}
