//! Display-width calculation and priority-region string shortening (spec.md §4.A).
//!
//! `display_width` walks grapheme clusters rather than `char`s so that
//! combining marks and multi-codepoint emoji are measured the way a
//! terminal actually renders them; `reduce_width` is the region-aware
//! shortening entry point every status/dialog surface in the UI calls
//! through.

mod strategy;

pub use strategy::{AbbrevPosition, Strategy};

use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// A priority-ordered region of a string that can be shortened independently
/// (spec.md §4.A "ShorteningRegion").
///
/// Indices are half-open `[start, end)` into the *character* sequence
/// (`text.chars()`), not byte offsets and not display columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShorteningRegion {
    pub start: usize,
    pub end: usize,
    pub priority: i32,
    pub strategy: Strategy,
    pub abbrev_position: AbbrevPosition,
    pub filepath_mode: bool,
}

impl ShorteningRegion {
    pub fn new(start: usize, end: usize, priority: i32, strategy: Strategy) -> Self {
        Self {
            start,
            end,
            priority,
            strategy,
            abbrev_position: AbbrevPosition::Right,
            filepath_mode: false,
        }
    }

    pub fn with_position(mut self, position: AbbrevPosition) -> Self {
        self.abbrev_position = position;
        self
    }

    pub fn with_filepath_mode(mut self, filepath_mode: bool) -> Self {
        self.filepath_mode = filepath_mode;
        self
    }
}

pub(crate) const ELLIPSIS: &str = "…";

/// Display width of a string in terminal columns.
///
/// Normalizes to NFC, then sums per-grapheme-cluster widths: combining
/// marks count 0, East-Asian-Wide/Fullwidth and most emoji count 2, all
/// others count 1. The per-grapheme walk (rather than per-`char`) is what
/// keeps multi-codepoint emoji and combining sequences from being counted
/// more than once.
pub fn display_width(text: &str) -> usize {
    let normalized: String = text.nfc().collect();
    normalized.graphemes(true).map(UnicodeWidthStr::width).sum()
}

/// Reduce `text` to fit within `target_width` display columns.
///
/// See spec.md §4.A for the full algorithm. Returns the empty string for
/// empty input or a non-positive target; never panics on malformed input.
pub fn reduce_width(
    text: &str,
    target_width: i64,
    regions: Option<&[ShorteningRegion]>,
    default_strategy: Strategy,
    default_position: AbbrevPosition,
) -> String {
    if text.is_empty() || target_width <= 0 {
        return String::new();
    }

    let normalized: String = text.nfc().collect();
    let target_width = target_width as usize;

    if display_width(&normalized) <= target_width {
        return normalized;
    }

    let chars: Vec<char> = normalized.chars().collect();

    let regions: Vec<ShorteningRegion> = match regions {
        Some(r) if !r.is_empty() => r.to_vec(),
        _ => vec![ShorteningRegion::new(0, chars.len(), 1, default_strategy)
            .with_position(default_position)],
    };

    let valid = validate_regions(&regions, chars.len());
    if valid.is_empty() {
        return strategy::apply(
            &normalized,
            target_width,
            &ShorteningRegion::new(0, chars.len(), 1, default_strategy).with_position(default_position),
        );
    }

    let result = if regions_overlap(&valid) {
        process_sequential(&chars, target_width, &valid)
    } else {
        process_priority_grouped(&chars, target_width, &valid)
    };

    if display_width(&result) <= target_width {
        return result;
    }

    // Fallback: apply the default strategy once more to the whole string.
    let whole_chars: Vec<char> = result.chars().collect();
    let fallback_region =
        ShorteningRegion::new(0, whole_chars.len(), 1, default_strategy).with_position(default_position);
    strategy::apply(&result, target_width, &fallback_region)
}

fn validate_regions(regions: &[ShorteningRegion], text_len: usize) -> Vec<ShorteningRegion> {
    let mut sorted: Vec<ShorteningRegion> = regions.to_vec();
    sorted.sort_by(|a, b| b.priority.cmp(&a.priority));
    sorted
        .into_iter()
        .filter(|r| {
            if r.start >= r.end {
                tracing::warn!(start = r.start, end = r.end, "invalid shortening region: start >= end");
                return false;
            }
            if r.start >= text_len || r.end > text_len {
                tracing::warn!(start = r.start, end = r.end, text_len, "shortening region out of bounds");
                return false;
            }
            true
        })
        .collect()
}

fn regions_overlap(regions: &[ShorteningRegion]) -> bool {
    for (i, a) in regions.iter().enumerate() {
        for b in &regions[i + 1..] {
            if a.start < b.end && b.start < a.end {
                return true;
            }
        }
    }
    false
}

fn join(chars: &[char], regions_by_pos: &[ShorteningRegion], region_texts: &std::collections::HashMap<usize, String>) -> String {
    let mut out = String::new();
    let mut last_end = 0usize;
    for region in regions_by_pos {
        if region.start > last_end {
            out.push_str(&chars[last_end..region.start].iter().collect::<String>());
        }
        out.push_str(&region_texts[&region.start]);
        last_end = region.end;
    }
    if last_end < chars.len() {
        out.push_str(&chars[last_end..].iter().collect::<String>());
    }
    out
}

fn process_priority_grouped(chars: &[char], target_width: usize, regions: &[ShorteningRegion]) -> String {
    let mut regions_by_pos: Vec<ShorteningRegion> = regions.to_vec();
    regions_by_pos.sort_by_key(|r| r.start);

    let mut original_texts = std::collections::HashMap::new();
    let mut region_texts = std::collections::HashMap::new();
    for region in &regions_by_pos {
        let text: String = chars[region.start..region.end].iter().collect();
        original_texts.insert(region.start, text.clone());
        region_texts.insert(region.start, text);
    }

    let mut priorities: Vec<i32> = regions.iter().map(|r| r.priority).collect();
    priorities.sort_unstable_by(|a, b| b.cmp(a));
    priorities.dedup();

    for &level in &priorities {
        let current = join(chars, &regions_by_pos, &region_texts);
        let mut width_to_reduce = display_width(&current) as i64 - target_width as i64;
        if width_to_reduce <= 0 {
            break;
        }

        for region in regions.iter().filter(|r| r.priority == level) {
            if width_to_reduce <= 0 {
                break;
            }
            let region_text = region_texts[&region.start].clone();
            let region_width = display_width(&region_text) as i64;
            let region_target = (region_width - width_to_reduce).max(1) as usize;

            let temp_chars: Vec<char> = region_text.chars().collect();
            let temp_region = ShorteningRegion {
                start: 0,
                end: temp_chars.len(),
                ..*region
            };
            let shortened = strategy::apply(&region_text, region_target, &temp_region);
            let shortened_width = display_width(&shortened) as i64;
            width_to_reduce -= region_width - shortened_width;
            region_texts.insert(region.start, shortened);
        }
    }

    // Restoration pass: lowest priority upward, try to give space back.
    let current = join(chars, &regions_by_pos, &region_texts);
    let mut available_space = target_width as i64 - display_width(&current) as i64;

    if available_space > 0 {
        let mut ascending: Vec<i32> = regions.iter().map(|r| r.priority).collect();
        ascending.sort_unstable();
        ascending.dedup();

        for &level in &ascending {
            if available_space <= 0 {
                break;
            }
            for region in regions.iter().filter(|r| r.priority == level) {
                if available_space <= 0 {
                    break;
                }
                let current_text = region_texts[&region.start].clone();
                let original_text = &original_texts[&region.start];
                if &current_text == original_text {
                    continue;
                }
                let current_width = display_width(&current_text) as i64;
                let original_width = display_width(original_text) as i64;
                let new_target = current_width + available_space;

                if original_width <= new_target {
                    region_texts.insert(region.start, original_text.clone());
                    available_space -= original_width - current_width;
                } else {
                    let temp_chars: Vec<char> = original_text.chars().collect();
                    let temp_region = ShorteningRegion {
                        start: 0,
                        end: temp_chars.len(),
                        ..*region
                    };
                    let re_shortened = strategy::apply(original_text, new_target as usize, &temp_region);
                    let re_shortened_width = display_width(&re_shortened) as i64;
                    if re_shortened_width > current_width {
                        region_texts.insert(region.start, re_shortened);
                        available_space -= re_shortened_width - current_width;
                    }
                }
            }
        }
    }

    join(chars, &regions_by_pos, &region_texts)
}

fn process_sequential(chars: &[char], target_width: usize, regions: &[ShorteningRegion]) -> String {
    tracing::warn!("overlapping shortening regions detected, using sequential processing");
    let mut current: String = chars.iter().collect();

    for region in regions {
        let current_chars: Vec<char> = current.chars().collect();
        if region.start >= region.end || region.end > current_chars.len() {
            continue;
        }
        if display_width(&current) <= target_width {
            break;
        }
        current = strategy::apply(&current, target_width, region);
    }

    current
}

/// Convenience wrapper: abbreviate with the ellipsis in the middle.
pub fn abbreviate_middle(text: &str, target_width: i64) -> String {
    reduce_width(text, target_width, None, Strategy::Abbreviate, AbbrevPosition::Middle)
}

/// Convenience wrapper: abbreviate a filesystem path, shortening whole
/// directory levels before ever touching the filename.
pub fn abbreviate_path(path: &str, target_width: i64) -> String {
    let char_len = path.chars().count();
    let region = ShorteningRegion::new(0, char_len, 1, Strategy::Abbreviate)
        .with_position(AbbrevPosition::Middle)
        .with_filepath_mode(true);
    reduce_width(path, target_width, Some(&[region]), Strategy::Abbreviate, AbbrevPosition::Middle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_width_is_char_count() {
        assert_eq!(display_width("hello"), 5);
    }

    #[test]
    fn wide_cjk_counts_double() {
        assert_eq!(display_width("中文"), 4);
    }

    #[test]
    fn combining_marks_count_zero() {
        // "e" + combining acute accent (U+0301) normalizes to NFC "é" (1 codepoint, width 1).
        let decomposed = "e\u{0301}";
        assert_eq!(display_width(decomposed), 1);
    }

    #[test]
    fn fits_returns_unchanged() {
        assert_eq!(reduce_width("short", 10, None, Strategy::Abbreviate, AbbrevPosition::Right), "short");
    }

    #[test]
    fn non_positive_target_is_empty() {
        assert_eq!(reduce_width("anything", 0, None, Strategy::Abbreviate, AbbrevPosition::Right), "");
        assert_eq!(reduce_width("anything", -5, None, Strategy::Abbreviate, AbbrevPosition::Right), "");
    }

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(reduce_width("", 10, None, Strategy::Abbreviate, AbbrevPosition::Right), "");
    }

    #[test]
    fn identity_at_exact_width() {
        let text = "very_long_filename.txt";
        let w = display_width(text) as i64;
        assert_eq!(
            reduce_width(text, w, None, Strategy::Abbreviate, AbbrevPosition::Right),
            text
        );
    }

    #[test]
    fn idempotent_within_bound() {
        let text = "a_rather_long_identifier_name_here";
        let once = reduce_width(text, 12, None, Strategy::Abbreviate, AbbrevPosition::Right);
        let twice = reduce_width(&once, 12, None, Strategy::Abbreviate, AbbrevPosition::Right);
        assert!(display_width(&twice) <= 12);
    }

    #[test]
    fn nfc_nfd_produce_equal_output() {
        let nfc = "café";
        let nfd = "cafe\u{0301}";
        assert_eq!(display_width(nfc), display_width(nfd));
        let out_nfc = reduce_width(nfc, 3, None, Strategy::Abbreviate, AbbrevPosition::Right);
        let out_nfd = reduce_width(nfd, 3, None, Strategy::Abbreviate, AbbrevPosition::Right);
        assert_eq!(out_nfc, out_nfd);
    }

    #[test]
    fn target_width_one_returns_small_result() {
        let out = reduce_width("hello world", 1, None, Strategy::Abbreviate, AbbrevPosition::Right);
        assert!(display_width(&out) <= 1);
    }

    #[test]
    fn scenario_s6_rename_dialog_regions() {
        let text = "Rename 'aaaa/bbbb/cccc.txt' to: new_name";
        let chars: Vec<char> = text.chars().collect();
        let path_start = text.find("aaaa").unwrap();
        let path_end = text.find(".txt").unwrap() + 4;
        let path_region = ShorteningRegion::new(
            chars[..path_start].len(),
            chars[..path_end].len(),
            1,
            Strategy::AllOrNothing,
        );
        let name_start = text.find("new_name").unwrap();
        let name_region = ShorteningRegion::new(
            text[..name_start].chars().count(),
            text.chars().count(),
            0,
            Strategy::Abbreviate,
        )
        .with_position(AbbrevPosition::Middle);

        let out = reduce_width(
            text,
            20,
            Some(&[path_region, name_region]),
            Strategy::Abbreviate,
            AbbrevPosition::Right,
        );
        assert!(display_width(&out) <= 20);
        assert!(!out.contains("aaaa/bbbb/cccc.txt"));
    }

    #[test]
    fn abbreviate_path_removes_inner_directories() {
        let out = abbreviate_path("/home/user/documents/file.txt", 20);
        assert!(display_width(&out) <= 20);
        assert!(out.ends_with("file.txt"));
    }
}
