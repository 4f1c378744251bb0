//! The three shortening strategies plus filepath mode (spec.md §4.A).

use super::{display_width, ShorteningRegion, ELLIPSIS};

/// Which portion of a region's text to keep when abbreviating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbbrevPosition {
    Left,
    Middle,
    Right,
}

/// Shortening strategy applied to a single region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    AllOrNothing,
    Truncate,
    Abbreviate,
}

/// Apply `region`'s strategy (or filepath mode, if set) to `text`, aiming
/// for `target_width` display columns. `region.start`/`region.end` index
/// into `text`'s character sequence.
pub fn apply(text: &str, target_width: usize, region: &ShorteningRegion) -> String {
    if region.filepath_mode {
        return filepath_shorten(text, target_width, region);
    }
    match region.strategy {
        Strategy::AllOrNothing => all_or_nothing(text, target_width, region),
        Strategy::Truncate => truncate(text, target_width, region),
        Strategy::Abbreviate => abbreviate(text, target_width, region),
    }
}

fn split_region(text: &str, region: &ShorteningRegion) -> (String, String, String) {
    let chars: Vec<char> = text.chars().collect();
    let before: String = chars[..region.start.min(chars.len())].iter().collect();
    let region_text: String = chars[region.start.min(chars.len())..region.end.min(chars.len())]
        .iter()
        .collect();
    let after: String = chars[region.end.min(chars.len())..].iter().collect();
    (before, region_text, after)
}

fn all_or_nothing(text: &str, target_width: usize, region: &ShorteningRegion) -> String {
    if display_width(text) <= target_width {
        return text.to_string();
    }
    let (before, _region_text, after) = split_region(text, region);
    format!("{before}{after}")
}

fn truncate(text: &str, target_width: usize, region: &ShorteningRegion) -> String {
    if display_width(text) <= target_width {
        return text.to_string();
    }
    let (before, region_text, after) = split_region(text, region);
    let before_width = display_width(&before);
    let after_width = display_width(&after);
    let available = target_width as i64 - before_width as i64 - after_width as i64;

    if available <= 0 {
        return format!("{before}{after}");
    }

    let mut region_chars: Vec<char> = region_text.chars().collect();
    let current_width = display_width(text);
    let mut width_to_reduce = current_width as i64 - target_width as i64;

    while !region_chars.is_empty() && width_to_reduce > 0 {
        let removed = region_chars.pop().unwrap();
        width_to_reduce -= unicode_width::UnicodeWidthChar::width(removed).unwrap_or(0) as i64;
    }

    let region_text: String = region_chars.iter().collect();
    format!("{before}{region_text}{after}")
}

fn abbreviate(text: &str, target_width: usize, region: &ShorteningRegion) -> String {
    if display_width(text) <= target_width {
        return text.to_string();
    }
    let (before, region_text, after) = split_region(text, region);
    let before_width = display_width(&before);
    let after_width = display_width(&after);
    let ellipsis_width = display_width(ELLIPSIS);
    let available = target_width as i64 - before_width as i64 - after_width as i64;

    if available == 1 {
        if ellipsis_width <= 1 {
            return format!("{before}{ELLIPSIS}{after}");
        }
        if let Some(first) = region_text.chars().next() {
            if unicode_width::UnicodeWidthChar::width(first).unwrap_or(0) <= 1 {
                return format!("{before}{first}{after}");
            }
        }
        return format!("{before}{ELLIPSIS}{after}");
    }

    if available < ellipsis_width as i64 {
        return format!("{before}{ELLIPSIS}{after}");
    }

    let content_width = (available - ellipsis_width as i64) as usize;
    let abbreviated = match region.abbrev_position {
        AbbrevPosition::Left => abbreviate_left(&region_text, content_width),
        AbbrevPosition::Middle => abbreviate_middle_text(&region_text, content_width),
        AbbrevPosition::Right => abbreviate_right(&region_text, content_width),
    };

    format!("{before}{abbreviated}{after}")
}

fn abbreviate_left(text: &str, content_width: usize) -> String {
    if content_width == 0 {
        return ELLIPSIS.to_string();
    }
    let mut preserved = String::new();
    let mut current_width = 0usize;
    for ch in text.chars().rev() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if current_width + w <= content_width {
            preserved.insert(0, ch);
            current_width += w;
        } else {
            break;
        }
    }
    format!("{ELLIPSIS}{preserved}")
}

fn abbreviate_right(text: &str, content_width: usize) -> String {
    if content_width == 0 {
        return ELLIPSIS.to_string();
    }
    let mut preserved = String::new();
    let mut current_width = 0usize;
    for ch in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if current_width + w <= content_width {
            preserved.push(ch);
            current_width += w;
        } else {
            break;
        }
    }
    format!("{preserved}{ELLIPSIS}")
}

fn abbreviate_middle_text(text: &str, content_width: usize) -> String {
    if content_width == 0 {
        return ELLIPSIS.to_string();
    }
    let left_width = content_width.div_ceil(2);
    let right_width = content_width / 2;

    let mut left = String::new();
    let mut left_width_used = 0usize;
    for ch in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if left_width_used + w <= left_width {
            left.push(ch);
            left_width_used += w;
        } else {
            break;
        }
    }

    let mut right = String::new();
    let mut right_width_used = 0usize;
    for ch in text.chars().rev() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if right_width_used + w <= right_width {
            right.insert(0, ch);
            right_width_used += w;
        } else {
            break;
        }
    }

    format!("{left}{ELLIPSIS}{right}")
}

/// `filepath_mode`: split on `/` (preferring) or `\`, drop whole directory
/// levels from the middle outward before ever abbreviating the filename.
fn filepath_shorten(text: &str, target_width: usize, region: &ShorteningRegion) -> String {
    if display_width(text) <= target_width {
        return text.to_string();
    }
    let (before, region_text, after) = split_region(text, region);
    let before_width = display_width(&before);
    let after_width = display_width(&after);
    let ellipsis_width = display_width(ELLIPSIS);
    let available = target_width as i64 - before_width as i64 - after_width as i64;

    if available <= ellipsis_width as i64 {
        return format!("{before}{ELLIPSIS}{after}");
    }
    let available = available as usize;

    let separator = if region_text.contains('/') {
        '/'
    } else if region_text.contains('\\') {
        '\\'
    } else {
        let region_len = region_text.chars().count();
        let temp = ShorteningRegion::new(0, region_len, region.priority, Strategy::Abbreviate)
            .with_position(AbbrevPosition::Middle);
        let abbreviated = abbreviate(&region_text, available, &temp);
        return format!("{before}{abbreviated}{after}");
    };

    let components: Vec<&str> = region_text.split(separator).collect();
    let (directories, filename): (&[&str], &str) = if components.len() > 1 {
        (&components[..components.len() - 1], components[components.len() - 1])
    } else {
        (&[], components[0])
    };

    if directories.is_empty() {
        let filename_len = filename.chars().count();
        let temp = ShorteningRegion::new(0, filename_len, region.priority, Strategy::Abbreviate)
            .with_position(AbbrevPosition::Middle);
        let abbreviated = abbreviate(filename, available, &temp);
        return format!("{before}{abbreviated}{after}");
    }

    let full_path = format!("{}{separator}{filename}", directories.join(&separator.to_string()));
    if display_width(&full_path) <= available {
        return format!("{before}{full_path}{after}");
    }

    let num_dirs = directories.len();
    for keep_from_start in (1..num_dirs).rev() {
        for keep_from_end in (1..=num_dirs - keep_from_start).rev() {
            if keep_from_start + keep_from_end >= num_dirs {
                continue;
            }
            let mut parts: Vec<&str> = directories[..keep_from_start].to_vec();
            parts.push(ELLIPSIS);
            parts.extend_from_slice(&directories[num_dirs - keep_from_end..]);
            parts.push(filename);
            let candidate = parts.join(&separator.to_string());
            if display_width(&candidate) <= available {
                return format!("{before}{candidate}{after}");
            }
        }
    }

    if let Some(first_dir) = directories.first() {
        let candidate = format!("{first_dir}{separator}{ELLIPSIS}{separator}{filename}");
        if display_width(&candidate) <= available {
            return format!("{before}{candidate}{after}");
        }
    }

    let candidate = format!("{ELLIPSIS}{separator}{filename}");
    if display_width(&candidate) <= available {
        return format!("{before}{candidate}{after}");
    }

    let separator_width = display_width(&separator.to_string());
    let available_for_filename = available as i64 - ellipsis_width as i64 - separator_width as i64;
    if available_for_filename <= 0 {
        return format!("{before}{ELLIPSIS}{after}");
    }

    let filename_len = filename.chars().count();
    let temp = ShorteningRegion::new(0, filename_len, region.priority, Strategy::Abbreviate)
        .with_position(AbbrevPosition::Middle);
    let abbreviated_filename = abbreviate(filename, available_for_filename as usize, &temp);
    format!("{before}{ELLIPSIS}{separator}{abbreviated_filename}{after}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_has_no_ellipsis() {
        let region = ShorteningRegion::new(0, 10, 1, Strategy::Truncate);
        let out = truncate("0123456789", 5, &region);
        assert!(!out.contains('…'));
        assert_eq!(display_width(&out), 5);
    }

    #[test]
    fn all_or_nothing_drops_region_entirely() {
        let region = ShorteningRegion::new(0, 4, 1, Strategy::AllOrNothing);
        let out = all_or_nothing("aaaa_kept", 6, &region);
        assert_eq!(out, "_kept");
    }

    #[test]
    fn abbreviate_middle_biases_odd_width_left() {
        let region = ShorteningRegion::new(0, 10, 1, Strategy::Abbreviate).with_position(AbbrevPosition::Middle);
        let out = abbreviate("abcdefghij", 7, &region);
        assert_eq!(display_width(&out), 7);
        assert!(out.contains('…'));
    }

    #[test]
    fn filepath_mode_replaces_inner_directory() {
        let region = ShorteningRegion::new(0, 23, 1, Strategy::Abbreviate).with_filepath_mode(true);
        let out = filepath_shorten("aaaa/bbbb/cccc/dddd.txt", 15, &region);
        assert!(out.ends_with("dddd.txt"));
        assert!(out.contains('…'));
    }
}
