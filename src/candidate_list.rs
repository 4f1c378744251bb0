//! Completion candidate popup overlaid next to a text edit field
//! (spec.md §4.E).

use crate::renderer::{ColorPair, Renderer, TextAttribute};
use crate::width::{display_width, reduce_width, AbbrevPosition, Strategy};

const BORDER: char = '│';
const HORIZONTAL_BORDER: char = '─';
const TOP_LEFT: char = '┌';
const TOP_RIGHT: char = '┐';
const BOTTOM_LEFT: char = '└';
const BOTTOM_RIGHT: char = '┘';

/// Bordered completion popup positioned above or below a text edit field,
/// horizontally aligned with where the completion began.
pub struct CandidateListOverlay {
    candidates: Vec<String>,
    visible: bool,

    text_edit_y: u16,
    completion_start_x: u16,
    show_above: bool,

    max_visible_candidates: usize,

    focused_index: Option<usize>,
    scroll_offset: usize,

    normal_color: ColorPair,
    normal_attrs: TextAttribute,
    focused_color: ColorPair,
}

impl CandidateListOverlay {
    pub fn new(normal_color: ColorPair, focused_color: ColorPair) -> Self {
        Self {
            candidates: Vec::new(),
            visible: false,
            text_edit_y: 0,
            completion_start_x: 0,
            show_above: false,
            max_visible_candidates: 10,
            focused_index: None,
            scroll_offset: 0,
            normal_color,
            normal_attrs: TextAttribute::NORMAL,
            focused_color,
        }
    }

    /// Replace the candidate list and reposition it. Focus and scroll reset.
    pub fn set_candidates(
        &mut self,
        candidates: Vec<String>,
        text_edit_y: u16,
        completion_start_x: u16,
        show_above: bool,
    ) {
        self.candidates = candidates;
        self.text_edit_y = text_edit_y;
        self.completion_start_x = completion_start_x;
        self.show_above = show_above;
        self.focused_index = None;
        self.scroll_offset = 0;
    }

    pub fn show(&mut self) {
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn has_focus(&self) -> bool {
        self.focused_index.is_some()
    }

    pub fn clear_focus(&mut self) {
        self.focused_index = None;
    }

    pub fn focused_candidate(&self) -> Option<&str> {
        self.focused_index
            .and_then(|i| self.candidates.get(i))
            .map(String::as_str)
    }

    /// Move focus to the next candidate, wrapping from last to first.
    /// Activates focus on the first candidate if nothing is focused yet.
    pub fn move_focus_down(&mut self) {
        if self.candidates.is_empty() {
            return;
        }
        self.focused_index = Some(match self.focused_index {
            None => 0,
            Some(i) if i + 1 >= self.candidates.len() => 0,
            Some(i) => i + 1,
        });
        self.ensure_focused_visible();
    }

    /// Move focus to the previous candidate, wrapping from first to last.
    /// Activates focus on the last candidate if nothing is focused yet.
    pub fn move_focus_up(&mut self) {
        if self.candidates.is_empty() {
            return;
        }
        self.focused_index = Some(match self.focused_index {
            None => self.candidates.len() - 1,
            Some(0) => self.candidates.len() - 1,
            Some(i) => i - 1,
        });
        self.ensure_focused_visible();
    }

    fn ensure_focused_visible(&mut self) {
        let Some(focused) = self.focused_index else {
            return;
        };
        if self.candidates.is_empty() {
            return;
        }
        let visible_count = self.candidates.len().min(self.max_visible_candidates);
        let first_visible = self.scroll_offset;
        let last_visible = self.scroll_offset + visible_count - 1;

        if focused < first_visible {
            self.scroll_offset = focused;
        } else if focused > last_visible {
            self.scroll_offset = focused + 1 - visible_count;
        }

        let max_scroll = self.candidates.len().saturating_sub(visible_count);
        self.scroll_offset = self.scroll_offset.min(max_scroll);
    }

    pub fn render(&self, renderer: &mut dyn Renderer) {
        if !self.visible || self.candidates.is_empty() {
            return;
        }

        let (rows, cols) = renderer.dimensions();
        let num_candidates = self.candidates.len().min(self.max_visible_candidates);
        let overlay_height = (num_candidates + 2) as u16;

        let max_candidate_width = self.candidates[..num_candidates]
            .iter()
            .map(|c| display_width(c))
            .max()
            .unwrap_or(0) as u16;
        let mut overlay_width = max_candidate_width + 4;
        overlay_width = overlay_width.min(cols.saturating_sub(self.completion_start_x));
        if overlay_width < 4 {
            return;
        }

        let overlay_y = if self.show_above {
            self.text_edit_y.saturating_sub(overlay_height)
        } else {
            let below = self.text_edit_y + 1;
            if below + overlay_height > rows {
                rows.saturating_sub(overlay_height)
            } else {
                below
            }
        };

        let mut overlay_x = self.completion_start_x.saturating_sub(2);
        if overlay_x + overlay_width > cols {
            overlay_x = cols.saturating_sub(overlay_width);
        }

        let show_scrollbar = self.candidates.len() > self.max_visible_candidates;
        let scrollbar_width: u16 = if show_scrollbar { 1 } else { 0 };
        let available_width = overlay_width.saturating_sub(4 + scrollbar_width);

        if overlay_y < rows {
            let top_border = format!(
                "{TOP_LEFT}{}{TOP_RIGHT}",
                HORIZONTAL_BORDER.to_string().repeat((overlay_width - 2) as usize)
            );
            self.safe_draw(renderer, overlay_y, overlay_x, &top_border, self.normal_color, self.normal_attrs);
        }

        for i in 0..num_candidates {
            let candidate_y = overlay_y + 1 + i as u16;
            if candidate_y >= rows {
                continue;
            }
            let candidate_index = self.scroll_offset + i;
            if candidate_index >= self.candidates.len() {
                break;
            }

            let raw = &self.candidates[candidate_index];
            let shown = if display_width(raw) as u16 > available_width {
                reduce_width(raw, available_width as i64, None, Strategy::Truncate, AbbrevPosition::Right)
            } else {
                raw.clone()
            };
            let pad_width = available_width.saturating_sub(display_width(&shown) as u16);
            let padding = " ".repeat(pad_width as usize);

            let (candidate_color, candidate_attrs) = if self.focused_index == Some(candidate_index) {
                (self.focused_color, TextAttribute::NORMAL)
            } else {
                (self.normal_color, self.normal_attrs)
            };

            self.safe_draw(renderer, candidate_y, overlay_x, &BORDER.to_string(), self.normal_color, self.normal_attrs);
            self.safe_draw(renderer, candidate_y, overlay_x + 1, " ", self.normal_color, self.normal_attrs);
            self.safe_draw(
                renderer,
                candidate_y,
                overlay_x + 2,
                &format!("{shown}{padding}"),
                candidate_color,
                candidate_attrs,
            );

            let right_pad = if show_scrollbar { "  " } else { " " };
            self.safe_draw(
                renderer,
                candidate_y,
                overlay_x + 2 + available_width,
                right_pad,
                self.normal_color,
                self.normal_attrs,
            );
            self.safe_draw(
                renderer,
                candidate_y,
                overlay_x + overlay_width - 1,
                &BORDER.to_string(),
                self.normal_color,
                self.normal_attrs,
            );
        }

        if show_scrollbar {
            draw_scrollbar(
                renderer,
                overlay_y + 1,
                overlay_x + overlay_width - 2,
                num_candidates as u16,
                self.candidates.len(),
                self.scroll_offset,
                self.normal_color,
            );
        }

        let bottom_y = overlay_y + 1 + num_candidates as u16;
        if bottom_y < rows {
            let bottom_border = format!(
                "{BOTTOM_LEFT}{}{BOTTOM_RIGHT}",
                HORIZONTAL_BORDER.to_string().repeat((overlay_width - 2) as usize)
            );
            self.safe_draw(renderer, bottom_y, overlay_x, &bottom_border, self.normal_color, self.normal_attrs);
        }
    }

    fn safe_draw(
        &self,
        renderer: &mut dyn Renderer,
        y: u16,
        x: u16,
        text: &str,
        color_pair: ColorPair,
        attributes: TextAttribute,
    ) {
        let (rows, cols) = renderer.dimensions();
        if y >= rows || x >= cols {
            return;
        }
        let max_width = (cols - x) as i64;
        let text = if display_width(text) as i64 > max_width {
            reduce_width(text, max_width, None, Strategy::Truncate, AbbrevPosition::Right)
        } else {
            text.to_string()
        };
        renderer.draw_text(y, x, &text, color_pair, attributes);
    }
}

/// Vertical scrollbar thumb over `total` items, `visible` of which fit in
/// `height` rows starting at `offset`.
fn draw_scrollbar(
    renderer: &mut dyn Renderer,
    y: u16,
    x: u16,
    height: u16,
    total: usize,
    offset: usize,
    color_pair: ColorPair,
) {
    if height == 0 || total == 0 {
        return;
    }
    let thumb_size = ((height as usize * height as usize) / total.max(1)).clamp(1, height as usize) as u16;
    let max_offset = total.saturating_sub(height as usize).max(1);
    let thumb_start = ((offset * (height.saturating_sub(thumb_size)) as usize) / max_offset) as u16;

    for row in 0..height {
        let ch = if row >= thumb_start && row < thumb_start + thumb_size {
            '█'
        } else {
            '░'
        };
        renderer.draw_text(y + row, x, &ch.to_string(), color_pair, TextAttribute::NORMAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct FakeRenderer {
        rows: u16,
        cols: u16,
        writes: Vec<(u16, u16, String)>,
    }

    impl Renderer for FakeRenderer {
        fn dimensions(&self) -> (u16, u16) {
            (self.rows, self.cols)
        }
        fn clear(&mut self) {
            self.writes.clear();
        }
        fn draw_text(&mut self, y: u16, x: u16, text: &str, _c: ColorPair, _a: TextAttribute) {
            self.writes.push((y, x, text.to_string()));
        }
        fn draw_hline(&mut self, _y: u16, _x: u16, _ch: char, _count: u16, _c: ColorPair) {}
        fn refresh(&mut self) -> io::Result<()> {
            Ok(())
        }
        fn init_color_pair(&mut self, _id: ColorPair, _fg: (u8, u8, u8), _bg: (u8, u8, u8)) {}
    }

    fn candidates(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("candidate-{i}")).collect()
    }

    #[test]
    fn focus_down_wraps_from_last_to_first() {
        let mut overlay = CandidateListOverlay::new(1, 2);
        overlay.set_candidates(candidates(3), 5, 0, false);
        overlay.move_focus_down();
        overlay.move_focus_down();
        overlay.move_focus_down();
        assert_eq!(overlay.focused_candidate(), Some("candidate-0"));
    }

    #[test]
    fn focus_up_wraps_from_first_to_last() {
        let mut overlay = CandidateListOverlay::new(1, 2);
        overlay.set_candidates(candidates(3), 5, 0, false);
        overlay.move_focus_up();
        assert_eq!(overlay.focused_candidate(), Some("candidate-2"));
    }

    #[test]
    fn auto_scroll_keeps_focused_candidate_visible() {
        let mut overlay = CandidateListOverlay::new(1, 2);
        overlay.set_candidates(candidates(15), 5, 0, false);
        for _ in 0..12 {
            overlay.move_focus_down();
        }
        assert_eq!(overlay.focused_index, Some(12));
        assert!(overlay.scroll_offset <= 12);
        assert!(overlay.scroll_offset + overlay.max_visible_candidates > 12);
    }

    #[test]
    fn hidden_overlay_draws_nothing() {
        let mut overlay = CandidateListOverlay::new(1, 2);
        overlay.set_candidates(candidates(3), 5, 0, false);
        let mut renderer = FakeRenderer { rows: 24, cols: 80, writes: Vec::new() };
        overlay.render(&mut renderer);
        assert!(renderer.writes.is_empty());
    }

    #[test]
    fn visible_overlay_draws_borders_and_candidates() {
        let mut overlay = CandidateListOverlay::new(1, 2);
        overlay.set_candidates(candidates(3), 5, 10, false);
        overlay.show();
        let mut renderer = FakeRenderer { rows: 24, cols: 80, writes: Vec::new() };
        overlay.render(&mut renderer);
        assert!(!renderer.writes.is_empty());
    }

    #[test]
    fn clear_focus_removes_focus() {
        let mut overlay = CandidateListOverlay::new(1, 2);
        overlay.set_candidates(candidates(3), 5, 0, false);
        overlay.move_focus_down();
        assert!(overlay.has_focus());
        overlay.clear_focus();
        assert!(!overlay.has_focus());
    }
}
