//! The `Renderer` interface (spec.md §4.B) — the core's sole dependency on
//! a display backend. Concrete backends (curses-style terminal, desktop
//! surfaces) live outside this crate; only a `crossterm`/`ratatui` demo
//! backend is provided here to exercise the layer stack end to end.

use std::io;

bitflags::bitflags! {
    /// Bit-flag text attributes (spec.md §4.B).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TextAttribute: u8 {
        const NORMAL    = 0b0000_0000;
        const BOLD      = 0b0000_0001;
        const REVERSE   = 0b0000_0010;
        const DIM       = 0b0000_0100;
        const UNDERLINE = 0b0000_1000;
        const ITALIC    = 0b0001_0000;
    }
}

/// Index into a table of initialized color pairs. `0` is the default pair.
pub type ColorPair = u16;

/// Abstract character-grid display surface.
///
/// Every coordinate is a cell coordinate `(row, col)`; the core never
/// assumes proportional fonts. Drawing past the right edge is the core's
/// responsibility to clip, not the backend's (spec.md §4.B).
pub trait Renderer {
    /// `(rows, cols)`.
    fn dimensions(&self) -> (u16, u16);

    fn clear(&mut self);

    fn draw_text(&mut self, y: u16, x: u16, text: &str, color_pair: ColorPair, attributes: TextAttribute);

    fn draw_hline(&mut self, y: u16, x: u16, ch: char, count: u16, color_pair: ColorPair);

    fn refresh(&mut self) -> io::Result<()>;

    fn init_color_pair(&mut self, id: ColorPair, fg_rgb: (u8, u8, u8), bg_rgb: (u8, u8, u8));

    // --- optional capabilities; default to inert/no-op ---

    fn set_cursor_visibility(&mut self, _visible: bool) {}

    fn set_caret_position(&mut self, _y: u16, _x: u16) {}

    fn supports_clipboard(&self) -> bool {
        false
    }

    fn get_clipboard_text(&self) -> Option<String> {
        None
    }

    fn supports_mouse(&self) -> bool {
        false
    }

    fn enable_mouse_events(&mut self, _enabled: bool) {}

    fn supports_drag_and_drop(&self) -> bool {
        false
    }
}

/// Draw `text` at `(y, x)`, clipping to the renderer's right edge so a
/// backend never has to reason about overflow (spec.md §4.B).
pub fn draw_text_clipped(
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
    let clipped = crate::width::reduce_width(
        text,
        max_width,
        None,
        crate::width::Strategy::Truncate,
        crate::width::AbbrevPosition::Right,
    );
    let clipped = if clipped.is_empty() && max_width > 0 {
        text.to_string()
    } else {
        clipped
    };
    renderer.draw_text(y, x, &clipped, color_pair, attributes);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeRenderer {
        rows: u16,
        cols: u16,
        pub writes: Vec<(u16, u16, String)>,
    }

    impl Renderer for FakeRenderer {
        fn dimensions(&self) -> (u16, u16) {
            (self.rows, self.cols)
        }
        fn clear(&mut self) {
            self.writes.clear();
        }
        fn draw_text(&mut self, y: u16, x: u16, text: &str, _color_pair: ColorPair, _attributes: TextAttribute) {
            self.writes.push((y, x, text.to_string()));
        }
        fn draw_hline(&mut self, _y: u16, _x: u16, _ch: char, _count: u16, _color_pair: ColorPair) {}
        fn refresh(&mut self) -> io::Result<()> {
            Ok(())
        }
        fn init_color_pair(&mut self, _id: ColorPair, _fg_rgb: (u8, u8, u8), _bg_rgb: (u8, u8, u8)) {}
    }

    #[test]
    fn draw_past_right_edge_is_silently_truncated() {
        let mut renderer = FakeRenderer { rows: 10, cols: 10, writes: Vec::new() };
        draw_text_clipped(&mut renderer, 0, 5, "0123456789", 0, TextAttribute::NORMAL);
        assert_eq!(renderer.writes.len(), 1);
        assert!(renderer.writes[0].2.chars().count() <= 5);
    }

    #[test]
    fn draw_off_screen_row_is_skipped() {
        let mut renderer = FakeRenderer { rows: 10, cols: 10, writes: Vec::new() };
        draw_text_clipped(&mut renderer, 20, 0, "hidden", 0, TextAttribute::NORMAL);
        assert!(renderer.writes.is_empty());
    }
}
