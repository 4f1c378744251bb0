//! Crossterm/ratatui demo backend for the `Renderer` trait, plus translation
//! from crossterm's event types into this crate's tagged input events
//! (spec.md §4.B, §4.C). Concrete production backends live outside this
//! crate; this one exists so `main.rs` can drive the layer stack with a
//! real terminal.

use std::collections::HashMap;
use std::io;

use crossterm::event::{
    self, KeyCode as CtKeyCode, KeyEvent as CtKeyEvent, KeyEventKind, KeyModifiers,
    MouseEvent as CtMouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::Widget;
use ratatui::Terminal;

use crate::input::{CharEvent, KeyCode, KeyEvent, ModifierSet, MouseButton, MouseEvent, MouseEventType, SystemEvent, SystemEventKind};
use crate::renderer::{ColorPair, Renderer, TextAttribute};

/// RAII guard for raw mode + the alternate screen, mirroring the teacher's
/// `TuiApp::run` setup/teardown pair so a panic mid-render still restores
/// the terminal.
pub struct TerminalGuard;

impl TerminalGuard {
    pub fn enter() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

fn attribute_to_modifier(attr: TextAttribute) -> Modifier {
    let mut modifier = Modifier::empty();
    if attr.contains(TextAttribute::BOLD) {
        modifier |= Modifier::BOLD;
    }
    if attr.contains(TextAttribute::REVERSE) {
        modifier |= Modifier::REVERSED;
    }
    if attr.contains(TextAttribute::DIM) {
        modifier |= Modifier::DIM;
    }
    if attr.contains(TextAttribute::UNDERLINE) {
        modifier |= Modifier::UNDERLINED;
    }
    if attr.contains(TextAttribute::ITALIC) {
        modifier |= Modifier::ITALIC;
    }
    modifier
}

/// Mirrors a held `Buffer` into whatever region `ratatui::Frame` gives us,
/// clipped to the smaller of the two areas.
struct BufferMirror<'a>(&'a Buffer);

impl<'a> Widget for BufferMirror<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let width = area.width.min(self.0.area.width);
        let height = area.height.min(self.0.area.height);
        for y in 0..height {
            for x in 0..width {
                *buf.get_mut(area.x + x, area.y + y) = self.0.get(x, y).clone();
            }
        }
    }
}

/// Renderer backend writing into an in-memory `Buffer` that gets mirrored
/// onto the real terminal frame on `refresh` (spec.md §4.B).
pub struct RatatuiRenderer {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    buffer: Buffer,
    colors: HashMap<ColorPair, (Color, Color)>,
    mouse_enabled: bool,
}

impl RatatuiRenderer {
    pub fn new() -> io::Result<Self> {
        let backend = CrosstermBackend::new(io::stdout());
        let terminal = Terminal::new(backend)?;
        let size = terminal.size()?;
        let area = Rect::new(0, 0, size.width, size.height);
        Ok(Self {
            terminal,
            buffer: Buffer::empty(area),
            colors: HashMap::new(),
            mouse_enabled: false,
        })
    }

    fn style_for(&self, color_pair: ColorPair, attributes: TextAttribute) -> Style {
        let mut style = Style::default().add_modifier(attribute_to_modifier(attributes));
        if let Some((fg, bg)) = self.colors.get(&color_pair) {
            style = style.fg(*fg).bg(*bg);
        }
        style
    }

    /// Re-size the backing buffer to the terminal's current dimensions;
    /// called on a `RESIZE` system event before the next render.
    pub fn sync_size(&mut self) -> io::Result<()> {
        let size = self.terminal.size()?;
        let area = Rect::new(0, 0, size.width, size.height);
        if area != self.buffer.area {
            self.buffer = Buffer::empty(area);
        }
        Ok(())
    }
}

impl Renderer for RatatuiRenderer {
    fn dimensions(&self) -> (u16, u16) {
        (self.buffer.area.height, self.buffer.area.width)
    }

    fn clear(&mut self) {
        self.buffer.reset();
    }

    fn draw_text(&mut self, y: u16, x: u16, text: &str, color_pair: ColorPair, attributes: TextAttribute) {
        if y >= self.buffer.area.height || x >= self.buffer.area.width {
            return;
        }
        let style = self.style_for(color_pair, attributes);
        self.buffer.set_string(x, y, text, style);
    }

    fn draw_hline(&mut self, y: u16, x: u16, ch: char, count: u16, color_pair: ColorPair) {
        if y >= self.buffer.area.height {
            return;
        }
        let style = self.style_for(color_pair, TextAttribute::NORMAL);
        let line: String = std::iter::repeat(ch).take(count as usize).collect();
        self.buffer.set_string(x, y, line, style);
    }

    fn refresh(&mut self) -> io::Result<()> {
        let buffer = self.buffer.clone();
        self.terminal.draw(|frame| {
            let area = frame.area();
            frame.render_widget(BufferMirror(&buffer), area);
        })?;
        Ok(())
    }

    fn init_color_pair(&mut self, id: ColorPair, fg_rgb: (u8, u8, u8), bg_rgb: (u8, u8, u8)) {
        self.colors.insert(
            id,
            (Color::Rgb(fg_rgb.0, fg_rgb.1, fg_rgb.2), Color::Rgb(bg_rgb.0, bg_rgb.1, bg_rgb.2)),
        );
    }

    fn set_cursor_visibility(&mut self, visible: bool) {
        let _ = if visible { self.terminal.show_cursor() } else { self.terminal.hide_cursor() };
    }

    fn set_caret_position(&mut self, y: u16, x: u16) {
        let _ = self.terminal.set_cursor_position((x, y));
    }

    fn supports_mouse(&self) -> bool {
        true
    }

    fn enable_mouse_events(&mut self, enabled: bool) {
        use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
        let result = if enabled {
            execute!(io::stdout(), EnableMouseCapture)
        } else {
            execute!(io::stdout(), DisableMouseCapture)
        };
        if result.is_ok() {
            self.mouse_enabled = enabled;
        }
    }
}

fn translate_modifiers(modifiers: KeyModifiers) -> ModifierSet {
    let mut out = ModifierSet::empty();
    if modifiers.contains(KeyModifiers::SHIFT) {
        out |= ModifierSet::SHIFT;
    }
    if modifiers.contains(KeyModifiers::CONTROL) {
        out |= ModifierSet::CONTROL;
    }
    if modifiers.contains(KeyModifiers::ALT) {
        out |= ModifierSet::ALT;
    }
    if modifiers.contains(KeyModifiers::SUPER) {
        out |= ModifierSet::COMMAND;
    }
    out
}

/// Translate a crossterm key event into this crate's tagged `KeyEvent`,
/// or `None` for key-release/repeat noise on backends that report it.
pub fn translate_key_event(event: CtKeyEvent) -> Option<KeyEvent> {
    if event.kind == KeyEventKind::Release {
        return None;
    }
    let modifiers = translate_modifiers(event.modifiers);
    let key_code = match event.code {
        CtKeyCode::Enter => KeyCode::Enter,
        CtKeyCode::Esc => KeyCode::Escape,
        CtKeyCode::Tab => KeyCode::Tab,
        CtKeyCode::Up => KeyCode::Up,
        CtKeyCode::Down => KeyCode::Down,
        CtKeyCode::Left => KeyCode::Left,
        CtKeyCode::Right => KeyCode::Right,
        CtKeyCode::Home => KeyCode::Home,
        CtKeyCode::End => KeyCode::End,
        CtKeyCode::PageUp => KeyCode::PageUp,
        CtKeyCode::PageDown => KeyCode::PageDown,
        CtKeyCode::Backspace => KeyCode::Backspace,
        CtKeyCode::Delete => KeyCode::Delete,
        CtKeyCode::F(n) => KeyCode::F(n),
        CtKeyCode::Char(c) => KeyCode::Char(c as u32),
        _ => return None,
    };
    let char = match event.code {
        CtKeyCode::Char(c) => Some(c.to_string()),
        _ => None,
    };
    Some(KeyEvent { key_code, modifiers, char })
}

pub fn translate_mouse_event(event: CtMouseEvent) -> Option<MouseEvent> {
    let (event_type, button) = match event.kind {
        MouseEventKind::Down(button) => (MouseEventType::ButtonDown, translate_mouse_button(button)),
        MouseEventKind::Up(button) => (MouseEventType::ButtonUp, translate_mouse_button(button)),
        MouseEventKind::Drag(button) => (MouseEventType::Move, translate_mouse_button(button)),
        MouseEventKind::Moved => (MouseEventType::Move, MouseButton::None),
        MouseEventKind::ScrollDown => (MouseEventType::Wheel, MouseButton::None),
        MouseEventKind::ScrollUp => (MouseEventType::Wheel, MouseButton::None),
        MouseEventKind::ScrollLeft | MouseEventKind::ScrollRight => (MouseEventType::Wheel, MouseButton::None),
    };
    let scroll_delta_y = match event.kind {
        MouseEventKind::ScrollUp => 1.0,
        MouseEventKind::ScrollDown => -1.0,
        _ => 0.0,
    };
    let scroll_delta_x = match event.kind {
        MouseEventKind::ScrollLeft => -1.0,
        MouseEventKind::ScrollRight => 1.0,
        _ => 0.0,
    };
    Some(MouseEvent {
        event_type,
        column: event.column as i32,
        row: event.row as i32,
        sub_cell_x: 0.0,
        sub_cell_y: 0.0,
        button,
        scroll_delta_x,
        scroll_delta_y,
        modifiers: translate_modifiers(event.modifiers),
    })
}

fn translate_mouse_button(button: event::MouseButton) -> MouseButton {
    match button {
        event::MouseButton::Left => MouseButton::Left,
        event::MouseButton::Right => MouseButton::Right,
        event::MouseButton::Middle => MouseButton::Middle,
    }
}

pub fn resize_system_event() -> SystemEvent {
    SystemEvent { kind: SystemEventKind::Resize }
}

/// Build a `CharEvent` out of a plain printable character, for IME/paste
/// style composed input (spec.md §4.C). The demo backend never composes
/// multi-codepoint input itself; this is exposed for completeness.
pub fn char_event(text: impl Into<String>) -> CharEvent {
    CharEvent { char: text.into() }
}
