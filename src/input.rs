//! The tagged input event model (spec.md §4.C).

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModifierSet: u8 {
        const SHIFT   = 0b0000_0001;
        const CONTROL = 0b0000_0010;
        const ALT     = 0b0000_0100;
        const COMMAND = 0b0000_1000;
    }
}

/// Named key codes. Printable ASCII is represented as `Char(u32)` carrying
/// the codepoint, matching spec.md's "printable-ASCII codes as integers".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    Enter,
    Escape,
    Tab,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Char(u32),
    Backspace,
    Delete,
    F(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key_code: KeyCode,
    pub modifiers: ModifierSet,
    pub char: Option<String>,
}

impl KeyEvent {
    pub fn new(key_code: KeyCode, modifiers: ModifierSet) -> Self {
        Self { key_code, modifiers, char: None }
    }

    pub fn plain(key_code: KeyCode) -> Self {
        Self::new(key_code, ModifierSet::empty())
    }
}

/// Composed text from IME or paste — one or more code points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharEvent {
    pub char: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEventType {
    ButtonDown,
    ButtonUp,
    Move,
    Wheel,
    DoubleClick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseEvent {
    pub event_type: MouseEventType,
    pub column: i32,
    pub row: i32,
    /// Fraction in [0, 1) inside the hit cell.
    pub sub_cell_x: f32,
    pub sub_cell_y: f32,
    pub button: MouseButton,
    pub scroll_delta_x: f32,
    pub scroll_delta_y: f32,
    pub modifiers: ModifierSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventKind {
    Resize,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemEvent {
    pub kind: SystemEventKind,
}
