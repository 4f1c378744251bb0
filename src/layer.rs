//! The cooperative UI layer stack (spec.md §4.D).
//!
//! Dispatch and rendering are single-threaded: background workers never
//! call into a layer directly, they flip dirty flags under their own
//! locks and the UI thread observes them on the next frame.

use crate::input::{CharEvent, KeyEvent, MouseEvent, SystemEvent, SystemEventKind};
use crate::renderer::Renderer;

/// Contract every pushable UI layer must satisfy (spec.md §4.D).
pub trait UILayer {
    fn handle_key_event(&mut self, event: &KeyEvent) -> bool;
    fn handle_char_event(&mut self, event: &CharEvent) -> bool;
    fn handle_mouse_event(&mut self, event: &MouseEvent) -> bool;
    fn handle_system_event(&mut self, event: &SystemEvent) -> bool;

    fn render(&mut self, renderer: &mut dyn Renderer);

    fn is_full_screen(&self) -> bool;
    fn needs_redraw(&self) -> bool;
    fn mark_dirty(&mut self);
    fn clear_dirty(&mut self);

    fn should_close(&self) -> bool;

    fn on_activate(&mut self) {}
    fn on_deactivate(&mut self) {}

    /// Take a layer this layer wants pushed on top of it (e.g. a help
    /// dialog, or a file-diff view opened from a directory listing).
    /// Rust has no cheap way for a layer to hold a handle back to its own
    /// containing stack, so the stack pulls instead of the layer pushing:
    /// the main loop calls this after each dispatch and pushes whatever
    /// comes back.
    fn take_pending_layer(&mut self) -> Option<Box<dyn UILayer>> {
        None
    }
}

/// Ordered stack of layers. The last element is the topmost / most recently
/// pushed layer.
pub struct UILayerStack {
    layers: Vec<Box<dyn UILayer>>,
}

impl Default for UILayerStack {
    fn default() -> Self {
        Self::new()
    }
}

impl UILayerStack {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Push a new layer; it becomes the top. Deactivates the previous top,
    /// activates the new one.
    pub fn push(&mut self, mut layer: Box<dyn UILayer>) {
        if let Some(previous_top) = self.layers.last_mut() {
            previous_top.on_deactivate();
        }
        layer.on_activate();
        self.layers.push(layer);
    }

    /// Pop every layer whose `should_close()` is true, LIFO, calling
    /// `on_deactivate` on each popped layer and `on_activate` on the newly
    /// top layer once popping settles.
    pub fn pop_closed_layers(&mut self) {
        let mut popped_any = false;
        while let Some(top) = self.layers.last() {
            if !top.should_close() {
                break;
            }
            let mut popped = self.layers.pop().unwrap();
            popped.on_deactivate();
            popped_any = true;
        }
        if popped_any {
            if let Some(new_top) = self.layers.last_mut() {
                new_top.on_activate();
            }
        }
    }

    /// Offer the event to the topmost layer first; if unconsumed, try the
    /// next layer down.
    pub fn dispatch_key_event(&mut self, event: &KeyEvent) -> bool {
        for layer in self.layers.iter_mut().rev() {
            if layer.handle_key_event(event) {
                return true;
            }
        }
        false
    }

    pub fn dispatch_char_event(&mut self, event: &CharEvent) -> bool {
        for layer in self.layers.iter_mut().rev() {
            if layer.handle_char_event(event) {
                return true;
            }
        }
        false
    }

    pub fn dispatch_mouse_event(&mut self, event: &MouseEvent) -> bool {
        for layer in self.layers.iter_mut().rev() {
            if layer.handle_mouse_event(event) {
                return true;
            }
        }
        false
    }

    /// System resize is special: every layer receives it, top-to-bottom,
    /// and every layer is marked dirty afterward regardless of its
    /// individual consumed flag.
    pub fn dispatch_system_event(&mut self, event: &SystemEvent) {
        for layer in self.layers.iter_mut().rev() {
            layer.handle_system_event(event);
        }
        if event.kind == SystemEventKind::Resize {
            for layer in self.layers.iter_mut() {
                layer.mark_dirty();
            }
        }
    }

    /// Render bottom-up starting from the topmost full-screen layer (or
    /// position 0 if none is full-screen). A layer below one that just
    /// redrew is forced to redraw too, so overlay chains stay consistent.
    pub fn render(&mut self, renderer: &mut dyn Renderer) {
        let start = self
            .layers
            .iter()
            .rposition(|l| l.is_full_screen())
            .unwrap_or(0);

        let mut force_redraw_above = false;
        for layer in self.layers[start..].iter_mut() {
            let should_render = force_redraw_above || layer.needs_redraw();
            if should_render {
                layer.render(renderer);
                layer.clear_dirty();
                force_redraw_above = true;
            }
        }
    }

    /// Ask the topmost layer for a pending push and, if there is one,
    /// push it. Call this once per iteration of the main loop, after
    /// event dispatch and before rendering.
    pub fn collect_pending_pushes(&mut self) {
        loop {
            let pending = match self.layers.last_mut() {
                Some(top) => top.take_pending_layer(),
                None => None,
            };
            match pending {
                Some(layer) => self.push(layer),
                None => break,
            }
        }
    }

    pub fn top(&self) -> Option<&dyn UILayer> {
        self.layers.last().map(|b| b.as_ref())
    }

    pub fn top_mut(&mut self) -> Option<&mut (dyn UILayer + '_)> {
        self.layers.last_mut().map(|b| b.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{KeyCode, ModifierSet, SystemEventKind};
    use std::cell::Cell;
    use std::rc::Rc;

    struct TestLayer {
        name: &'static str,
        consume: bool,
        full_screen: bool,
        dirty: Rc<Cell<bool>>,
        close: Rc<Cell<bool>>,
        render_log: Rc<std::cell::RefCell<Vec<&'static str>>>,
        activated: Rc<Cell<usize>>,
        deactivated: Rc<Cell<usize>>,
    }

    impl UILayer for TestLayer {
        fn handle_key_event(&mut self, _event: &KeyEvent) -> bool {
            self.consume
        }
        fn handle_char_event(&mut self, _event: &CharEvent) -> bool {
            self.consume
        }
        fn handle_mouse_event(&mut self, _event: &MouseEvent) -> bool {
            self.consume
        }
        fn handle_system_event(&mut self, _event: &SystemEvent) -> bool {
            self.consume
        }
        fn render(&mut self, _renderer: &mut dyn Renderer) {
            self.render_log.borrow_mut().push(self.name);
        }
        fn is_full_screen(&self) -> bool {
            self.full_screen
        }
        fn needs_redraw(&self) -> bool {
            self.dirty.get()
        }
        fn mark_dirty(&mut self) {
            self.dirty.set(true);
        }
        fn clear_dirty(&mut self) {
            self.dirty.set(false);
        }
        fn should_close(&self) -> bool {
            self.close.get()
        }
        fn on_activate(&mut self) {
            self.activated.set(self.activated.get() + 1);
        }
        fn on_deactivate(&mut self) {
            self.deactivated.set(self.deactivated.get() + 1);
        }
    }

    struct FakeRenderer;
    impl Renderer for FakeRenderer {
        fn dimensions(&self) -> (u16, u16) {
            (24, 80)
        }
        fn clear(&mut self) {}
        fn draw_text(&mut self, _y: u16, _x: u16, _text: &str, _c: crate::renderer::ColorPair, _a: crate::renderer::TextAttribute) {}
        fn draw_hline(&mut self, _y: u16, _x: u16, _ch: char, _count: u16, _c: crate::renderer::ColorPair) {}
        fn refresh(&mut self) -> std::io::Result<()> {
            Ok(())
        }
        fn init_color_pair(&mut self, _id: crate::renderer::ColorPair, _fg: (u8, u8, u8), _bg: (u8, u8, u8)) {}
    }

    fn make_layer(name: &'static str, consume: bool, full_screen: bool) -> (Box<TestLayer>, Rc<Cell<bool>>, Rc<Cell<bool>>) {
        let dirty = Rc::new(Cell::new(true));
        let close = Rc::new(Cell::new(false));
        let layer = Box::new(TestLayer {
            name,
            consume,
            full_screen,
            dirty: dirty.clone(),
            close: close.clone(),
            render_log: Rc::new(std::cell::RefCell::new(Vec::new())),
            activated: Rc::new(Cell::new(0)),
            deactivated: Rc::new(Cell::new(0)),
        });
        (layer, dirty, close)
    }

    #[test]
    fn dispatch_tries_top_first_then_falls_through() {
        let mut stack = UILayerStack::new();
        let (bottom, _, _) = make_layer("bottom", true, false);
        let (top, _, _) = make_layer("top", false, false);
        stack.push(bottom);
        stack.push(top);

        let event = KeyEvent::new(KeyCode::Enter, ModifierSet::empty());
        assert!(stack.dispatch_key_event(&event));
    }

    #[test]
    fn full_screen_layer_hides_layers_below_it() {
        let mut stack = UILayerStack::new();
        let (bottom, _, _) = make_layer("bottom", false, false);
        let (middle, _, _) = make_layer("middle", false, true);
        let (top, _, _) = make_layer("top", false, false);
        stack.push(bottom);
        stack.push(middle);
        stack.push(top);

        let mut renderer = FakeRenderer;
        stack.render(&mut renderer);
        // Only middle (full screen) and top should have rendered.
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn resize_marks_every_layer_dirty() {
        let mut stack = UILayerStack::new();
        let (bottom, bottom_dirty, _) = make_layer("bottom", false, false);
        let (top, top_dirty, _) = make_layer("top", false, false);
        stack.push(bottom);
        stack.push(top);
        bottom_dirty.set(false);
        top_dirty.set(false);

        stack.dispatch_system_event(&SystemEvent { kind: SystemEventKind::Resize });

        assert!(bottom_dirty.get());
        assert!(top_dirty.get());
    }

    #[test]
    fn pop_closed_layers_is_lifo_and_reactivates_new_top() {
        let mut stack = UILayerStack::new();
        let (bottom, _, _) = make_layer("bottom", false, false);
        let (top, _, top_close) = make_layer("top", false, false);
        stack.push(bottom);
        stack.push(top);
        top_close.set(true);

        stack.pop_closed_layers();
        assert_eq!(stack.len(), 1);
    }
}
