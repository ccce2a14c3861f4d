//! Input Snapshot
//!
//! Engine-owned input state, deliberately independent of the windowing
//! backend: the winit runner translates events into this snapshot, and
//! headless hosts (tests, tools) can synthesize one directly.

use glam::Vec2;
use rustc_hash::FxHashSet;

/// Keys the engine cares about. Anything else arrives as `Other` with
/// the backend's scan code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Key {
    Escape,
    Space,
    Enter,
    W,
    A,
    S,
    D,
    P,
    Up,
    Down,
    Left,
    Right,
    /// Fullscreen toggle key.
    F11,
    /// Screenshot key.
    F12,
    Other(u32),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Default, Debug, Clone)]
pub struct Input {
    keys_down: FxHashSet<Key>,
    /// Keys that transitioned to down this frame.
    keys_pressed: FxHashSet<Key>,
    mouse_buttons: FxHashSet<MouseButton>,

    pub cursor_position: Vec2,
    /// Cursor movement since last frame.
    pub cursor_delta: Vec2,
    /// Scroll amount this frame.
    pub scroll_delta: Vec2,
    pub screen_size: Vec2,
}

impl Input {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the per-frame deltas. Call once per frame, after update.
    pub fn end_frame(&mut self) {
        self.cursor_delta = Vec2::ZERO;
        self.scroll_delta = Vec2::ZERO;
        self.keys_pressed.clear();
    }

    pub fn handle_key_down(&mut self, key: Key) {
        if self.keys_down.insert(key) {
            self.keys_pressed.insert(key);
        }
    }

    pub fn handle_key_up(&mut self, key: Key) {
        self.keys_down.remove(&key);
    }

    pub fn handle_resize(&mut self, width: u32, height: u32) {
        self.screen_size = Vec2::new(width as f32, height as f32);
    }

    pub fn handle_cursor_move(&mut self, x: f64, y: f64) {
        let new_pos = Vec2::new(x as f32, y as f32);
        if self.cursor_position != Vec2::ZERO {
            self.cursor_delta += new_pos - self.cursor_position;
        }
        self.cursor_position = new_pos;
    }

    pub fn handle_mouse_down(&mut self, button: MouseButton) {
        self.mouse_buttons.insert(button);
    }

    pub fn handle_mouse_up(&mut self, button: MouseButton) {
        self.mouse_buttons.remove(&button);
    }

    pub fn handle_scroll(&mut self, x: f32, y: f32) {
        self.scroll_delta += Vec2::new(x, y);
    }

    #[must_use]
    pub fn is_key_down(&self, key: Key) -> bool {
        self.keys_down.contains(&key)
    }

    /// Whether the key went down this frame (edge, not level).
    #[must_use]
    pub fn was_key_pressed(&self, key: Key) -> bool {
        self.keys_pressed.contains(&key)
    }

    #[must_use]
    pub fn is_button_pressed(&self, button: MouseButton) -> bool {
        self.mouse_buttons.contains(&button)
    }
}
