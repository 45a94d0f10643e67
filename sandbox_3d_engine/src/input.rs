//! Keyboard and mouse state
//!
//! `InputState` is an explicit value fed from the window event stream and
//! passed to whoever needs it (camera, application). Per-frame values
//! (mouse delta, scroll, keys pressed this frame) are cleared by
//! `end_frame`.

use glam::Vec2;
use rustc_hash::FxHashSet;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::keyboard::PhysicalKey;

pub use winit::event::MouseButton;
pub use winit::keyboard::KeyCode;

/// Pixels of touchpad scroll treated as one wheel line
const PIXELS_PER_LINE: f64 = 40.0;

#[derive(Debug, Clone)]
pub struct InputState {
    keys_down: FxHashSet<KeyCode>,
    keys_pressed: FxHashSet<KeyCode>,
    buttons_down: FxHashSet<MouseButton>,
    mouse_position: Vec2,
    last_mouse_position: Vec2,
    mouse_delta: Vec2,
    scroll_delta: f32,
    first_mouse: bool,
}

impl Default for InputState {
    fn default() -> Self {
        Self {
            keys_down: FxHashSet::default(),
            keys_pressed: FxHashSet::default(),
            buttons_down: FxHashSet::default(),
            mouse_position: Vec2::ZERO,
            last_mouse_position: Vec2::ZERO,
            mouse_delta: Vec2::ZERO,
            scroll_delta: 0.0,
            first_mouse: true,
        }
    }
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== EVENT FEED =====

    /// Update from a winit window event
    ///
    /// Returns true if the event was an input event.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    match event.state {
                        ElementState::Pressed if !event.repeat => self.key_down(code),
                        ElementState::Pressed => {}
                        ElementState::Released => self.key_up(code),
                    }
                }
                true
            }
            WindowEvent::MouseInput { state, button, .. } => {
                match state {
                    ElementState::Pressed => self.mouse_button_down(*button),
                    ElementState::Released => self.mouse_button_up(*button),
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse_moved(position.x as f32, position.y as f32);
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => (p.y / PIXELS_PER_LINE) as f32,
                };
                self.scrolled(lines);
                true
            }
            WindowEvent::Focused(false) => {
                self.release_all();
                true
            }
            _ => false,
        }
    }

    pub fn key_down(&mut self, key: KeyCode) {
        if self.keys_down.insert(key) {
            self.keys_pressed.insert(key);
        }
    }

    pub fn key_up(&mut self, key: KeyCode) {
        self.keys_down.remove(&key);
    }

    pub fn mouse_button_down(&mut self, button: MouseButton) {
        self.buttons_down.insert(button);
    }

    pub fn mouse_button_up(&mut self, button: MouseButton) {
        self.buttons_down.remove(&button);
    }

    /// Cursor moved to (`x`, `y`) in window pixels
    ///
    /// The first report only records the position. Delta Y grows upward.
    pub fn mouse_moved(&mut self, x: f32, y: f32) {
        let position = Vec2::new(x, y);
        if self.first_mouse {
            self.last_mouse_position = position;
            self.first_mouse = false;
        }
        self.mouse_delta += Vec2::new(
            position.x - self.last_mouse_position.x,
            self.last_mouse_position.y - position.y,
        );
        self.last_mouse_position = position;
        self.mouse_position = position;
    }

    /// Vertical scroll in wheel lines
    pub fn scrolled(&mut self, lines: f32) {
        self.scroll_delta += lines;
    }

    /// Release every key and button (focus lost)
    pub fn release_all(&mut self) {
        self.keys_down.clear();
        self.buttons_down.clear();
    }

    /// Clear per-frame values; call once after the frame consumed them
    pub fn end_frame(&mut self) {
        self.keys_pressed.clear();
        self.mouse_delta = Vec2::ZERO;
        self.scroll_delta = 0.0;
    }

    // ===== QUERIES =====

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    /// Key went down since the last `end_frame`
    pub fn was_key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    pub fn is_mouse_button_down(&self, button: MouseButton) -> bool {
        self.buttons_down.contains(&button)
    }

    pub fn mouse_position(&self) -> Vec2 {
        self.mouse_position
    }

    /// Accumulated movement since the last `end_frame`
    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    pub fn scroll_delta(&self) -> f32 {
        self.scroll_delta
    }
}

#[cfg(test)]
#[path = "input_tests.rs"]
mod tests;
