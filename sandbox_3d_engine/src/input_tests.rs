use glam::Vec2;
use winit::dpi::PhysicalPosition;
use winit::event::{DeviceId, MouseScrollDelta, TouchPhase, WindowEvent};
use super::*;

#[test]
fn test_key_down_up() {
    let mut input = InputState::new();
    input.key_down(KeyCode::KeyW);

    assert!(input.is_key_down(KeyCode::KeyW));
    assert!(input.was_key_pressed(KeyCode::KeyW));
    assert!(!input.is_key_down(KeyCode::KeyS));

    input.key_up(KeyCode::KeyW);
    assert!(!input.is_key_down(KeyCode::KeyW));
}

#[test]
fn test_pressed_cleared_by_end_frame_but_held_key_stays() {
    let mut input = InputState::new();
    input.key_down(KeyCode::Space);
    input.end_frame();

    assert!(input.is_key_down(KeyCode::Space));
    assert!(!input.was_key_pressed(KeyCode::Space));

    // held key reported again is not a new press
    input.key_down(KeyCode::Space);
    assert!(!input.was_key_pressed(KeyCode::Space));
}

#[test]
fn test_mouse_buttons() {
    let mut input = InputState::new();
    input.mouse_button_down(MouseButton::Right);
    assert!(input.is_mouse_button_down(MouseButton::Right));
    assert!(!input.is_mouse_button_down(MouseButton::Left));

    input.mouse_button_up(MouseButton::Right);
    assert!(!input.is_mouse_button_down(MouseButton::Right));
}

#[test]
fn test_first_mouse_move_has_no_delta() {
    let mut input = InputState::new();
    input.mouse_moved(400.0, 300.0);

    assert_eq!(input.mouse_delta(), Vec2::ZERO);
    assert_eq!(input.mouse_position(), Vec2::new(400.0, 300.0));
}

#[test]
fn test_mouse_delta_y_inverted_and_accumulated() {
    let mut input = InputState::new();
    input.mouse_moved(100.0, 100.0);
    input.mouse_moved(110.0, 90.0);
    input.mouse_moved(115.0, 95.0);

    assert_eq!(input.mouse_delta(), Vec2::new(15.0, 5.0));

    input.end_frame();
    assert_eq!(input.mouse_delta(), Vec2::ZERO);
    assert_eq!(input.mouse_position(), Vec2::new(115.0, 95.0));
}

#[test]
fn test_scroll_accumulates_until_end_frame() {
    let mut input = InputState::new();
    input.scrolled(1.0);
    input.scrolled(0.5);
    assert_eq!(input.scroll_delta(), 1.5);

    input.end_frame();
    assert_eq!(input.scroll_delta(), 0.0);
}

#[test]
fn test_release_all() {
    let mut input = InputState::new();
    input.key_down(KeyCode::KeyA);
    input.mouse_button_down(MouseButton::Left);
    input.release_all();

    assert!(!input.is_key_down(KeyCode::KeyA));
    assert!(!input.is_mouse_button_down(MouseButton::Left));
}

// ============================================================================
// winit events
// ============================================================================

#[test]
fn test_cursor_and_wheel_events() {
    let mut input = InputState::new();
    // SAFETY: test-only placeholder id
    let device_id = unsafe { DeviceId::dummy() };

    assert!(input.handle_window_event(&WindowEvent::CursorMoved {
        device_id,
        position: PhysicalPosition::new(10.0, 20.0),
    }));
    assert!(input.handle_window_event(&WindowEvent::CursorMoved {
        device_id,
        position: PhysicalPosition::new(13.0, 18.0),
    }));
    assert!(input.handle_window_event(&WindowEvent::MouseWheel {
        device_id,
        delta: MouseScrollDelta::LineDelta(0.0, 2.0),
        phase: TouchPhase::Moved,
    }));

    assert_eq!(input.mouse_delta(), Vec2::new(3.0, 2.0));
    assert_eq!(input.scroll_delta(), 2.0);
}

#[test]
fn test_mouse_button_event() {
    let mut input = InputState::new();
    input.handle_window_event(&WindowEvent::MouseInput {
        device_id: unsafe { DeviceId::dummy() },
        state: winit::event::ElementState::Pressed,
        button: MouseButton::Left,
    });
    assert!(input.is_mouse_button_down(MouseButton::Left));
}

#[test]
fn test_non_input_event_ignored() {
    let mut input = InputState::new();
    assert!(!input.handle_window_event(&WindowEvent::Focused(true)));
    assert!(input.handle_window_event(&WindowEvent::Focused(false)));
}
