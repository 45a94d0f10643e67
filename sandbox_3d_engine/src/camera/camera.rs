/// Camera - first-person fly camera.
///
/// Orientation is yaw/pitch in degrees (yaw -90 looks down -Z). The
/// projection flips Y for Vulkan clip space.

use glam::{Mat4, Vec3};
use winit::keyboard::KeyCode;
use crate::input::InputState;
use crate::renderer::FrameView;

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    position: Vec3,
    front: Vec3,
    up: Vec3,
    right: Vec3,
    world_up: Vec3,

    yaw: f32,
    pitch: f32,

    fov: f32,
    aspect: f32,
    near_plane: f32,
    far_plane: f32,

    /// World units per second
    pub move_speed: f32,
    /// Degrees per pixel of mouse movement
    pub mouse_sensitivity: f32,
    /// Degrees of field of view per scroll line
    pub zoom_speed: f32,
}

impl Default for Camera {
    fn default() -> Self {
        let mut camera = Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            front: Vec3::NEG_Z,
            up: Vec3::Y,
            right: Vec3::X,
            world_up: Vec3::Y,
            yaw: -90.0,
            pitch: 0.0,
            fov: 45.0,
            aspect: 16.0 / 9.0,
            near_plane: 0.1,
            far_plane: 100.0,
            move_speed: 5.0,
            mouse_sensitivity: 0.1,
            zoom_speed: 1.0,
        };
        camera.update_vectors();
        camera
    }
}

impl Camera {
    pub const MIN_PITCH: f32 = -89.0;
    pub const MAX_PITCH: f32 = 89.0;
    pub const MIN_FOV: f32 = 1.0;
    pub const MAX_FOV: f32 = 90.0;

    pub fn new() -> Self {
        Self::default()
    }

    // ===== GETTERS =====

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Vertical field of view in degrees
    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    // ===== SETTERS =====

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Set orientation in degrees; pitch is clamped
    pub fn set_rotation(&mut self, pitch: f32, yaw: f32) {
        self.pitch = pitch.clamp(Self::MIN_PITCH, Self::MAX_PITCH);
        self.yaw = yaw;
        self.update_vectors();
    }

    pub fn set_perspective(&mut self, fov: f32, aspect: f32, near_plane: f32, far_plane: f32) {
        self.fov = fov;
        self.aspect = aspect;
        self.near_plane = near_plane;
        self.far_plane = far_plane;
    }

    /// Keep the aspect ratio in sync with the framebuffer
    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    // ===== INPUT =====

    /// Move according to the keys held in `input`
    ///
    /// W/S along the view direction, A/D sideways, E or Space up, Q or
    /// left Shift down.
    pub fn update(&mut self, delta_time: f32, input: &InputState) {
        let velocity = self.move_speed * delta_time;
        let mut motion = Vec3::ZERO;

        if input.is_key_down(KeyCode::KeyW) {
            motion += self.front;
        }
        if input.is_key_down(KeyCode::KeyS) {
            motion -= self.front;
        }
        if input.is_key_down(KeyCode::KeyA) {
            motion -= self.right;
        }
        if input.is_key_down(KeyCode::KeyD) {
            motion += self.right;
        }
        if input.is_key_down(KeyCode::KeyE) || input.is_key_down(KeyCode::Space) {
            motion += self.world_up;
        }
        if input.is_key_down(KeyCode::KeyQ) || input.is_key_down(KeyCode::ShiftLeft) {
            motion -= self.world_up;
        }

        self.position += motion * velocity;
    }

    /// Apply a mouse offset in pixels (positive y looks up)
    pub fn process_mouse_movement(&mut self, x_offset: f32, y_offset: f32) {
        self.yaw += x_offset * self.mouse_sensitivity;
        self.pitch = (self.pitch + y_offset * self.mouse_sensitivity)
            .clamp(Self::MIN_PITCH, Self::MAX_PITCH);
        self.update_vectors();
    }

    /// Zoom by narrowing the field of view
    pub fn process_mouse_scroll(&mut self, y_offset: f32) {
        self.fov = (self.fov - y_offset * self.zoom_speed).clamp(Self::MIN_FOV, Self::MAX_FOV);
    }

    // ===== MATRICES =====

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    /// Perspective projection with Y flipped for Vulkan clip space
    pub fn projection_matrix(&self) -> Mat4 {
        let mut projection =
            Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near_plane, self.far_plane);
        projection.y_axis.y *= -1.0;
        projection
    }

    /// Combined view-projection matrix (projection * view).
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Matrices handed to the renderer for one frame
    pub fn frame_view(&self) -> FrameView {
        FrameView { view: self.view_matrix(), projection: self.projection_matrix() }
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize();
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
