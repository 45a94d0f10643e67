//! Sandbox 3D demo
//!
//! Controls: WASD to move, E/Space up, Q/Shift down, hold the right mouse
//! button to look around, wheel to zoom, Escape to quit.

mod demo_scene;

use demo_scene::DemoScene;
use sandbox_3d_engine::glam::Vec3;
use sandbox_3d_engine::sandbox3d::render::{FrameOutcome, RenderPass};
use sandbox_3d_engine::sandbox3d::scene::{DrawableSet, ForwardPass};
use sandbox_3d_engine::sandbox3d::{Camera, Config, Error, InputState, KeyCode, MouseButton, Result};
use sandbox_3d_engine::{engine_error, engine_info, engine_warn};
use sandbox_3d_engine_renderer_vulkan::sandbox3d::{print_validation_stats_report, VulkanRenderer};
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{CursorGrabMode, Window, WindowId};

const SOURCE: &str = "sandbox3d::demo";

/// Everything that only exists while the window is open
///
/// Field order matters: the renderer and scene release GPU objects before
/// the window goes away.
struct Running {
    scene: DemoScene,
    renderer: VulkanRenderer,
    window: Window,
}

struct DemoApp {
    config: Config,
    running: Option<Running>,
    input: InputState,
    camera: Camera,
    last_frame: Instant,
    looking: bool,
    error: Option<Error>,
}

impl DemoApp {
    fn new(config: Config) -> Self {
        let mut camera = Camera::new();
        camera.set_position(Vec3::new(0.0, 1.0, 5.0));
        camera.set_perspective(45.0, config.aspect_ratio(), 0.1, 100.0);
        Self {
            config,
            running: None,
            input: InputState::new(),
            camera,
            last_frame: Instant::now(),
            looking: false,
            error: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.window_title.clone())
            .with_inner_size(PhysicalSize::new(self.config.window_width, self.config.window_height));
        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::InitializationFailed(format!("Failed to create window: {}", e)))?;

        // The surface may differ from the requested size (DPI, tiling WMs)
        let size = window.inner_size();
        let config = self.config.clone().with_window_size(size.width, size.height);
        let mut renderer = VulkanRenderer::new(&window, &config)?;
        let scene = DemoScene::new(renderer.device(), renderer.signature())?;

        let pass: Box<dyn RenderPass> = Box::new(ForwardPass::new());
        renderer.add_pass(pass);
        self.camera.set_aspect(config.aspect_ratio());

        engine_info!(SOURCE, "Demo running on {}", renderer.device().device_name());
        self.running = Some(Running { scene, renderer, window });
        self.last_frame = Instant::now();
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: Error) {
        engine_error!(SOURCE, "{}", error);
        self.error = Some(error);
        event_loop.exit();
    }

    fn set_looking(&mut self, looking: bool) {
        let Some(running) = &self.running else { return };
        if looking == self.looking {
            return;
        }
        self.looking = looking;
        let grab = if looking { CursorGrabMode::Confined } else { CursorGrabMode::None };
        if let Err(e) = running.window.set_cursor_grab(grab) {
            engine_warn!(SOURCE, "Cursor grab unavailable: {}", e);
        }
        running.window.set_cursor_visible(!looking);
    }

    fn frame(&mut self) -> Result<()> {
        let now = Instant::now();
        let delta_time = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.set_looking(self.input.is_mouse_button_down(MouseButton::Right));
        if self.looking {
            let delta = self.input.mouse_delta();
            self.camera.process_mouse_movement(delta.x, delta.y);
        }
        self.camera.process_mouse_scroll(self.input.scroll_delta());
        self.camera.update(delta_time, &self.input);
        self.input.end_frame();

        let Some(running) = &mut self.running else { return Ok(()) };
        running.scene.update(delta_time);

        let drawables = DrawableSet::collect(&running.scene.world);
        if let FrameOutcome::Presented { passes, .. } = running.renderer.render_frame(&self.camera.frame_view(), &drawables)? {
            if passes.skipped > 0 {
                engine_warn!(SOURCE, "{} drawables skipped", passes.skipped);
            }
        }
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut running) = self.running.take() {
            let stats = running.renderer.stats();
            engine_info!(
                SOURCE,
                "{} frames rendered, {} dropped, {} swapchain recreations",
                stats.frames_rendered, stats.frames_dropped, stats.swapchain_recreations
            );
            if let Err(e) = running.renderer.shutdown() {
                engine_warn!(SOURCE, "Renderer shutdown failed: {}", e);
            }
        }
    }
}

impl ApplicationHandler for DemoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        self.input.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if size.height > 0 {
                    self.camera.set_aspect(size.width as f32 / size.height as f32);
                }
                let resized = match &mut self.running {
                    Some(running) => running.renderer.resize(size.width, size.height),
                    None => Ok(()),
                };
                if let Err(e) = resized {
                    self.fail(event_loop, e);
                }
            }
            WindowEvent::RedrawRequested => {
                if self.input.is_key_down(KeyCode::Escape) {
                    event_loop.exit();
                    return;
                }
                if let Err(e) = self.frame() {
                    self.fail(event_loop, e);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(running) = &self.running {
            running.window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.stop();
    }
}

fn main() -> Result<()> {
    let config = Config::default().with_title("Sandbox 3D - Forward Pass");

    let event_loop = EventLoop::new()
        .map_err(|e| Error::InitializationFailed(format!("Failed to create event loop: {}", e)))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = DemoApp::new(config);
    let run = event_loop
        .run_app(&mut app)
        .map_err(|e| Error::InitializationFailed(format!("Event loop terminated: {}", e)));
    app.stop();

    print_validation_stats_report();
    match app.error.take() {
        Some(e) => Err(e),
        None => run,
    }
}
