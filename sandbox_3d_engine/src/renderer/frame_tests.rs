//! Unit tests for the frame protocol, driven by `MockFrameBackend`

use std::sync::{Arc, Mutex};
use glam::{Mat4, Vec3};
use crate::error::Error;
use crate::renderer::mock_device::{mock_shader, mock_signature, MockDevice, MockFrameBackend};
use crate::renderer::{CommandList, Extent2D, PassStats, RenderPass, SwapchainState};
use crate::scene::{Drawable, DrawableSet, ForwardPass, Material, Mesh, MeshData, SimpleMaterial};
use super::*;

/// Pass that records its name and the frame context it saw
struct ProbePass {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl ProbePass {
    fn boxed(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Box<dyn RenderPass> {
        Box::new(Self { name: name.to_string(), log: log.clone(), fail: false })
    }
}

impl RenderPass for ProbePass {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(
        &mut self,
        _cmd: &mut dyn CommandList,
        ctx: &FrameContext,
        drawables: &DrawableSet,
    ) -> Result<PassStats> {
        self.log.lock().unwrap().push(format!(
            "{} slot={} image={} {}x{} drawables={}",
            self.name, ctx.slot, ctx.image_index, ctx.extent.width, ctx.extent.height, drawables.len()
        ));
        if self.fail {
            return Err(Error::BackendError("pass failed".to_string()));
        }
        Ok(PassStats::default())
    }
}

fn orchestrator(frames_in_flight: usize) -> FrameOrchestrator<MockFrameBackend> {
    let extent = Extent2D::new(1280, 720);
    FrameOrchestrator::new(MockFrameBackend::new(frames_in_flight, extent), extent)
}

fn render(orch: &mut FrameOrchestrator<MockFrameBackend>) -> FrameOutcome {
    orch.render_frame(&FrameView::default(), &DrawableSet::new()).unwrap()
}

// ============================================================================
// Protocol order
// ============================================================================

#[test]
fn test_single_frame_event_order() {
    let mut orch = orchestrator(2);
    let outcome = render(&mut orch);

    assert_eq!(outcome, FrameOutcome::Presented { image_index: 0, passes: PassStats::default() });
    assert_eq!(
        orch.backend().events,
        vec!["wait 0", "acquire 0", "reset 0", "record 0 0", "submit 0", "present 0 0"]
    );
    assert_eq!(orch.backend().recorded[0], vec!["set_viewport 1280x720", "set_scissor 1280x720"]);
}

#[test]
fn test_slots_advance_round_robin() {
    let mut orch = orchestrator(2);
    for _ in 0..3 {
        render(&mut orch);
    }

    let submits: Vec<&String> = orch.backend().events.iter().filter(|e| e.starts_with("submit")).collect();
    assert_eq!(submits, vec!["submit 0", "submit 1", "submit 0"]);
    assert_eq!(orch.current_slot(), 1);
    assert_eq!(orch.stats().frames_rendered, 3);
}

#[test]
fn test_never_more_than_n_frames_in_flight() {
    for n in 1..=3 {
        let mut orch = orchestrator(n);
        for _ in 0..10 {
            render(&mut orch);
        }
        assert!(orch.backend().max_in_flight <= n);
        assert_eq!(orch.backend().max_in_flight, n);
    }
}

#[test]
fn test_slot_waited_before_reuse() {
    let mut orch = orchestrator(2);
    for _ in 0..4 {
        render(&mut orch);
    }
    let events = &orch.backend().events;
    for (i, event) in events.iter().enumerate() {
        if let Some(slot) = event.strip_prefix("reset ") {
            assert_eq!(events[i - 2], format!("wait {}", slot));
        }
    }
}

#[test]
fn test_passes_run_in_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut orch = orchestrator(2);
    orch.add_pass(ProbePass::boxed("first", &log));
    orch.add_pass(ProbePass::boxed("second", &log));
    assert_eq!(orch.pass_count(), 2);

    render(&mut orch);
    render(&mut orch);

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "first slot=0 image=0 1280x720 drawables=0",
            "second slot=0 image=0 1280x720 drawables=0",
            "first slot=1 image=1 1280x720 drawables=0",
            "second slot=1 image=1 1280x720 drawables=0",
        ]
    );
}

// ============================================================================
// Stale surface
// ============================================================================

#[test]
fn test_out_of_date_acquire_drops_frame() {
    let mut orch = orchestrator(2);
    orch.backend_mut().acquire_script.push_back(AcquireOutcome::OutOfDate);

    let outcome = render(&mut orch);

    assert_eq!(outcome, FrameOutcome::Dropped);
    assert_eq!(orch.backend().events_named("submit"), 0);
    assert_eq!(orch.backend().events_named("present"), 0);
    assert_eq!(orch.backend().events_named("reset"), 0);
    assert_eq!(orch.backend().recreations, vec![Extent2D::new(1280, 720)]);
    assert_eq!(orch.swapchain_state(), SwapchainState::Ready);
    assert_eq!(orch.current_slot(), 0);
    assert_eq!(orch.stats().frames_dropped, 1);

    // the slot's fence was never reset, so the next frame proceeds normally
    assert!(matches!(render(&mut orch), FrameOutcome::Presented { .. }));
}

#[test]
fn test_suboptimal_present_recreates_after_presenting() {
    let mut orch = orchestrator(2);
    orch.backend_mut().present_script.push_back(PresentOutcome::Suboptimal);

    let outcome = render(&mut orch);

    assert!(matches!(outcome, FrameOutcome::Presented { .. }));
    let events = &orch.backend().events;
    assert_eq!(events[events.len() - 2], "present 0 0");
    assert_eq!(events[events.len() - 1], "recreate 1280x720");
    assert_eq!(orch.swapchain_state(), SwapchainState::Ready);
    assert_eq!(orch.stats().swapchain_recreations, 1);
}

#[test]
fn test_suboptimal_acquire_still_renders_then_recreates() {
    let mut orch = orchestrator(2);
    orch.backend_mut()
        .acquire_script
        .push_back(AcquireOutcome::Acquired { image_index: 2, suboptimal: true });

    let outcome = render(&mut orch);

    assert!(matches!(outcome, FrameOutcome::Presented { image_index: 2, .. }));
    assert_eq!(orch.backend().events_named("recreate"), 1);
}

#[test]
fn test_out_of_date_present_recreates() {
    let mut orch = orchestrator(2);
    orch.backend_mut().present_script.push_back(PresentOutcome::OutOfDate);

    assert!(matches!(render(&mut orch), FrameOutcome::Presented { .. }));
    assert_eq!(orch.backend().events_named("recreate"), 1);
    assert_eq!(orch.stats().frames_rendered, 1);
}

#[test]
fn test_resize_recreates_before_next_frame() {
    let mut orch = orchestrator(2);
    orch.resize(1920, 1080).unwrap();
    assert_eq!(orch.swapchain_state(), SwapchainState::Stale);

    render(&mut orch);

    assert_eq!(orch.backend().events[0], "recreate 1920x1080");
    assert_eq!(orch.backend().extent, Extent2D::new(1920, 1080));
    assert_eq!(orch.backend().recorded[0][0], "set_viewport 1920x1080");
}

#[test]
fn test_minimized_window_skips_until_restored() {
    let mut orch = orchestrator(2);
    orch.resize(0, 0).unwrap();

    assert_eq!(render(&mut orch), FrameOutcome::Skipped);
    assert_eq!(render(&mut orch), FrameOutcome::Skipped);
    assert!(orch.backend().events.is_empty());
    assert_eq!(orch.swapchain_state(), SwapchainState::Stale);
    assert_eq!(orch.stats().frames_dropped, 2);

    orch.resize(800, 600).unwrap();
    assert!(matches!(render(&mut orch), FrameOutcome::Presented { .. }));
    assert_eq!(orch.backend().recreations, vec![Extent2D::new(800, 600)]);
}

#[test]
fn test_stale_rebuild_after_resize_skips_and_retries() {
    let mut orch = orchestrator(2);
    orch.backend_mut().stale_rebuilds = 1;
    orch.resize(1920, 1080).unwrap();

    let outcome = orch.render_frame(&FrameView::default(), &DrawableSet::new());

    assert!(matches!(outcome, Ok(FrameOutcome::Skipped)));
    assert_eq!(orch.swapchain_state(), SwapchainState::Stale);
    assert_eq!(orch.backend().events, vec!["recreate stale"]);
    assert_eq!(orch.stats().swapchain_recreations, 0);

    assert!(matches!(render(&mut orch), FrameOutcome::Presented { .. }));
    assert_eq!(orch.backend().recreations, vec![Extent2D::new(1920, 1080)]);
    assert_eq!(orch.swapchain_state(), SwapchainState::Ready);
}

#[test]
fn test_stale_rebuild_after_present_keeps_frame() {
    let mut orch = orchestrator(2);
    orch.backend_mut().present_script.push_back(PresentOutcome::OutOfDate);
    orch.backend_mut().stale_rebuilds = 1;

    let outcome = orch.render_frame(&FrameView::default(), &DrawableSet::new());

    assert!(matches!(outcome, Ok(FrameOutcome::Presented { .. })));
    assert_eq!(orch.swapchain_state(), SwapchainState::Stale);

    render(&mut orch);
    assert_eq!(orch.backend().recreations.len(), 1);
    assert_eq!(orch.swapchain_state(), SwapchainState::Ready);
}

#[test]
fn test_stale_rebuild_after_acquire_drop() {
    let mut orch = orchestrator(2);
    orch.backend_mut().acquire_script.push_back(AcquireOutcome::OutOfDate);
    orch.backend_mut().stale_rebuilds = 2;

    let outcome = orch.render_frame(&FrameView::default(), &DrawableSet::new());
    assert!(matches!(outcome, Ok(FrameOutcome::Dropped)));

    let outcome = orch.render_frame(&FrameView::default(), &DrawableSet::new());
    assert!(matches!(outcome, Ok(FrameOutcome::Skipped)));
    assert_eq!(orch.stats().frames_dropped, 2);

    assert!(matches!(render(&mut orch), FrameOutcome::Presented { .. }));
    assert_eq!(orch.stats().swapchain_recreations, 1);
}

#[test]
fn test_recreate_twice_is_stable() {
    let mut orch = orchestrator(2);
    orch.resize(1024, 768).unwrap();
    render(&mut orch);
    orch.resize(1024, 768).unwrap();
    render(&mut orch);

    let recreations = &orch.backend().recreations;
    assert_eq!(recreations.len(), 2);
    assert_eq!(recreations[0], recreations[1]);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_failed_pass_recovers_slot() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut orch = orchestrator(2);
    orch.add_pass(Box::new(ProbePass { name: "broken".to_string(), log, fail: true }));

    let result = orch.render_frame(&FrameView::default(), &DrawableSet::new());

    assert!(matches!(result, Err(Error::BackendError(_))));
    assert_eq!(orch.backend().events_named("submit"), 0);
    assert_eq!(orch.backend().events_named("recover 0"), 1);
    assert!(orch.backend().fence_signaled[0]);
    assert_eq!(orch.current_slot(), 0);

    // the abandoned image is released by a rebuild before the next acquire
    assert_eq!(orch.swapchain_state(), SwapchainState::Stale);
    let retry = orch.render_frame(&FrameView::default(), &DrawableSet::new());
    assert!(retry.is_err());
    assert_eq!(orch.backend().recreations, vec![Extent2D::new(1280, 720)]);
    let events = &orch.backend().events;
    let recreate = events.iter().position(|e| e == "recreate 1280x720").unwrap();
    let second_acquire = events.iter().rposition(|e| e == "acquire 0").unwrap();
    assert!(recreate < second_acquire);
}

#[test]
fn test_render_after_shutdown_fails() {
    let mut orch = orchestrator(2);
    render(&mut orch);
    orch.shutdown().unwrap();

    assert_eq!(orch.swapchain_state(), SwapchainState::Destroyed);
    assert_eq!(orch.backend().in_flight, 0);
    let result = orch.render_frame(&FrameView::default(), &DrawableSet::new());
    assert!(matches!(result, Err(Error::InvalidAccess(_))));
    assert!(orch.resize(10, 10).is_err());
}

// ============================================================================
// Forward pass end to end
// ============================================================================

#[test]
fn test_forward_pass_skips_incomplete_drawable() {
    let device = MockDevice::new();
    let pipeline = SimpleMaterial::builder(mock_signature())
        .vertex_shader_binary(mock_shader("simple.vert"))
        .fragment_shader_binary(mock_shader("simple.frag"))
        .build(&device)
        .unwrap();
    let material: Arc<dyn Material> = Arc::new(SimpleMaterial::from_pipeline("Simple", pipeline));
    let cube = Arc::new(Mesh::new(&device, &MeshData::cube()).unwrap());

    let drawables: DrawableSet = [
        Drawable::new(Some(cube.clone()), Some(material.clone()), Mat4::IDENTITY),
        Drawable::new(None, Some(material.clone()), Mat4::from_translation(Vec3::X)),
        Drawable::new(Some(cube), Some(material), Mat4::from_translation(Vec3::NEG_X)),
    ]
    .into_iter()
    .collect();

    let mut orch = orchestrator(2);
    orch.add_pass(Box::new(ForwardPass::new()));
    let outcome = orch.render_frame(&FrameView::default(), &drawables).unwrap();

    assert_eq!(
        outcome,
        FrameOutcome::Presented { image_index: 0, passes: PassStats { draw_calls: 2, skipped: 1 } }
    );
    assert_eq!(orch.stats().draw_calls, 2);
    let draws = orch.backend().recorded[0].iter().filter(|c| c.starts_with("draw_indexed")).count();
    assert_eq!(draws, 2);
}

#[test]
fn test_frame_context_view_projection() {
    let ctx = FrameContext {
        view: Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0)),
        projection: Mat4::from_scale(Vec3::splat(2.0)),
        extent: Extent2D::new(1, 1),
        slot: 0,
        image_index: 0,
    };
    assert_eq!(ctx.view_projection(), ctx.projection * ctx.view);
}

#[test]
fn test_present_outcome_needs_recreate() {
    assert!(!PresentOutcome::Presented.needs_recreate());
    assert!(PresentOutcome::Suboptimal.needs_recreate());
    assert!(PresentOutcome::OutOfDate.needs_recreate());
}
