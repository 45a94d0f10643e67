//! Unit tests for device scoring and queue family discovery

use crate::error::Error;
use crate::renderer::device::*;

fn family(index: u32, graphics: bool, present: bool) -> QueueFamilyInfo {
    QueueFamilyInfo { index, graphics, present }
}

fn device(name: &str, device_type: DeviceType) -> PhysicalDeviceInfo {
    PhysicalDeviceInfo {
        name: name.to_string(),
        device_type,
        supports_anisotropy: true,
        has_swapchain_extension: true,
        surface_format_count: 2,
        present_mode_count: 1,
        max_image_dimension_2d: 16384,
        queue_families: vec![family(0, true, true)],
    }
}

// ============================================================================
// QUEUE FAMILIES
// ============================================================================

#[test]
fn test_prefers_shared_family() {
    let families = [family(0, true, false), family(1, false, true), family(2, true, true)];
    let indices = find_queue_families(&families);
    assert_eq!(indices.graphics, Some(2));
    assert_eq!(indices.present, Some(2));
    assert!(indices.is_shared());
    assert_eq!(indices.unique(), vec![2]);
}

#[test]
fn test_separate_families_accepted() {
    let families = [family(0, true, false), family(1, false, true)];
    let indices = find_queue_families(&families);
    assert_eq!(indices.graphics, Some(0));
    assert_eq!(indices.present, Some(1));
    assert!(indices.is_complete());
    assert!(!indices.is_shared());
    assert_eq!(indices.unique(), vec![0, 1]);
}

#[test]
fn test_missing_present_family_is_incomplete() {
    let indices = find_queue_families(&[family(0, true, false)]);
    assert!(!indices.is_complete());
    assert!(!indices.is_shared());
}

// ============================================================================
// SCORING
// ============================================================================

#[test]
fn test_discrete_beats_integrated() {
    let discrete = score_device(&device("dGPU", DeviceType::DiscreteGpu)).unwrap();
    let integrated = score_device(&device("iGPU", DeviceType::IntegratedGpu)).unwrap();
    assert!(discrete > integrated);
}

#[test]
fn test_anisotropy_adds_score() {
    let mut without = device("a", DeviceType::IntegratedGpu);
    without.supports_anisotropy = false;
    let with = device("b", DeviceType::IntegratedGpu);
    assert_eq!(score_device(&with).unwrap() - score_device(&without).unwrap(), 200);
}

#[test]
fn test_device_without_present_support_is_rejected() {
    for device_type in [DeviceType::DiscreteGpu, DeviceType::IntegratedGpu, DeviceType::Cpu] {
        let mut info = device("no-present", device_type);
        info.queue_families = vec![family(0, true, false), family(1, true, false)];
        info.max_image_dimension_2d = u32::MAX;
        assert_eq!(score_device(&info), None);
    }
}

#[test]
fn test_device_without_swapchain_extension_is_rejected() {
    let mut info = device("no-swapchain", DeviceType::DiscreteGpu);
    info.has_swapchain_extension = false;
    assert_eq!(score_device(&info), None);
}

#[test]
fn test_device_without_surface_formats_is_rejected() {
    let mut info = device("no-formats", DeviceType::DiscreteGpu);
    info.surface_format_count = 0;
    assert_eq!(score_device(&info), None);

    let mut info = device("no-modes", DeviceType::DiscreteGpu);
    info.present_mode_count = 0;
    assert_eq!(score_device(&info), None);
}

// ============================================================================
// SELECTION
// ============================================================================

#[test]
fn test_select_skips_rejected_high_scorer() {
    let mut best_but_broken = device("dGPU", DeviceType::DiscreteGpu);
    best_but_broken.queue_families = vec![family(0, true, false)];
    let devices = vec![best_but_broken, device("iGPU", DeviceType::IntegratedGpu)];
    assert_eq!(select_device(&devices).unwrap(), 1);
}

#[test]
fn test_select_tie_keeps_first() {
    let devices = vec![
        device("first", DeviceType::IntegratedGpu),
        device("second", DeviceType::IntegratedGpu),
    ];
    assert_eq!(select_device(&devices).unwrap(), 0);
}

#[test]
fn test_select_fails_when_nothing_qualifies() {
    let mut info = device("cpu", DeviceType::Cpu);
    info.has_swapchain_extension = false;
    match select_device(&[info]) {
        Err(Error::InitializationFailed(msg)) => assert!(msg.contains("No suitable GPU")),
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(matches!(select_device(&[]), Err(Error::InitializationFailed(_))));
}
