//! Unit tests for sampler anisotropy selection

use super::*;

#[test]
fn test_anisotropy_clamped_to_device_limit() {
    assert_eq!(effective_anisotropy(Some(16.0), true, 8.0), Some(8.0));
    assert_eq!(effective_anisotropy(Some(4.0), true, 16.0), Some(4.0));
}

#[test]
fn test_anisotropy_disabled_without_feature() {
    assert_eq!(effective_anisotropy(Some(16.0), false, 16.0), None);
}

#[test]
fn test_anisotropy_not_requested() {
    assert_eq!(effective_anisotropy(None, true, 16.0), None);
    assert_eq!(effective_anisotropy(Some(1.0), true, 16.0), None);
}
