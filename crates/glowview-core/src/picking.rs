//! Pointer picking math
//!
//! Pointer positions are in logical window pixels with the origin at the
//! top-left. The renderer uses a reverse-Z projection: the near plane sits at
//! clip depth 1 and the far plane approaches 0.

use glam::{Mat4, Vec2, Vec3, Vec4};

/// Movement in logical pixels under which a press/release pair is a click
pub const CLICK_TOLERANCE: f32 = 4.0;

/// Map a pointer position to normalized device coordinates.
///
/// Returns `None` for an empty viewport.
pub fn pointer_to_ndc(pointer: Vec2, viewport: Vec2) -> Option<Vec2> {
    if !(viewport.x > 0.0 && viewport.y > 0.0) {
        return None;
    }
    Some(Vec2::new(
        (pointer.x / viewport.x) * 2.0 - 1.0,
        -(pointer.y / viewport.y) * 2.0 + 1.0,
    ))
}

/// A world-space ray through a pointer position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickRay {
    pub origin: Vec3,
    /// Unit length
    pub direction: Vec3,
}

impl PickRay {
    /// Unproject `ndc` through the inverse view-projection matrix
    pub fn from_ndc(ndc: Vec2, world_from_clip: Mat4) -> Option<Self> {
        let unproject = |depth: f32| {
            let point: Vec4 = world_from_clip * Vec4::new(ndc.x, ndc.y, depth, 1.0);
            (point.w.abs() > f32::EPSILON).then(|| point.truncate() / point.w)
        };

        let near = unproject(1.0)?;
        let far = unproject(f32::EPSILON)?;
        let direction = (far - near).try_normalize()?;

        Some(Self {
            origin: near,
            direction,
        })
    }

    pub fn point_at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

/// Closest hit among candidates, ignoring negative and non-finite distances
pub fn nearest_hit<T>(hits: impl IntoIterator<Item = (T, f32)>) -> Option<(T, f32)> {
    hits.into_iter()
        .filter(|(_, distance)| distance.is_finite() && *distance >= 0.0)
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
}

/// Tells a click apart from an orbit drag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickTracker {
    pressed_at: Option<Vec2>,
    tolerance: f32,
}

impl Default for ClickTracker {
    fn default() -> Self {
        Self::new(CLICK_TOLERANCE)
    }
}

impl ClickTracker {
    pub fn new(tolerance: f32) -> Self {
        Self {
            pressed_at: None,
            tolerance,
        }
    }

    pub fn press(&mut self, position: Vec2) {
        self.pressed_at = Some(position);
    }

    /// Returns the release position when the gesture was a click
    pub fn release(&mut self, position: Vec2) -> Option<Vec2> {
        let start = self.pressed_at.take()?;
        (start.distance(position) <= self.tolerance).then_some(position)
    }

    /// Forget a pending press, e.g. when the pointer entered a UI panel
    pub fn cancel(&mut self) {
        self.pressed_at = None;
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        a.abs_diff_eq(b, 1e-3)
    }

    #[test]
    fn test_ndc_corners() {
        let viewport = Vec2::new(800.0, 600.0);
        assert_eq!(pointer_to_ndc(Vec2::ZERO, viewport), Some(Vec2::new(-1.0, 1.0)));
        assert_eq!(pointer_to_ndc(viewport, viewport), Some(Vec2::new(1.0, -1.0)));
        assert_eq!(pointer_to_ndc(viewport / 2.0, viewport), Some(Vec2::ZERO));
        assert_eq!(pointer_to_ndc(Vec2::ONE, Vec2::new(0.0, 600.0)), None);
    }

    #[test]
    fn test_center_ray_follows_view_direction() {
        let eye = Vec3::new(0.0, 2.0, 10.0);
        let view = Mat4::look_at_rh(eye, Vec3::new(0.0, 2.0, 0.0), Vec3::Y);
        let projection = Mat4::perspective_infinite_reverse_rh(45f32.to_radians(), 4.0 / 3.0, 0.1);
        let world_from_clip = (projection * view).inverse();

        let ray = PickRay::from_ndc(Vec2::ZERO, world_from_clip).unwrap();

        assert!(approx(ray.direction, Vec3::NEG_Z));
        assert!(approx(ray.origin, Vec3::new(0.0, 2.0, 9.9)));
        assert!(approx(ray.point_at(9.9), Vec3::new(0.0, 2.0, 0.0)));
    }

    #[test]
    fn test_off_center_ray_leans_toward_pointer() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_infinite_reverse_rh(60f32.to_radians(), 1.0, 0.1);
        let world_from_clip = (projection * view).inverse();

        let right = PickRay::from_ndc(Vec2::new(0.5, 0.0), world_from_clip).unwrap();
        let up = PickRay::from_ndc(Vec2::new(0.0, 0.5), world_from_clip).unwrap();

        assert!(right.direction.x > 0.0);
        assert!(up.direction.y > 0.0);
        assert!((right.direction.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_nearest_hit_picks_closest() {
        let hits = vec![("far", 12.0), ("near", 3.5), ("behind", -1.0), ("nan", f32::NAN)];
        assert_eq!(nearest_hit(hits), Some(("near", 3.5)));
        assert_eq!(nearest_hit(Vec::<(u8, f32)>::new()), None);
    }

    #[test]
    fn test_click_versus_drag() {
        let mut tracker = ClickTracker::default();

        tracker.press(Vec2::new(100.0, 100.0));
        assert_eq!(tracker.release(Vec2::new(102.0, 101.0)), Some(Vec2::new(102.0, 101.0)));

        tracker.press(Vec2::new(100.0, 100.0));
        assert_eq!(tracker.release(Vec2::new(180.0, 100.0)), None);

        assert_eq!(tracker.release(Vec2::new(100.0, 100.0)), None);

        tracker.press(Vec2::ZERO);
        tracker.cancel();
        assert!(!tracker.is_pressed());
        assert_eq!(tracker.release(Vec2::ZERO), None);
    }
}
