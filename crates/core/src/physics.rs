//! Controllers that move point-based elements such as particles.
//!
//! Controllers are registered with the manager by tag and looked up by the
//! plugins whose definitions name one.

use nalgebra::Vector3;

use crate::transform::Transform;

/// Applies forces or constraints to a batch of points.
pub trait PhysicsController {
    /// Steps every point. `dts`, `positions` and `velocities` are parallel;
    /// the shortest bounds the pass.
    fn update(
        &self,
        effect_to_world: &Transform,
        dts: &[f32],
        positions: &mut [Vector3<f32>],
        velocities: &mut [Vector3<f32>],
    );
}

/// Keeps points on the positive side of the plane `normal . p + d = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneCollider {
    pub normal: Vector3<f32>,
    pub d: f32,
}

impl Default for PlaneCollider {
    fn default() -> Self {
        Self {
            normal: Vector3::z(),
            d: 0.0,
        }
    }
}

impl PhysicsController for PlaneCollider {
    fn update(
        &self,
        _effect_to_world: &Transform,
        _dts: &[f32],
        positions: &mut [Vector3<f32>],
        velocities: &mut [Vector3<f32>],
    ) {
        for (position, velocity) in positions.iter_mut().zip(velocities.iter_mut()) {
            let distance = self.normal.dot(position) + self.d;
            if distance >= 0.0 {
                continue;
            }

            *position -= self.normal * distance;

            let inward = self.normal.dot(velocity);
            if inward < 0.0 {
                *velocity -= self.normal * inward;
            }
        }
    }
}
