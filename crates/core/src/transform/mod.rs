use nalgebra::{Point3, UnitQuaternion, Vector3};

/// Similarity transform: uniform scale, then rotation, then translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: 1.0,
        }
    }

    pub fn from_translation(translation: Vector3<f32>) -> Self {
        Self {
            translation,
            ..Self::identity()
        }
    }

    pub fn with_rotation(mut self, rotation: UnitQuaternion<f32>) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn transform_point(&self, point: &Point3<f32>) -> Point3<f32> {
        Point3::from(self.rotation * (point.coords * self.scale) + self.translation)
    }

    pub fn has_nan(&self) -> bool {
        self.scale.is_nan()
            || self.translation.iter().any(|v| v.is_nan())
            || self.rotation.coords.iter().any(|v| v.is_nan())
    }
}

/// Returns `outer ∘ inner`: the transform that applies `inner` first, then `outer`.
pub fn compose(outer: &Transform, inner: &Transform) -> Transform {
    Transform {
        translation: outer.translation + outer.rotation * (inner.translation * outer.scale),
        rotation: outer.rotation * inner.rotation,
        scale: outer.scale * inner.scale,
    }
}
