//! Piecewise-linear keyframe animation driven by fixed-point ages.

use nalgebra::Vector3;

use crate::clock::{Age, AgeMul, AGE_FRACTION_BITS, AGE_FRACTION_MASK, AGE_FRACTION_SCALE};

/// A value that can be stored in a keyframe track.
pub trait Keyframe: Copy {
    /// Value returned for empty tracks, and the identity for [`modulate`](Self::modulate).
    fn neutral() -> Self;

    fn lerp(self, to: Self, t: f32) -> Self;

    /// Component-wise product with a modulation input.
    fn modulate(self, by: Self) -> Self;
}

impl Keyframe for f32 {
    fn neutral() -> Self {
        1.0
    }

    fn lerp(self, to: Self, t: f32) -> Self {
        self + t * (to - self)
    }

    fn modulate(self, by: Self) -> Self {
        self * by
    }
}

impl Keyframe for Vector3<f32> {
    fn neutral() -> Self {
        Vector3::repeat(1.0)
    }

    fn lerp(self, to: Self, t: f32) -> Self {
        self + (to - self) * t
    }

    fn modulate(self, by: Self) -> Self {
        self.component_mul(&by)
    }
}

/// Samples `frames` at a fixed-point `age` in `[0, AGE_EXPIRED]`.
pub fn linear_anim<K: Keyframe>(frames: &[K], age: Age) -> K {
    match frames {
        [] => K::neutral(),
        [only] => *only,
        _ => sample(frames, age),
    }
}

/// Samples `frames` at a normalized float age in `[0, 1)`.
///
/// Slower than [`linear_anim`]; meant for entities that keep a float age.
pub fn linear_anim_unit<K: Keyframe>(frames: &[K], age: f32) -> K {
    match frames {
        [] => K::neutral(),
        [only] => *only,
        _ => {
            // Clamped, with 1.0 pulled back inside the last segment.
            let age = age.max(0.0).min(1.0);
            let age = age - age * 1e-6;

            let last_segment = frames.len() - 2;
            let a = age * (frames.len() - 1) as f32;
            let index = (a.floor().max(0.0) as usize).min(last_segment);
            let frac = a - index as f32;
            frames[index].lerp(frames[index + 1], frac)
        }
    }
}

/// Samples `frames` at each of `ages`, multiplies by the matching
/// `modulation` entry (neutral when `None`), and writes the results to `out`.
///
/// `ages`, `modulation` and `out` are parallel; the shortest bounds the pass.
pub fn apply_linear_anim<K: Keyframe>(
    frames: &[K],
    ages: &[Age],
    modulation: Option<&[K]>,
    out: &mut [K],
) {
    let count = out.len().min(ages.len());
    let modulation_at = |i: usize| modulation.and_then(|m| m.get(i).copied()).unwrap_or_else(K::neutral);

    match frames {
        [] => {
            for (i, value) in out.iter_mut().take(count).enumerate() {
                *value = modulation_at(i);
            }
        }
        [only] => {
            for (i, value) in out.iter_mut().take(count).enumerate() {
                *value = only.modulate(modulation_at(i));
            }
        }
        _ => {
            for (i, (value, &age)) in out.iter_mut().zip(ages).enumerate() {
                *value = sample(frames, age).modulate(modulation_at(i));
            }
        }
    }
}

fn sample<K: Keyframe>(frames: &[K], age: Age) -> K {
    let a = AgeMul::from(age) * (frames.len() as AgeMul - 1);
    let index = ((a >> AGE_FRACTION_BITS) as usize).min(frames.len() - 2);
    let frac = (a & AgeMul::from(AGE_FRACTION_MASK)) as f32 * AGE_FRACTION_SCALE;
    frames[index].lerp(frames[index + 1], frac)
}
