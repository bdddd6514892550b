//! Camera shake, applied through the shared view offset.

use std::sync::Arc;

use fastrand::Rng;
use nalgebra::Vector2;
use serde::Deserialize;

use crate::{
    anim::linear_anim_unit,
    clock::AGE_IOTA,
    effect_type::{DescribedEffectType, EffectBehaviour, TransitionKind},
    manager::EffectsSettings,
    params::EffectParams,
};

/// Entries per shake cycle.
const SHAKE_TABLE_SIZE: usize = 128;
const SHAKE_SEED: u64 = 12_345_678;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShakeKind {
    #[default]
    Random,
    /// Vertical sine wave.
    Sine,
}

impl ShakeKind {
    fn index(self) -> usize {
        match self {
            Self::Random => 0,
            Self::Sine => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShakeDesc {
    #[serde(rename = "type", alias = "kind")]
    pub kind: ShakeKind,
    /// Offset scale over the shake's life.
    pub amplitude: Vec<f32>,
    /// Cycles per second over the shake's life.
    pub frequency: Vec<f32>,
    pub life: f32,
    /// Seconds to fade out after the shake's sources are stopped.
    pub release: f32,
    /// Horizontal to vertical ratio of the offset.
    pub aspect: f32,
}

impl Default for ShakeDesc {
    fn default() -> Self {
        Self {
            kind: ShakeKind::default(),
            amplitude: Vec::new(),
            frequency: Vec::new(),
            life: 2.0,
            release: 0.0,
            aspect: 1.0,
        }
    }
}

/// Offset tables and the view offset accumulated this tick.
#[derive(Debug, Clone)]
pub struct ShakeShared {
    tables: [[Vector2<f32>; SHAKE_TABLE_SIZE]; 2],
    view_offset: Vector2<f32>,
}

impl Default for ShakeShared {
    fn default() -> Self {
        let mut rng = Rng::with_seed(SHAKE_SEED);
        let mut tables = [[Vector2::zeros(); SHAKE_TABLE_SIZE]; 2];
        let step = std::f32::consts::TAU / SHAKE_TABLE_SIZE as f32;

        for i in 0..SHAKE_TABLE_SIZE {
            tables[ShakeKind::Random.index()][i] =
                Vector2::new(signed_unit(&mut rng), signed_unit(&mut rng));
            tables[ShakeKind::Sine.index()][i] = Vector2::new(0.0, (i as f32 * step).sin());
        }

        Self {
            tables,
            view_offset: Vector2::zeros(),
        }
    }
}

impl ShakeShared {
    /// Sum of every shake's offset this tick.
    pub fn view_offset(&self) -> Vector2<f32> {
        self.view_offset
    }

    fn sample(&self, kind: ShakeKind, cycle: f32) -> Vector2<f32> {
        let table = &self.tables[kind.index()];
        let i0 = (cycle.floor() as usize).min(SHAKE_TABLE_SIZE - 1);
        let i1 = (i0 + 1) % SHAKE_TABLE_SIZE;
        let s = cycle - i0 as f32;
        table[i0].lerp(&table[i1], s)
    }
}

fn signed_unit(rng: &mut Rng) -> f32 {
    rng.f32() * 2.0 - 1.0
}

#[derive(Debug, Default)]
pub struct ShakeEffect {
    desc: Option<Arc<ShakeDesc>>,
    /// Normalized age in `[0, 1)`.
    age: f32,
    age_delta: f32,
    scale_xy: Vector2<f32>,
    /// Position in the shake table.
    cycle: f32,
    /// Seconds of fade left once released.
    release_remaining: Option<f32>,
    active: bool,
}

impl ShakeEffect {
    pub fn age(&self) -> f32 {
        self.age
    }

    pub fn is_releasing(&self) -> bool {
        self.release_remaining.is_some()
    }
}

impl EffectBehaviour for ShakeEffect {
    type Desc = ShakeDesc;
    type Shared = ShakeShared;

    fn set_description(&mut self, desc: Option<Arc<ShakeDesc>>) {
        match &desc {
            Some(desc) => {
                // Sub-iota lives expire on their first update.
                self.age_delta = if desc.life < AGE_IOTA {
                    0.0
                } else {
                    1.0 / desc.life
                };
                self.scale_xy = Vector2::new(1.0 / desc.aspect, desc.aspect);
            }
            None => self.active = false,
        }
        self.desc = desc;
    }

    fn start(&mut self, _transition: TransitionKind) {
        if self.desc.is_none() {
            return;
        }

        self.age = 0.0;
        self.cycle = 0.0;
        self.release_remaining = None;
        self.active = true;
    }

    fn stop(&mut self, transition: TransitionKind) {
        let release = self.desc.as_ref().map_or(0.0, |desc| desc.release);

        if transition == TransitionKind::Source && release > 0.0 && self.active {
            if self.release_remaining.is_none() {
                self.release_remaining = Some(release);
            }
        } else {
            self.active = false;
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn update(&mut self, dt: f32, _params: &EffectParams, shared: &mut ShakeShared) {
        let Some(desc) = self.desc.clone() else {
            return;
        };

        let mut fade = 1.0;
        if let Some(remaining) = self.release_remaining.as_mut() {
            *remaining -= dt;
            if *remaining <= 0.0 {
                self.active = false;
                return;
            }
            fade = *remaining / desc.release;
        }

        if self.age_delta > 0.0 {
            self.age += dt.max(0.0) * self.age_delta;
        } else {
            self.age = 1.0;
        }
        if self.age >= 1.0 {
            self.age = 1.0 - 1e-6;
            self.active = false;
        }

        let amplitude = linear_anim_unit(&desc.amplitude, self.age) * fade;
        let frequency = linear_anim_unit(&desc.frequency, self.age);

        self.cycle = (self.cycle + frequency * dt * SHAKE_TABLE_SIZE as f32)
            .rem_euclid(SHAKE_TABLE_SIZE as f32);

        let offset = shared.sample(desc.kind, self.cycle);
        shared.view_offset += offset.component_mul(&(self.scale_xy * amplitude));
    }

    fn pre_update(
        shared: &mut ShakeShared,
        _real_dt: f32,
        _game_dt: f32,
        settings: &mut EffectsSettings,
    ) {
        shared.view_offset = Vector2::zeros();
        settings.view_offset = Vector2::zeros();
    }

    fn post_update(
        shared: &mut ShakeShared,
        _real_dt: f32,
        _game_dt: f32,
        settings: &mut EffectsSettings,
    ) {
        settings.view_offset += shared.view_offset;
    }
}

pub type ShakeEffectType = DescribedEffectType<ShakeEffect>;
