//! Full-screen colour fades and flashes.

use std::sync::Arc;

use nalgebra::Vector3;
use serde::Deserialize;

use crate::{
    anim::linear_anim,
    clock::{clamp_age, is_expired, life_to_age_step, updated_age, updated_age_wrap, Age},
    effect_type::{DescribedEffectType, EffectBehaviour, TransitionKind},
    params::{EffectParams, ParamChannel},
    tag::Tag,
};

/// How a screen effect is composited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenMode {
    #[serde(alias = "additive")]
    Add,
    #[default]
    Blend,
    Tint,
    Background,
    Skybox,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScreenDesc {
    /// Seconds for one pass through the colour and alpha tracks.
    pub life: f32,
    /// Seconds to hold at the first keyframe after starting.
    pub delay: f32,
    #[serde(rename = "loop")]
    pub looping: bool,
    /// Hold the final keyframe instead of stopping at the end.
    pub sustain: bool,
    pub mode: ScreenMode,
    pub sort: i32,
    pub texture: Tag,
    pub colour: Vec<Vector3<f32>>,
    pub alpha: Vec<f32>,
}

impl Default for ScreenDesc {
    fn default() -> Self {
        Self {
            life: 2.0,
            delay: 0.0,
            looping: false,
            sustain: false,
            mode: ScreenMode::default(),
            sort: 0,
            texture: Tag::NULL,
            colour: Vec::new(),
            alpha: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ScreenEffect {
    desc: Option<Arc<ScreenDesc>>,
    age: Age,
    age_step: Age,
    delay_remaining: f32,
    active: bool,
    colour: Vector3<f32>,
    alpha: f32,
}

impl ScreenEffect {
    pub fn age(&self) -> Age {
        self.age
    }

    /// Colour resolved on the last update.
    pub fn colour(&self) -> Vector3<f32> {
        self.colour
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn mode(&self) -> Option<ScreenMode> {
        self.desc.as_ref().map(|desc| desc.mode)
    }
}

impl EffectBehaviour for ScreenEffect {
    type Desc = ScreenDesc;
    type Shared = ();

    fn set_description(&mut self, desc: Option<Arc<ScreenDesc>>) {
        match &desc {
            Some(desc) => self.age_step = life_to_age_step(desc.life),
            None => self.active = false,
        }
        self.desc = desc;
    }

    fn start(&mut self, _transition: TransitionKind) {
        let Some(desc) = &self.desc else {
            return;
        };

        self.age = 0;
        self.delay_remaining = desc.delay;
        self.active = true;
    }

    fn stop(&mut self, _transition: TransitionKind) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn update(&mut self, dt: f32, params: &EffectParams, _shared: &mut ()) {
        let Some(desc) = self.desc.clone() else {
            return;
        };

        let mut dt = dt;
        if self.delay_remaining > 0.0 {
            self.delay_remaining -= dt;
            dt = (-self.delay_remaining).max(0.0);
        }

        if desc.looping {
            self.age = updated_age_wrap(self.age, self.age_step, dt);
        } else {
            self.age = updated_age(self.age, self.age_step, dt);
            if is_expired(self.age) {
                self.age = clamp_age(self.age);
                if !desc.sustain {
                    self.stop(TransitionKind::Immediate);
                }
            }
        }

        let param_colour = params.vec3(ParamChannel::Colour, Vector3::repeat(1.0));
        let param_alpha = params.scalar(ParamChannel::Alpha, 1.0);

        self.colour = linear_anim(&desc.colour, self.age).component_mul(&param_colour);
        self.alpha = linear_anim(&desc.alpha, self.age) * param_alpha;
    }
}

pub type ScreenEffectType = DescribedEffectType<ScreenEffect>;
