//! Per-instance parameter overrides and attached data payloads.

use std::{any::Any, fmt, sync::Arc};

use nalgebra::{Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// Channels an effect instance can be driven through.
///
/// The discriminants are a versioned contract with plugins: new channels
/// are appended, existing ones never move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ParamChannel {
    /// Scale on effect colour, `Vec3(1)`.
    Colour,
    /// Scale on effect alpha, `1.0`.
    Alpha,
    /// Scale on the size of individual elements, `1.0`.
    Size,
    EmitColour,
    EmitAlpha,
    /// Scale on creation rate, `1.0`.
    EmitRate,
    EmitSpeed,
    EmitLife,
    EmitSize,
    /// Volume new elements are created in, `Bounds`.
    EmitVolume,
    /// Particle attractor location, `Vec3`.
    Attractor,
    /// Resource id of an override texture, `Resource(0)`.
    TextureOverride,
    /// Animation frame to start with, `Int(0)`.
    SetFrame,
    AnimSpeed,
    Shader1,
    Shader2,
    Shader3,
    Shader4,
}

impl ParamChannel {
    pub const COUNT: usize = 18;

    pub const ALL: [ParamChannel; Self::COUNT] = [
        Self::Colour,
        Self::Alpha,
        Self::Size,
        Self::EmitColour,
        Self::EmitAlpha,
        Self::EmitRate,
        Self::EmitSpeed,
        Self::EmitLife,
        Self::EmitSize,
        Self::EmitVolume,
        Self::Attractor,
        Self::TextureOverride,
        Self::SetFrame,
        Self::AnimSpeed,
        Self::Shader1,
        Self::Shader2,
        Self::Shader3,
        Self::Shader4,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds3 {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Scalar(f32),
    Vec3(Vector3<f32>),
    Vec4(Vector4<f32>),
    Int(i32),
    Resource(u32),
    Bounds(Bounds3),
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vector3<f32>> for ParamValue {
    fn from(value: Vector3<f32>) -> Self {
        Self::Vec3(value)
    }
}

impl From<Vector4<f32>> for ParamValue {
    fn from(value: Vector4<f32>) -> Self {
        Self::Vec4(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<Bounds3> for ParamValue {
    fn from(value: Bounds3) -> Self {
        Self::Bounds(value)
    }
}

/// Transient payload handed to an effect for a single tick, such as a batch
/// of spawn positions. Shared between the producer and the effect via `Arc`.
pub trait EffectData: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Clone, Copy, Default)]
struct ParamSlot {
    value: Option<ParamValue>,
    mod_count: u32,
}

/// Parameter block owned by one effect instance.
#[derive(Debug, Clone, Default)]
pub struct EffectParams {
    slots: [ParamSlot; ParamChannel::COUNT],
    mod_count: u32,
    data: Vec<Arc<dyn EffectData>>,
}

impl EffectParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_params(&self) -> bool {
        self.slots.iter().any(|slot| slot.value.is_some())
    }

    pub fn has_param(&self, channel: ParamChannel) -> bool {
        self.slots[channel.index()].value.is_some()
    }

    /// Counter bumped by every modification of any channel.
    pub fn mod_count(&self) -> u32 {
        self.mod_count
    }

    pub fn param_mod_count(&self, channel: ParamChannel) -> u32 {
        self.slots[channel.index()].mod_count
    }

    pub fn set(&mut self, channel: ParamChannel, value: impl Into<ParamValue>) {
        self.store(channel, Some(value.into()));
    }

    pub fn clear(&mut self, channel: ParamChannel) {
        if self.has_param(channel) {
            self.store(channel, None);
        }
    }

    pub fn get(&self, channel: ParamChannel) -> Option<ParamValue> {
        self.slots[channel.index()].value
    }

    /// Scalar value of `channel`, or `default` if unset or of another kind.
    pub fn scalar(&self, channel: ParamChannel, default: f32) -> f32 {
        match self.get(channel) {
            Some(ParamValue::Scalar(v)) => v,
            _ => default,
        }
    }

    pub fn vec3(&self, channel: ParamChannel, default: Vector3<f32>) -> Vector3<f32> {
        match self.get(channel) {
            Some(ParamValue::Vec3(v)) => v,
            _ => default,
        }
    }

    pub fn vec4(&self, channel: ParamChannel, default: Vector4<f32>) -> Vector4<f32> {
        match self.get(channel) {
            Some(ParamValue::Vec4(v)) => v,
            _ => default,
        }
    }

    pub fn int(&self, channel: ParamChannel, default: i32) -> i32 {
        match self.get(channel) {
            Some(ParamValue::Int(v)) => v,
            _ => default,
        }
    }

    pub fn resource(&self, channel: ParamChannel, default: u32) -> u32 {
        match self.get(channel) {
            Some(ParamValue::Resource(v)) => v,
            _ => default,
        }
    }

    pub fn bounds(&self, channel: ParamChannel) -> Option<Bounds3> {
        match self.get(channel) {
            Some(ParamValue::Bounds(v)) => Some(v),
            _ => None,
        }
    }

    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }

    pub fn num_data(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[Arc<dyn EffectData>] {
        &self.data
    }

    pub(crate) fn add_data(&mut self, data: Arc<dyn EffectData>) {
        self.data.push(data);
    }

    /// Releases this block's hold on every attached payload.
    pub(crate) fn clear_data(&mut self) {
        self.data.clear();
    }

    fn store(&mut self, channel: ParamChannel, value: Option<ParamValue>) {
        let slot = &mut self.slots[channel.index()];
        slot.value = value;
        slot.mod_count = slot.mod_count.wrapping_add(1);
        self.mod_count = self.mod_count.wrapping_add(1);
    }
}
