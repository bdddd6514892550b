//! Core library for the audiovisual effects runtime.
//!
//! Effects are created by name through the [`EffectsManager`], which hands
//! out generational [`SlotRef`] handles and forwards every lifecycle call to
//! the [`EffectType`] plugin that defines the effect. Plugins age their
//! instances with the fixed-point [`clock`] and sample keyframe tracks with
//! [`anim`]. Built-in plugins live in [`effects`].

pub mod anim;
pub mod clock;
pub mod config;
pub mod effect_type;
pub mod effects;
pub mod error;
pub mod manager;
pub mod params;
pub mod physics;
pub mod pool;
pub mod tag;
pub mod transform;

pub use config::{EffectsConfig, ManagerConfig};
pub use effect_type::{
    DescribedEffectType, EffectBehaviour, EffectType, EffectTypeContext, EffectTypeId,
    TransitionKind,
};
pub use effects::{ScreenEffectType, ShakeEffectType};
pub use error::{EffectsError, Result};
pub use manager::{EffectsManager, EffectsSettings, FrameStats};
pub use params::{EffectData, EffectParams, ParamChannel, ParamValue};
pub use physics::{PhysicsController, PlaneCollider};
pub use pool::{SlotPool, SlotRef, SlotVec};
pub use tag::Tag;
pub use transform::{compose, Transform};
