//! The interface every effect-type plugin implements.
//!
//! A plugin owns all instances of one category of effect (particles,
//! sprites, screen fades, ...) and is addressed by the manager through the
//! opaque [`SlotRef`] it returned from [`EffectType::create_instance`].

mod described;

use std::fmt;

use serde_json::{Map, Value};

use crate::{manager::EffectsSettings, params::EffectParams, pool::SlotRef, tag::Tag, transform::Transform};

pub use described::{DescribedEffectType, EffectBehaviour};

/// Registry row index of an effect type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectTypeId(u8);

impl EffectTypeId {
    pub const MAX_INTERNAL: u8 = 32;
    pub const MAX_EXTERNAL: u8 = 32;
    /// Size of the registry.
    pub const COUNT: usize = (Self::MAX_INTERNAL + Self::MAX_EXTERNAL) as usize;

    pub const GROUP: Self = Self(0);
    pub const PARTICLES: Self = Self(1);
    pub const RIBBON: Self = Self(2);
    pub const SPRITE: Self = Self(3);
    pub const SHAKE: Self = Self(4);
    pub const SCREEN: Self = Self(5);
    pub const SOUND: Self = Self(6);
    pub const MODEL: Self = Self(7);
    pub const EXAMPLE: Self = Self(8);

    /// First id reserved for plugins registered from outside this crate.
    pub const EXTERNAL_FIRST: Self = Self(Self::MAX_INTERNAL);
    pub const EXTERNAL_LAST: Self = Self(Self::MAX_INTERNAL + Self::MAX_EXTERNAL - 1);

    /// Returns the `n`th external id, if `n` is in range.
    pub const fn external(n: u8) -> Option<Self> {
        if n < Self::MAX_EXTERNAL {
            Some(Self(Self::MAX_INTERNAL + n))
        } else {
            None
        }
    }

    pub const fn from_index(index: usize) -> Option<Self> {
        if index < Self::COUNT {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn is_external(self) -> bool {
        self.0 >= Self::MAX_INTERNAL
    }
}

impl fmt::Debug for EffectTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EffectTypeId({})", self.0)
    }
}

/// How a start or stop request applies to an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Turn element sources on or off; existing elements live out their lives.
    Source,
    /// Snap the whole effect into its running state, or stop everything now.
    Immediate,
}

/// What a plugin learns about its registration.
#[derive(Debug, Clone, Copy)]
pub struct EffectTypeContext {
    pub type_id: EffectTypeId,
    pub tag: Tag,
    pub set_tag: Tag,
}

/// Effect-type plugin.
///
/// Every method taking a [`SlotRef`] must treat null or stale refs as a
/// no-op. Callbacks receive only the plugin itself, so a plugin cannot
/// create or destroy manager instances while the manager is updating.
pub trait EffectType {
    fn init(&mut self, _context: &EffectTypeContext) {}

    /// Called once every system has been configured for the first time.
    fn post_init(&mut self) {}

    /// Destroys all instances and releases the plugin's definitions.
    fn shutdown(&mut self);

    /// Configures the definitions of this type from the type's set object.
    /// The schema is up to the plugin.
    fn config(&mut self, definitions: &Map<String, Value>);

    /// Called before any instance is updated this tick.
    fn pre_update(&mut self, _real_dt: f32, _game_dt: f32, _settings: &mut EffectsSettings) {}

    /// Called after every instance was updated this tick.
    fn post_update(&mut self, _real_dt: f32, _game_dt: f32, _settings: &mut EffectsSettings) {}

    /// True if an effect named `tag` is defined and can be created.
    fn has_effect(&self, tag: Tag) -> bool;

    fn create_instance(&mut self, tag: Tag) -> SlotRef;
    fn destroy_instance(&mut self, instance: SlotRef) -> bool;

    fn num_instances(&self) -> usize;
    fn num_active_instances(&self) -> usize;

    fn set_transforms(&mut self, instance: SlotRef, source: &Transform, effect: &Transform);
    fn start(&mut self, instance: SlotRef, transition: TransitionKind);
    fn stop(&mut self, instance: SlotRef, transition: TransitionKind);
    fn is_active(&self, instance: SlotRef) -> bool;

    /// Advances `instance` by `dt` seconds.
    fn update(&mut self, instance: SlotRef, dt: f32, params: &EffectParams) -> bool;

    /// Definition the instance was created from, as configured.
    fn effect_config(&self, _instance: SlotRef) -> Option<&Value> {
        None
    }

    /// Short summary such as `"2/3 sprites"`, or `None` when idle.
    fn stats_string(&self, type_name: &str) -> Option<String> {
        let total = self.num_instances();
        (total > 0).then(|| format!("{}/{} {}", self.num_active_instances(), total, type_name))
    }
}
