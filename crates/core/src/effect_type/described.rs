use std::{collections::HashMap, fmt, sync::Arc};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::{EffectType, EffectTypeContext, TransitionKind};
use crate::{
    manager::EffectsSettings, params::EffectParams, pool::SlotRef, pool::SlotVec, tag::Tag,
    transform::Transform,
};

/// Behaviour of a single instance of a [`DescribedEffectType`].
pub trait EffectBehaviour: Default {
    /// Definition shared by every instance created under the same name.
    type Desc: DeserializeOwned;
    /// Per-type state reachable from every instance update.
    type Shared: Default;

    /// Binds the instance to a definition, or unbinds it (`None`) when its
    /// definition disappeared on reconfiguration.
    fn set_description(&mut self, desc: Option<Arc<Self::Desc>>);

    fn set_transforms(&mut self, _source: &Transform, _effect: &Transform) {}

    fn start(&mut self, transition: TransitionKind);
    fn stop(&mut self, transition: TransitionKind);
    fn is_active(&self) -> bool;

    fn update(&mut self, dt: f32, params: &EffectParams, shared: &mut Self::Shared);

    fn shutdown(&mut self) {}

    fn pre_update(
        _shared: &mut Self::Shared,
        _real_dt: f32,
        _game_dt: f32,
        _settings: &mut EffectsSettings,
    ) {
    }

    fn post_update(
        _shared: &mut Self::Shared,
        _real_dt: f32,
        _game_dt: f32,
        _settings: &mut EffectsSettings,
    ) {
    }
}

#[derive(Debug, Default)]
struct Entry<B> {
    tag: Tag,
    effect: B,
}

/// Standard [`EffectType`] implementation: named definitions parsed from
/// the type's config object, and instances stored by value.
pub struct DescribedEffectType<B: EffectBehaviour> {
    context: Option<EffectTypeContext>,
    tag_to_index: HashMap<Tag, usize>,
    descs: Vec<Arc<B::Desc>>,
    /// Source JSON of each definition, parallel to `descs`.
    configs: Vec<Value>,
    names: Vec<String>,
    instances: SlotVec<Entry<B>>,
    shared: B::Shared,
    enabled: bool,
}

impl<B: EffectBehaviour> Default for DescribedEffectType<B> {
    fn default() -> Self {
        Self {
            context: None,
            tag_to_index: HashMap::new(),
            descs: Vec::new(),
            configs: Vec::new(),
            names: Vec::new(),
            instances: SlotVec::new(),
            shared: B::Shared::default(),
            enabled: true,
        }
    }
}

impl<B: EffectBehaviour> fmt::Debug for DescribedEffectType<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescribedEffectType")
            .field("context", &self.context)
            .field("definitions", &self.names)
            .field("instances", &self.instances.len())
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl<B: EffectBehaviour> DescribedEffectType<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(&self) -> Option<&EffectTypeContext> {
        self.context.as_ref()
    }

    /// Names of the loaded definitions.
    pub fn definition_names(&self) -> &[String] {
        &self.names
    }

    pub fn description(&self, tag: Tag) -> Option<&B::Desc> {
        self.tag_to_index.get(&tag).map(|&index| self.descs[index].as_ref())
    }

    pub fn instance(&self, instance: SlotRef) -> Option<&B> {
        self.instances.get(instance).map(|entry| &entry.effect)
    }

    pub fn shared(&self) -> &B::Shared {
        &self.shared
    }

    /// A disabled type keeps its instances but stops advancing them.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    fn remove_all_instances(&mut self) {
        for mut entry in self.instances.take_all() {
            entry.effect.shutdown();
        }
    }
}

impl<B: EffectBehaviour> EffectType for DescribedEffectType<B> {
    fn init(&mut self, context: &EffectTypeContext) {
        self.context = Some(*context);
    }

    fn shutdown(&mut self) {
        self.remove_all_instances();
        self.tag_to_index.clear();
        self.descs.clear();
        self.configs.clear();
        self.names.clear();
    }

    fn config(&mut self, definitions: &Map<String, Value>) {
        self.tag_to_index.clear();
        self.descs.clear();
        self.configs.clear();
        self.names.clear();

        for (name, info) in definitions {
            if !info.is_object() {
                continue;
            }

            match serde_json::from_value::<B::Desc>(info.clone()) {
                Ok(desc) => {
                    tracing::debug!(effect = %name, "adding definition");
                    self.tag_to_index.insert(Tag::new(name), self.descs.len());
                    self.descs.push(Arc::new(desc));
                    self.configs.push(info.clone());
                    self.names.push(name.clone());
                }
                Err(err) => {
                    tracing::warn!(effect = %name, error = %err, "skipping malformed definition");
                }
            }
        }

        let (tag_to_index, descs) = (&self.tag_to_index, &self.descs);
        for entry in self.instances.values_mut() {
            let desc = tag_to_index.get(&entry.tag).map(|&index| descs[index].clone());
            entry.effect.set_description(desc);
        }
    }

    fn pre_update(&mut self, real_dt: f32, game_dt: f32, settings: &mut EffectsSettings) {
        B::pre_update(&mut self.shared, real_dt, game_dt, settings);
    }

    fn post_update(&mut self, real_dt: f32, game_dt: f32, settings: &mut EffectsSettings) {
        B::post_update(&mut self.shared, real_dt, game_dt, settings);
    }

    fn has_effect(&self, tag: Tag) -> bool {
        self.tag_to_index.contains_key(&tag)
    }

    fn create_instance(&mut self, tag: Tag) -> SlotRef {
        let Some(&index) = self.tag_to_index.get(&tag) else {
            return SlotRef::NULL;
        };

        let mut effect = B::default();
        effect.set_description(Some(self.descs[index].clone()));
        self.instances.insert(Entry { tag, effect })
    }

    fn destroy_instance(&mut self, instance: SlotRef) -> bool {
        match self.instances.remove(instance) {
            Some(mut entry) => {
                entry.effect.shutdown();
                true
            }
            None => false,
        }
    }

    fn num_instances(&self) -> usize {
        self.instances.len()
    }

    fn effect_config(&self, instance: SlotRef) -> Option<&Value> {
        let entry = self.instances.get(instance)?;
        self.tag_to_index
            .get(&entry.tag)
            .map(|&index| &self.configs[index])
    }

    fn num_active_instances(&self) -> usize {
        self.instances
            .iter()
            .filter(|(_, entry)| entry.effect.is_active())
            .count()
    }

    fn set_transforms(&mut self, instance: SlotRef, source: &Transform, effect: &Transform) {
        if let Some(entry) = self.instances.get_mut(instance) {
            entry.effect.set_transforms(source, effect);
        }
    }

    fn start(&mut self, instance: SlotRef, transition: TransitionKind) {
        if let Some(entry) = self.instances.get_mut(instance) {
            entry.effect.start(transition);
        }
    }

    fn stop(&mut self, instance: SlotRef, transition: TransitionKind) {
        if let Some(entry) = self.instances.get_mut(instance) {
            entry.effect.stop(transition);
        }
    }

    fn is_active(&self, instance: SlotRef) -> bool {
        self.instances
            .get(instance)
            .is_some_and(|entry| entry.effect.is_active())
    }

    fn update(&mut self, instance: SlotRef, dt: f32, params: &EffectParams) -> bool {
        if self.enabled {
            if let Some(entry) = self.instances.get_mut(instance) {
                entry.effect.update(dt, params, &mut self.shared);
            }
        }
        true
    }
}
