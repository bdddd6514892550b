//! Top-level owner of effect instances.
//!
//! [`EffectsManager`] maps its own [`SlotRef`]s onto instances living inside
//! effect-type plugins, and drives every live instance once per
//! [`update`](EffectsManager::update). Every call accepts null or stale refs
//! and treats them as "no such instance".

use std::{collections::HashMap, fmt, mem, sync::Arc, time::Instant};

use nalgebra::{Vector2, Vector3};
use serde_json::{Map, Value};

use crate::{
    config::EffectsConfig,
    effect_type::{EffectType, EffectTypeContext, EffectTypeId, TransitionKind},
    effects::{ScreenEffectType, ShakeEffectType},
    params::{EffectData, EffectParams},
    physics::{PhysicsController, PlaneCollider},
    pool::{SlotPool, SlotRef},
    tag::Tag,
    transform::{compose, Transform},
};

/// Weighting of the newest frame when smoothing timings.
const MSPF_SMOOTHING: f32 = 0.1;

/// Scene-wide state shared with every effect type during an update.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectsSettings {
    /// Applied to the effect transform of every instance.
    pub transform: Transform,
    pub camera_to_world: Transform,
    /// Screen-space camera offset, written by camera shake.
    pub view_offset: Vector2<f32>,
    pub wind_direction: Vector3<f32>,
    pub sun_direction: Vector3<f32>,
}

impl Default for EffectsSettings {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            camera_to_world: Transform::identity(),
            view_offset: Vector2::zeros(),
            wind_direction: Vector3::x(),
            sun_direction: Vector3::z(),
        }
    }
}

/// Smoothed milliseconds-per-frame spent in each phase of an update.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub overall_mspf: f32,
    pub pre_mspf: f32,
    pub post_mspf: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct InstanceFlags {
    /// Destroy once the plugin reports the instance inactive.
    one_shot: bool,
    paused: bool,
    /// Advance with real time rather than game time.
    real_time: bool,
    hidden: bool,
}

#[derive(Debug, Default)]
struct EffectInstance {
    tag: Tag,
    flags: InstanceFlags,
    effect_type: Option<EffectTypeId>,
    type_ref: SlotRef,
    source_transform: Transform,
    effect_transform: Transform,
    params: EffectParams,
}

struct RegisteredType {
    plugin: Box<dyn EffectType>,
    name: String,
    set_name: String,
    tag: Tag,
}

/// Owner of the create/start/stop/destroy lifecycle of effect instances.
pub struct EffectsManager {
    settings: EffectsSettings,
    enabled: bool,
    slots: SlotPool,
    instances: Vec<EffectInstance>,
    types: Vec<Option<RegisteredType>>,
    physics_controllers: HashMap<Tag, Arc<dyn PhysicsController>>,
    stats: FrameStats,
}

impl Default for EffectsManager {
    fn default() -> Self {
        Self::with_pool(SlotPool::new())
    }
}

impl EffectsManager {
    /// Creates a manager with no effect types registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager that refuses new instances once `limit` are live.
    pub fn with_capacity_limit(limit: usize) -> Self {
        Self::with_pool(SlotPool::with_capacity_limit(limit))
    }

    /// Creates a manager with the built-in effect types registered.
    pub fn with_builtin_types() -> Self {
        let mut manager = Self::new();
        manager.register_builtin_types();
        manager
    }

    /// Builds a ready-to-use manager from a loaded configuration: built-in
    /// types registered, definitions loaded and post-init run.
    pub fn from_config(config: &EffectsConfig) -> Self {
        let mut manager = match config.settings.slot_capacity {
            Some(limit) => Self::with_capacity_limit(limit),
            None => Self::new(),
        };
        manager.set_enabled(config.settings.enabled);
        manager.register_builtin_types();
        manager.load_definitions(&config.effects);
        manager.post_init();
        manager
    }

    fn with_pool(slots: SlotPool) -> Self {
        let mut types = Vec::with_capacity(EffectTypeId::COUNT);
        types.resize_with(EffectTypeId::COUNT, || None);

        Self {
            settings: EffectsSettings::default(),
            enabled: true,
            slots,
            instances: Vec::new(),
            types,
            physics_controllers: HashMap::new(),
            stats: FrameStats::default(),
        }
    }

    pub fn register_builtin_types(&mut self) {
        self.register_type(
            EffectTypeId::SHAKE,
            Box::new(ShakeEffectType::new()),
            "shake",
            "shakes",
        );
        self.register_type(
            EffectTypeId::SCREEN,
            Box::new(ScreenEffectType::new()),
            "screen",
            "screens",
        );
        self.register_physics_controller(Tag::new("plane"), Arc::new(PlaneCollider::default()));
    }

    // --- Effect type management -------------------------------------------

    /// Binds `plugin` to registry row `id`, shutting down whatever plugin was
    /// there. Records bound to the old plugin keep their manager slot but no
    /// longer reach any plugin instance. Definitions for the type are read from the config member named
    /// `set_name` (or `name` when `set_name` is empty).
    pub fn register_type(
        &mut self,
        id: EffectTypeId,
        mut plugin: Box<dyn EffectType>,
        name: &str,
        set_name: &str,
    ) {
        if let Some(mut previous) = self.types[id.index()].take() {
            tracing::debug!(type_id = ?id, previous = %previous.name, "replacing effect type");
            self.unbind_instances_of(id);
            previous.plugin.shutdown();
        }

        let set_name = if set_name.is_empty() { name } else { set_name };
        let context = EffectTypeContext {
            type_id: id,
            tag: Tag::new(name),
            set_tag: Tag::new(set_name),
        };
        plugin.init(&context);

        self.types[id.index()] = Some(RegisteredType {
            plugin,
            name: name.to_string(),
            set_name: set_name.to_string(),
            tag: context.tag,
        });
    }

    pub fn effect_type(&self, id: EffectTypeId) -> Option<&dyn EffectType> {
        self.types[id.index()].as_ref().map(|entry| entry.plugin.as_ref())
    }

    pub fn effect_type_mut(&mut self, id: EffectTypeId) -> Option<&mut (dyn EffectType + 'static)> {
        self.types[id.index()].as_mut().map(|entry| entry.plugin.as_mut())
    }

    /// Tag the type was registered under, or [`Tag::NULL`].
    pub fn effect_type_tag(&self, id: EffectTypeId) -> Tag {
        self.types[id.index()]
            .as_ref()
            .map_or(Tag::NULL, |entry| entry.tag)
    }

    pub fn effect_type_name(&self, id: EffectTypeId) -> Option<&str> {
        self.types[id.index()].as_ref().map(|entry| entry.name.as_str())
    }

    pub fn effect_type_from_tag(&self, tag: Tag) -> Option<EffectTypeId> {
        self.registered()
            .find(|(_, entry)| entry.tag == tag)
            .map(|(id, _)| id)
    }

    /// Makes `controller` available to plugins under `tag`, replacing any
    /// controller already registered there.
    pub fn register_physics_controller(&mut self, tag: Tag, controller: Arc<dyn PhysicsController>) {
        self.physics_controllers.insert(tag, controller);
    }

    pub fn physics_controller(&self, tag: Tag) -> Option<Arc<dyn PhysicsController>> {
        self.physics_controllers.get(&tag).cloned()
    }

    /// Forwards each registered type's definition set to that type.
    pub fn load_definitions(&mut self, config: &Map<String, Value>) {
        for entry in self.types.iter_mut().flatten() {
            if let Some(Value::Object(definitions)) = config.get(&entry.set_name) {
                tracing::info!(
                    set = %entry.set_name,
                    count = definitions.len(),
                    "loading effect definitions"
                );
                entry.plugin.config(definitions);
            }
        }
    }

    pub fn post_init(&mut self) {
        for entry in self.types.iter_mut().flatten() {
            entry.plugin.post_init();
        }
    }

    /// Destroys every instance, then shuts down and unregisters every type.
    pub fn shutdown(&mut self) {
        self.remove_all_instances();

        for slot in &mut self.types {
            if let Some(mut entry) = slot.take() {
                entry.plugin.shutdown();
            }
        }
    }

    // --- Settings and diagnostics ----------------------------------------

    pub fn settings(&self) -> &EffectsSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut EffectsSettings {
        &mut self.settings
    }

    /// While disabled, [`update`](Self::update) does nothing.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn num_instances(&self) -> usize {
        self.slots.num_slots_in_use()
    }

    pub fn frame_stats(&self) -> FrameStats {
        self.stats
    }

    /// Frame cost followed by per-type instance counts, e.g.
    /// `"0.2 mspf, 1/2 screens"`.
    pub fn stats_string(&self) -> String {
        let mut stats = format!("{:.1} mspf", self.stats.overall_mspf);
        for (_, entry) in self.registered() {
            if let Some(type_stats) = entry.plugin.stats_string(&entry.set_name) {
                stats.push_str(", ");
                stats.push_str(&type_stats);
            }
        }
        stats
    }

    // --- Update -----------------------------------------------------------

    /// Advances every live instance by one tick.
    ///
    /// Paused instances get their transforms but no time step; the rest get
    /// `real_dt` or `game_dt` depending on their real-time flag. One-shot
    /// instances the plugin reports inactive are destroyed in the same pass.
    pub fn update(&mut self, real_dt: f32, game_dt: f32) {
        if !self.enabled {
            self.stats = FrameStats::default();
            return;
        }

        let started = Instant::now();

        for entry in self.types.iter_mut().flatten() {
            entry.plugin.pre_update(real_dt, game_dt, &mut self.settings);
        }

        let pre_done = Instant::now();

        // Destruction inside this loop never shrinks `instances`.
        for index in 0..self.instances.len() {
            if !self.slots.index_in_use(index) {
                continue;
            }

            let reap = {
                let instance = &mut self.instances[index];
                let Some(type_id) = instance.effect_type else {
                    continue;
                };
                let Some(entry) = self.types[type_id.index()].as_mut() else {
                    continue;
                };
                let plugin = entry.plugin.as_mut();

                if plugin.is_active(instance.type_ref) {
                    let effect_to_world = compose(&self.settings.transform, &instance.effect_transform);
                    plugin.set_transforms(instance.type_ref, &instance.source_transform, &effect_to_world);

                    if !instance.flags.paused {
                        let dt = if instance.flags.real_time { real_dt } else { game_dt };
                        plugin.update(instance.type_ref, dt, &instance.params);

                        if instance.params.has_data() {
                            instance.params.clear_data();
                        }
                    }
                }

                instance.flags.one_shot && !plugin.is_active(instance.type_ref)
            };

            if reap {
                let slot_ref = self.slots.ref_from_index(index);
                tracing::debug!(instance = ?slot_ref, "one-shot effect finished");
                self.destroy_instance(slot_ref);
            }
        }

        let post_start = Instant::now();

        for entry in self.types.iter_mut().flatten() {
            entry.plugin.post_update(real_dt, game_dt, &mut self.settings);
        }

        let finished = Instant::now();
        smooth_mspf(&mut self.stats.pre_mspf, pre_done - started);
        smooth_mspf(&mut self.stats.post_mspf, finished - post_start);
        smooth_mspf(&mut self.stats.overall_mspf, finished - started);
    }

    // --- Instance lifecycle ----------------------------------------------

    /// Creates an instance of the effect named `tag` using the first type
    /// that defines it. Returns [`SlotRef::NULL`] if no type does, or if the
    /// manager is at capacity.
    pub fn create_instance(&mut self, tag: Tag) -> SlotRef {
        let Some(type_id) = self.find_type_for(tag) else {
            tracing::debug!(%tag, "no effect type defines this effect");
            return SlotRef::NULL;
        };

        let slot_ref = self.slots.create_slot();
        if slot_ref.is_null() {
            tracing::warn!(%tag, "effect instance capacity reached");
            return SlotRef::NULL;
        }

        self.instances
            .resize_with(self.slots.num_slots(), EffectInstance::default);

        let type_ref = self
            .effect_type_mut(type_id)
            .map_or(SlotRef::NULL, |plugin| plugin.create_instance(tag));

        self.instances[slot_ref.index()] = EffectInstance {
            tag,
            effect_type: Some(type_id),
            type_ref,
            ..EffectInstance::default()
        };

        slot_ref
    }

    /// Creates an instance that is destroyed automatically once it stops.
    pub fn create_one_shot_instance(&mut self, tag: Tag) -> SlotRef {
        let slot_ref = self.create_instance(tag);
        if let Some(instance) = self.record_mut(slot_ref) {
            instance.flags.one_shot = true;
        }
        slot_ref
    }

    /// Destroys the instance. Returns false if it no longer existed; any
    /// later call with `slot_ref` is ignored.
    pub fn destroy_instance(&mut self, slot_ref: SlotRef) -> bool {
        if !self.slots.destroy_slot(slot_ref) {
            return false;
        }

        let instance = mem::take(&mut self.instances[slot_ref.index()]);
        self.release_plugin_instance(&instance);
        true
    }

    /// Destroys the instance now if it is inactive (returning true), or
    /// marks it one-shot so it is destroyed once it stops (returning false).
    pub fn destroy_instance_on_stop(&mut self, slot_ref: SlotRef) -> bool {
        if self.is_active(slot_ref) {
            if let Some(instance) = self.record_mut(slot_ref) {
                instance.flags.one_shot = true;
            }
            false
        } else {
            self.destroy_instance(slot_ref)
        }
    }

    /// Bulk form of [`create_instance`](Self::create_instance); the result
    /// lines up with `tags`.
    pub fn create_instances(&mut self, tags: &[Tag]) -> Vec<SlotRef> {
        tags.iter().map(|&tag| self.create_instance(tag)).collect()
    }

    /// Bulk form of [`destroy_instance`](Self::destroy_instance). Entries
    /// that were destroyed are overwritten with [`SlotRef::NULL`].
    pub fn destroy_instances(&mut self, slot_refs: &mut [SlotRef]) {
        for slot_ref in slot_refs {
            if self.destroy_instance(*slot_ref) {
                *slot_ref = SlotRef::NULL;
            }
        }
    }

    /// Destroys every instance at once, including orphaned ones.
    pub fn remove_all_instances(&mut self) {
        self.slots.clear_slots();

        for instance in mem::take(&mut self.instances) {
            self.release_plugin_instance(&instance);
        }
    }

    // --- Per-instance state ----------------------------------------------

    pub fn effect_tag(&self, slot_ref: SlotRef) -> Tag {
        self.record(slot_ref).map_or(Tag::NULL, |instance| instance.tag)
    }

    /// Definition the instance was created from, if its type keeps one.
    pub fn effect_config(&self, slot_ref: SlotRef) -> Option<&Value> {
        let (type_id, type_ref) = self.bound(slot_ref)?;
        self.effect_type(type_id)?.effect_config(type_ref)
    }

    pub fn set_source_transform(&mut self, slot_ref: SlotRef, transform: Transform) {
        debug_assert!(!transform.has_nan());
        if let Some(instance) = self.record_mut(slot_ref) {
            instance.source_transform = transform;
        }
    }

    pub fn source_transform(&self, slot_ref: SlotRef) -> Transform {
        self.record(slot_ref)
            .map_or_else(Transform::identity, |instance| instance.source_transform)
    }

    pub fn set_effect_transform(&mut self, slot_ref: SlotRef, transform: Transform) {
        debug_assert!(!transform.has_nan());
        if let Some(instance) = self.record_mut(slot_ref) {
            instance.effect_transform = transform;
        }
    }

    pub fn effect_transform(&self, slot_ref: SlotRef) -> Transform {
        self.record(slot_ref)
            .map_or_else(Transform::identity, |instance| instance.effect_transform)
    }

    /// Starts emitting new elements.
    pub fn start_sources(&mut self, slot_ref: SlotRef) {
        self.transition(slot_ref, TransitionKind::Source, true);
    }

    /// Stops emitting; the effect winds down on its own once existing
    /// elements have expired.
    pub fn stop_sources(&mut self, slot_ref: SlotRef) {
        self.transition(slot_ref, TransitionKind::Source, false);
    }

    /// Starts the effect in its steady state.
    pub fn start_effect(&mut self, slot_ref: SlotRef) {
        self.transition(slot_ref, TransitionKind::Immediate, true);
    }

    /// Stops the effect and everything it emitted immediately.
    pub fn stop_effect(&mut self, slot_ref: SlotRef) {
        self.transition(slot_ref, TransitionKind::Immediate, false);
    }

    pub fn is_active(&self, slot_ref: SlotRef) -> bool {
        self.bound(slot_ref).is_some_and(|(type_id, type_ref)| {
            self.effect_type(type_id)
                .is_some_and(|plugin| plugin.is_active(type_ref))
        })
    }

    /// Stored only for now: plugins are not yet told about visibility.
    pub fn set_visible(&mut self, slot_ref: SlotRef, visible: bool) {
        if let Some(instance) = self.record_mut(slot_ref) {
            instance.flags.hidden = !visible;
        }
    }

    pub fn visible(&self, slot_ref: SlotRef) -> bool {
        self.record(slot_ref)
            .is_some_and(|instance| !instance.flags.hidden)
    }

    pub fn set_paused(&mut self, slot_ref: SlotRef, paused: bool) {
        if let Some(instance) = self.record_mut(slot_ref) {
            instance.flags.paused = paused;
        }
    }

    pub fn paused(&self, slot_ref: SlotRef) -> bool {
        self.record(slot_ref).is_some_and(|instance| instance.flags.paused)
    }

    pub fn set_real_time(&mut self, slot_ref: SlotRef, real_time: bool) {
        if let Some(instance) = self.record_mut(slot_ref) {
            instance.flags.real_time = real_time;
        }
    }

    pub fn real_time(&self, slot_ref: SlotRef) -> bool {
        self.record(slot_ref)
            .is_some_and(|instance| instance.flags.real_time)
    }

    pub fn params(&self, slot_ref: SlotRef) -> Option<&EffectParams> {
        self.record(slot_ref).map(|instance| &instance.params)
    }

    pub fn params_mut(&mut self, slot_ref: SlotRef) -> Option<&mut EffectParams> {
        self.record_mut(slot_ref).map(|instance| &mut instance.params)
    }

    /// Attaches `data` to the instance for its next tick. For an unknown
    /// instance the payload is released straight away.
    pub fn add_data(&mut self, slot_ref: SlotRef, data: Arc<dyn EffectData>) {
        if let Some(instance) = self.record_mut(slot_ref) {
            instance.params.add_data(data);
        }
    }

    // --- Internals --------------------------------------------------------

    fn registered(&self) -> impl Iterator<Item = (EffectTypeId, &RegisteredType)> + '_ {
        self.types.iter().enumerate().filter_map(|(index, entry)| {
            let id = EffectTypeId::from_index(index)?;
            entry.as_ref().map(|entry| (id, entry))
        })
    }

    fn find_type_for(&self, tag: Tag) -> Option<EffectTypeId> {
        self.registered()
            .find(|(_, entry)| entry.plugin.has_effect(tag))
            .map(|(id, _)| id)
    }

    fn record(&self, slot_ref: SlotRef) -> Option<&EffectInstance> {
        if self.slots.in_use(slot_ref) {
            self.instances.get(slot_ref.index())
        } else {
            None
        }
    }

    fn record_mut(&mut self, slot_ref: SlotRef) -> Option<&mut EffectInstance> {
        if self.slots.in_use(slot_ref) {
            self.instances.get_mut(slot_ref.index())
        } else {
            None
        }
    }

    fn bound(&self, slot_ref: SlotRef) -> Option<(EffectTypeId, SlotRef)> {
        let instance = self.record(slot_ref)?;
        let type_id = instance.effect_type?;
        (!instance.type_ref.is_null()).then_some((type_id, instance.type_ref))
    }

    fn transition(&mut self, slot_ref: SlotRef, transition: TransitionKind, start: bool) {
        let Some((type_id, type_ref)) = self.bound(slot_ref) else {
            return;
        };
        if let Some(plugin) = self.effect_type_mut(type_id) {
            if start {
                plugin.start(type_ref, transition);
            } else {
                plugin.stop(type_ref, transition);
            }
        }
    }

    fn unbind_instances_of(&mut self, id: EffectTypeId) {
        for instance in &mut self.instances {
            if instance.effect_type == Some(id) {
                instance.type_ref = SlotRef::NULL;
            }
        }
    }

    fn release_plugin_instance(&mut self, instance: &EffectInstance) {
        if instance.type_ref.is_null() {
            return;
        }
        let Some(type_id) = instance.effect_type else {
            return;
        };
        if let Some(plugin) = self.effect_type_mut(type_id) {
            plugin.destroy_instance(instance.type_ref);
        }
    }
}

impl fmt::Debug for EffectsManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<_> = self.registered().map(|(_, entry)| entry.name.as_str()).collect();
        f.debug_struct("EffectsManager")
            .field("enabled", &self.enabled)
            .field("instances", &self.slots.num_slots_in_use())
            .field("types", &types)
            .field("physics_controllers", &self.physics_controllers.len())
            .field("stats", &self.stats)
            .finish()
    }
}

fn smooth_mspf(mspf: &mut f32, elapsed: std::time::Duration) {
    let sample = elapsed.as_secs_f32() * 1000.0;
    *mspf += (sample - *mspf) * MSPF_SMOOTHING;
}

#[cfg(test)]
mod tests {
    use std::{any::Any, cell::RefCell, rc::Rc};

    use approx::assert_relative_eq;
    use serde_json::json;

    use super::*;
    use crate::{params::ParamChannel, pool::SlotVec};

    #[derive(Debug, Default)]
    struct Recorder {
        context: Option<EffectTypeContext>,
        ticks: u32,
        created: u32,
        destroyed: u32,
        destroy_calls: u32,
        shutdowns: u32,
        configured: Vec<String>,
        dts: Vec<f32>,
        data_seen: Vec<usize>,
        effect_transforms: Vec<Transform>,
        events: Vec<&'static str>,
    }

    #[derive(Debug, Default)]
    struct Blip {
        running: bool,
    }

    /// Instances stay active for `life_ticks` manager ticks.
    struct Blips {
        recorder: Rc<RefCell<Recorder>>,
        names: Vec<Tag>,
        life_ticks: u32,
        instances: SlotVec<Blip>,
    }

    impl Blips {
        fn boxed(recorder: &Rc<RefCell<Recorder>>, names: &[&str], life_ticks: u32) -> Box<Self> {
            Box::new(Self {
                recorder: Rc::clone(recorder),
                names: names.iter().map(|name| Tag::new(name)).collect(),
                life_ticks,
                instances: SlotVec::new(),
            })
        }
    }

    impl EffectType for Blips {
        fn init(&mut self, context: &EffectTypeContext) {
            self.recorder.borrow_mut().context = Some(*context);
        }

        fn shutdown(&mut self) {
            let mut recorder = self.recorder.borrow_mut();
            recorder.destroyed += self.instances.take_all().len() as u32;
            recorder.shutdowns += 1;
        }

        fn config(&mut self, definitions: &Map<String, Value>) {
            self.recorder
                .borrow_mut()
                .configured
                .extend(definitions.keys().cloned());
        }

        fn pre_update(&mut self, _real_dt: f32, _game_dt: f32, _settings: &mut EffectsSettings) {
            let mut recorder = self.recorder.borrow_mut();
            recorder.ticks += 1;
            recorder.events.push("pre");
        }

        fn post_update(&mut self, _real_dt: f32, _game_dt: f32, _settings: &mut EffectsSettings) {
            self.recorder.borrow_mut().events.push("post");
        }

        fn has_effect(&self, tag: Tag) -> bool {
            self.names.contains(&tag)
        }

        fn create_instance(&mut self, tag: Tag) -> SlotRef {
            if !self.has_effect(tag) {
                return SlotRef::NULL;
            }
            self.recorder.borrow_mut().created += 1;
            self.instances.insert(Blip { running: true })
        }

        fn destroy_instance(&mut self, instance: SlotRef) -> bool {
            let mut recorder = self.recorder.borrow_mut();
            recorder.destroy_calls += 1;
            let removed = self.instances.remove(instance).is_some();
            if removed {
                recorder.destroyed += 1;
            }
            removed
        }

        fn num_instances(&self) -> usize {
            self.instances.len()
        }

        fn num_active_instances(&self) -> usize {
            self.instances.iter().filter(|(_, blip)| blip.running).count()
        }

        fn set_transforms(&mut self, _instance: SlotRef, _source: &Transform, effect: &Transform) {
            self.recorder.borrow_mut().effect_transforms.push(*effect);
        }

        fn start(&mut self, instance: SlotRef, _transition: TransitionKind) {
            if let Some(blip) = self.instances.get_mut(instance) {
                blip.running = true;
            }
        }

        fn stop(&mut self, instance: SlotRef, _transition: TransitionKind) {
            if let Some(blip) = self.instances.get_mut(instance) {
                blip.running = false;
            }
        }

        fn is_active(&self, instance: SlotRef) -> bool {
            self.instances.get(instance).is_some_and(|blip| blip.running)
                && self.recorder.borrow().ticks <= self.life_ticks
        }

        fn update(&mut self, _instance: SlotRef, dt: f32, params: &EffectParams) -> bool {
            let mut recorder = self.recorder.borrow_mut();
            recorder.dts.push(dt);
            recorder.data_seen.push(params.num_data());
            recorder.events.push("update");
            true
        }
    }

    #[derive(Debug)]
    struct Marker;

    impl EffectData for Marker {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn blip() -> Tag {
        Tag::new("blip")
    }

    fn manager_with_blips(life_ticks: u32) -> (EffectsManager, Rc<RefCell<Recorder>>) {
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let mut manager = EffectsManager::new();
        manager.register_type(
            EffectTypeId::EXAMPLE,
            Blips::boxed(&recorder, &["blip", "flash"], life_ticks),
            "blip",
            "blips",
        );
        (manager, recorder)
    }

    #[test]
    fn unknown_effect_names_create_nothing() {
        let (mut manager, recorder) = manager_with_blips(10);
        assert!(manager.create_instance(Tag::new("nope")).is_null());
        assert_eq!(manager.num_instances(), 0);
        assert_eq!(recorder.borrow().created, 0);
    }

    #[test]
    fn instances_map_onto_plugin_instances() {
        let (mut manager, recorder) = manager_with_blips(10);
        let instance = manager.create_instance(blip());

        assert!(!instance.is_null());
        assert_eq!(manager.num_instances(), 1);
        assert_eq!(manager.effect_tag(instance), blip());
        assert!(manager.is_active(instance));
        assert_eq!(recorder.borrow().created, 1);

        assert!(manager.destroy_instance(instance));
        assert!(!manager.destroy_instance(instance));
        assert_eq!(recorder.borrow().destroyed, 1);
        assert_eq!(manager.num_instances(), 0);
    }

    #[test]
    fn stale_refs_are_inert() {
        let (mut manager, _recorder) = manager_with_blips(10);
        let stale = manager.create_instance(blip());
        manager.destroy_instance(stale);
        let live = manager.create_instance(blip());
        assert_eq!(live.index(), stale.index());

        manager.set_paused(stale, true);
        manager.set_effect_transform(stale, Transform::from_translation(Vector3::x()));
        manager.stop_effect(stale);

        assert!(!manager.paused(live));
        assert_eq!(manager.effect_transform(live), Transform::identity());
        assert!(manager.is_active(live));
        assert!(manager.effect_tag(stale).is_null());
        assert!(!manager.visible(stale));
        assert!(manager.params(stale).is_none());
        assert!(!manager.destroy_instance(SlotRef::NULL));
    }

    #[test]
    fn one_shot_instances_are_destroyed_once_inactive() {
        let (mut manager, recorder) = manager_with_blips(3);
        let instance = manager.create_one_shot_instance(blip());

        for _ in 0..3 {
            manager.update(0.1, 0.1);
            assert_eq!(manager.effect_tag(instance), blip());
        }

        manager.update(0.1, 0.1);
        assert!(manager.effect_tag(instance).is_null());
        assert_eq!(manager.num_instances(), 0);
        assert_eq!(recorder.borrow().destroyed, 1);
        assert_eq!(recorder.borrow().dts.len(), 3);
    }

    #[test]
    fn paused_instances_receive_no_time() {
        let (mut manager, recorder) = manager_with_blips(100);
        let paused = manager.create_instance(blip());
        let real_time = manager.create_instance(blip());
        manager.create_instance(blip());
        manager.set_paused(paused, true);
        manager.set_real_time(real_time, true);

        manager.update(0.5, 0.25);
        manager.update(0.5, 0.0);

        assert!(manager.paused(paused));
        assert!(manager.real_time(real_time));
        let recorder = recorder.borrow();
        assert_eq!(recorder.dts, vec![0.5, 0.25, 0.5, 0.0]);
        assert_eq!(recorder.effect_transforms.len(), 6);
    }

    #[test]
    fn effect_transforms_include_the_global_transform() {
        let (mut manager, recorder) = manager_with_blips(100);
        let instance = manager.create_instance(blip());
        manager.settings_mut().transform =
            Transform::from_translation(Vector3::new(1.0, 0.0, 0.0)).with_scale(2.0);
        manager.set_effect_transform(instance, Transform::from_translation(Vector3::new(0.0, 1.0, 0.0)));

        manager.update(0.1, 0.1);

        let pushed = recorder.borrow().effect_transforms[0];
        assert_relative_eq!(pushed.translation.x, 1.0);
        assert_relative_eq!(pushed.translation.y, 2.0);
        assert_relative_eq!(pushed.scale, 2.0);
        assert_eq!(
            manager.effect_transform(instance).translation,
            Vector3::new(0.0, 1.0, 0.0)
        );
    }

    #[test]
    fn instance_updates_run_between_pre_and_post() {
        let (mut manager, recorder) = manager_with_blips(100);
        manager.create_instance(blip());
        manager.create_instance(Tag::new("flash"));

        manager.update(0.1, 0.1);
        assert_eq!(recorder.borrow().events, vec!["pre", "update", "update", "post"]);
    }

    #[test]
    fn disabled_manager_skips_updates() {
        let (mut manager, recorder) = manager_with_blips(100);
        manager.create_instance(blip());
        manager.set_enabled(false);

        manager.update(0.1, 0.1);
        assert!(recorder.borrow().events.is_empty());
    }

    #[test]
    fn destroy_on_stop_waits_for_the_effect_to_stop() {
        let (mut manager, _recorder) = manager_with_blips(100);
        let running = manager.create_instance(blip());
        assert!(!manager.destroy_instance_on_stop(running));

        manager.update(0.1, 0.1);
        assert_eq!(manager.effect_tag(running), blip());

        manager.stop_effect(running);
        manager.update(0.1, 0.1);
        assert!(manager.effect_tag(running).is_null());

        let stopped = manager.create_instance(blip());
        manager.stop_sources(stopped);
        assert!(manager.destroy_instance_on_stop(stopped));
        assert_eq!(manager.num_instances(), 0);
    }

    #[test]
    fn bulk_create_and_destroy_line_up() {
        let (mut manager, recorder) = manager_with_blips(100);
        let sparks = Rc::new(RefCell::new(Recorder::default()));
        let external = EffectTypeId::external(0).unwrap();
        manager.register_type(external, Blips::boxed(&sparks, &["spark"], 100), "spark", "sparks");

        let tags = [blip(), Tag::new("spark"), Tag::new("nope"), Tag::new("flash")];
        let mut refs = manager.create_instances(&tags);

        assert_eq!(refs.len(), tags.len());
        assert!(refs[2].is_null());
        for (slot_ref, tag) in refs.iter().zip(&tags) {
            if !slot_ref.is_null() {
                assert_eq!(manager.effect_tag(*slot_ref), *tag);
            }
        }
        assert_eq!(recorder.borrow().created, 2);
        assert_eq!(sparks.borrow().created, 1);

        let stale = refs[0];
        manager.destroy_instance(stale);
        manager.destroy_instances(&mut refs);

        assert_eq!(refs[0], stale);
        assert!(refs[1..].iter().all(|slot_ref| slot_ref.is_null()));
        assert_eq!(manager.num_instances(), 0);
        assert_eq!(sparks.borrow().destroyed, 1);
    }

    #[test]
    fn remove_all_destroys_each_plugin_instance_once() {
        let (mut manager, recorder) = manager_with_blips(100);
        let first = manager.create_instance(blip());
        let second = manager.create_instance(blip());
        manager.create_instance(blip());
        manager.destroy_instance(second);

        manager.remove_all_instances();

        {
            let recorder = recorder.borrow();
            assert_eq!(recorder.destroyed, 3);
            assert_eq!(recorder.destroy_calls, 3);
        }
        assert_eq!(manager.num_instances(), 0);

        let fresh = manager.create_instance(blip());
        assert_ne!(fresh, first);
        assert!(manager.effect_tag(first).is_null());
    }

    #[test]
    fn registering_over_a_type_shuts_the_old_one_down() {
        let (mut manager, recorder) = manager_with_blips(100);
        let instance = manager.create_instance(blip());

        let replacement = Rc::new(RefCell::new(Recorder::default()));
        manager.register_type(
            EffectTypeId::EXAMPLE,
            Blips::boxed(&replacement, &["blip"], 100),
            "blip",
            "",
        );

        assert_eq!(recorder.borrow().shutdowns, 1);
        assert_eq!(recorder.borrow().destroyed, 1);
        assert!(!manager.is_active(instance));

        let context = replacement.borrow().context;
        assert_eq!(context.map(|c| c.set_tag), Some(Tag::new("blip")));
        assert_eq!(context.map(|c| c.type_id), Some(EffectTypeId::EXAMPLE));
        assert_eq!(manager.effect_type_from_tag(blip()), Some(EffectTypeId::EXAMPLE));
        assert_eq!(manager.effect_type_tag(EffectTypeId::EXAMPLE), blip());
        assert_eq!(manager.effect_type_name(EffectTypeId::EXAMPLE), Some("blip"));
        assert!(manager.effect_type(EffectTypeId::PARTICLES).is_none());
    }

    #[test]
    fn records_bound_to_a_replaced_type_never_reach_the_new_one() {
        let (mut manager, _recorder) = manager_with_blips(100);
        let old = manager.create_one_shot_instance(blip());
        let kept = manager.create_instance(blip());

        let replacement = Rc::new(RefCell::new(Recorder::default()));
        manager.register_type(
            EffectTypeId::EXAMPLE,
            Blips::boxed(&replacement, &["blip"], 100),
            "blip",
            "blips",
        );

        let fresh = manager.create_instance(blip());
        manager.start_effect(fresh);

        manager.start_effect(kept);
        manager.stop_effect(kept);
        assert!(manager.destroy_instance(kept));
        assert!(manager.is_active(fresh));

        manager.update(0.1, 0.1);
        assert!(manager.effect_tag(old).is_null());
        assert!(manager.is_active(fresh));

        manager.remove_all_instances();
        let recorder = replacement.borrow();
        assert_eq!(recorder.created, 1);
        assert_eq!(recorder.destroy_calls, 1);
        assert_eq!(recorder.destroyed, 1);
    }

    #[test]
    fn effect_config_returns_the_source_definition() {
        let mut manager = EffectsManager::with_builtin_types();
        let config = json!({ "screens": { "flash": { "life": 0.25, "mode": "add" } } });
        manager.load_definitions(config.as_object().unwrap());

        let flash = manager.create_instance(Tag::new("flash"));
        assert_eq!(
            manager.effect_config(flash).and_then(|c| c.get("mode")),
            Some(&json!("add"))
        );

        manager.destroy_instance(flash);
        assert!(manager.effect_config(flash).is_none());
        assert!(manager.effect_config(SlotRef::NULL).is_none());
    }

    #[test]
    fn physics_controllers_are_found_by_tag() {
        let mut manager = EffectsManager::with_builtin_types();
        assert!(manager.physics_controller(Tag::new("plane")).is_some());
        assert!(manager.physics_controller(Tag::new("bounce")).is_none());

        let floor = Arc::new(PlaneCollider {
            normal: Vector3::y(),
            d: 1.0,
        });
        manager.register_physics_controller(Tag::new("floor"), floor);

        let controller = manager.physics_controller(Tag::new("floor"));
        let mut positions = [Vector3::new(0.0, -3.0, 0.0)];
        let mut velocities = [Vector3::new(0.0, -1.0, 0.0)];
        if let Some(controller) = controller {
            controller.update(&Transform::identity(), &[0.1], &mut positions, &mut velocities);
        }

        assert_relative_eq!(positions[0].y, -1.0);
        assert_relative_eq!(velocities[0].y, 0.0);
    }

    #[test]
    fn definitions_are_routed_by_set_name() {
        let (mut manager, recorder) = manager_with_blips(100);
        let config = json!({
            "blips": { "b": {}, "a": {} },
            "others": { "c": {} },
        });

        manager.load_definitions(config.as_object().unwrap());

        let mut configured = recorder.borrow().configured.clone();
        configured.sort();
        assert_eq!(configured, vec!["a", "b"]);
    }

    #[test]
    fn attached_data_lasts_one_tick() {
        let (mut manager, recorder) = manager_with_blips(100);
        let instance = manager.create_instance(blip());
        let payload = Arc::new(Marker);

        manager.add_data(instance, payload.clone());
        manager.add_data(instance, payload.clone());
        assert_eq!(Arc::strong_count(&payload), 3);

        manager.update(0.1, 0.1);

        assert_eq!(recorder.borrow().data_seen, vec![2]);
        assert_eq!(Arc::strong_count(&payload), 1);
        assert_eq!(manager.params(instance).map(|p| p.has_data()), Some(false));

        manager.destroy_instance(instance);
        manager.add_data(instance, payload.clone());
        assert_eq!(Arc::strong_count(&payload), 1);
    }

    #[test]
    fn params_and_visibility_are_per_instance() {
        let (mut manager, _recorder) = manager_with_blips(100);
        let a = manager.create_instance(blip());
        let b = manager.create_instance(blip());

        if let Some(params) = manager.params_mut(a) {
            params.set(ParamChannel::Alpha, 0.5_f32);
        }
        manager.set_visible(b, false);

        assert_eq!(manager.params(a).map(|p| p.scalar(ParamChannel::Alpha, 1.0)), Some(0.5));
        assert_eq!(manager.params(b).map(|p| p.scalar(ParamChannel::Alpha, 1.0)), Some(1.0));
        assert!(manager.visible(a));
        assert!(!manager.visible(b));
    }

    #[test]
    fn capacity_limit_refuses_new_instances() {
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let mut manager = EffectsManager::with_capacity_limit(1);
        manager.register_type(EffectTypeId::EXAMPLE, Blips::boxed(&recorder, &["blip"], 100), "blip", "blips");

        assert!(!manager.create_instance(blip()).is_null());
        assert!(manager.create_instance(blip()).is_null());
        assert_eq!(recorder.borrow().created, 1);
    }

    #[test]
    fn stats_list_busy_types() {
        let (mut manager, _recorder) = manager_with_blips(100);
        let idle = manager.create_instance(blip());
        manager.create_instance(blip());
        manager.stop_effect(idle);

        assert_eq!(manager.stats_string(), "0.0 mspf, 1/2 blips");
    }

    #[test]
    fn shutdown_releases_everything() {
        let (mut manager, recorder) = manager_with_blips(100);
        manager.create_instance(blip());

        manager.shutdown();

        assert_eq!(manager.num_instances(), 0);
        assert!(manager.effect_type(EffectTypeId::EXAMPLE).is_none());
        assert_eq!(recorder.borrow().shutdowns, 1);
        assert_eq!(recorder.borrow().destroyed, 1);
    }
}
