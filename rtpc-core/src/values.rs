//! Stored game-parameter values and the fallback chain used to resolve them.

use std::collections::HashMap;

use rtpc_types::{ParamId, RtpcKey, SourceKind};

use crate::config::DefaultValues;
use crate::error::RtpcResult;
use crate::store::ScopedValueStore;

/// Base value of a game parameter at one scope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RtpcValue {
    pub value: f32,
}

pub type ValueStore = ScopedValueStore<RtpcKey, RtpcValue>;

/// Resolves parameters that have no stored values of their own, such as
/// modulator outputs driven by another collaborator.
pub trait AutomatedParams: Send {
    fn supports(&self, param: ParamId) -> bool;

    /// Current value of `param` for `key`, if the collaborator has one.
    fn value(&self, param: ParamId, key: &RtpcKey) -> Option<f32>;
}

/// One value store per parameter plus the defaults table.
pub(crate) struct ParamValues {
    stores: HashMap<ParamId, ValueStore>,
    defaults: DefaultValues,
    automated: Option<Box<dyn AutomatedParams>>,
}

impl ParamValues {
    pub fn new(defaults: DefaultValues) -> Self {
        Self {
            stores: HashMap::new(),
            defaults,
            automated: None,
        }
    }

    pub fn set_automated(&mut self, automated: Box<dyn AutomatedParams>) {
        self.automated = Some(automated);
    }

    pub fn defaults(&self) -> &DefaultValues {
        &self.defaults
    }

    pub fn store(&self, param: ParamId) -> Option<&ValueStore> {
        self.stores.get(&param)
    }

    /// Params that currently hold at least one value.
    pub fn params(&self) -> Vec<ParamId> {
        self.stores.keys().copied().collect()
    }

    pub fn exact(&self, param: ParamId, key: &RtpcKey) -> Option<f32> {
        self.stores
            .get(&param)
            .and_then(|s| s.find_exact(key))
            .map(|v| v.value)
    }

    /// Most specific stored value for `key` and the scope it lives at.
    pub fn best_match(&self, param: ParamId, key: &RtpcKey) -> Option<(f32, RtpcKey)> {
        let store = self.stores.get(&param)?;
        let mut scope = *key;
        store.find_best_match(&mut scope).map(|v| (v.value, scope))
    }

    /// Stored value, else the default. The default reports the global scope.
    pub fn query(&self, param: ParamId, key: &RtpcKey) -> (f32, RtpcKey) {
        self.best_match(param, key)
            .unwrap_or_else(|| (self.defaults.value(param), RtpcKey::any()))
    }

    /// Raw input for one curve binding. Game parameters prefer the store,
    /// modulators prefer the automation collaborator; both end at the default.
    pub fn resolve(&self, source: ParamId, kind: SourceKind, key: &RtpcKey) -> f32 {
        let stored = || self.best_match(source, key).map(|(v, _)| v);
        let automated = || {
            self.automated
                .as_ref()
                .filter(|a| a.supports(source))
                .and_then(|a| a.value(source, key))
        };
        let found = match kind {
            SourceKind::GameParameter => stored().or_else(automated),
            SourceKind::Modulator => automated().or_else(stored),
        };
        found.unwrap_or_else(|| self.defaults.value(source))
    }

    pub fn write(&mut self, param: ParamId, key: &RtpcKey, value: f32) -> RtpcResult {
        if !self.stores.contains_key(&param) {
            self.stores.try_reserve(1)?;
        }
        let slot = self
            .stores
            .entry(param)
            .or_default()
            .get_or_insert_with(key, || RtpcValue { value });
        slot.value = value;
        Ok(())
    }

    /// Remove every value of `param` matching `pattern`. Stores left empty
    /// are dropped.
    pub fn remove_all(&mut self, param: ParamId, pattern: &RtpcKey) -> usize {
        let Some(store) = self.stores.get_mut(&param) else {
            return 0;
        };
        let removed = store.remove_all(pattern);
        if store.is_empty() {
            self.stores.remove(&param);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtpc_types::{GameObjectId, PlayingId, ValueKind};

    struct Lfo;
    impl AutomatedParams for Lfo {
        fn supports(&self, param: ParamId) -> bool {
            param == ParamId::MODULATOR_RATE
        }
        fn value(&self, _: ParamId, _: &RtpcKey) -> Option<f32> {
            Some(0.75)
        }
    }

    fn obj(id: u64) -> RtpcKey {
        RtpcKey::for_object(GameObjectId::new(id))
    }

    #[test]
    fn query_falls_back_to_default_at_global_scope() {
        let mut defaults = DefaultValues::new();
        defaults.set(ParamId::VOLUME, -3.0, ValueKind::Continuous);
        let mut values = ParamValues::new(defaults);

        assert_eq!(values.query(ParamId::VOLUME, &obj(1)), (-3.0, RtpcKey::any()));

        values.write(ParamId::VOLUME, &obj(1), 0.5).unwrap();
        let deep = obj(1).with_playing(PlayingId::new(4));
        assert_eq!(values.query(ParamId::VOLUME, &deep), (0.5, obj(1)));
        assert_eq!(values.exact(ParamId::VOLUME, &deep), None);
    }

    #[test]
    fn resolve_order_depends_on_source_kind() {
        let mut values = ParamValues::new(DefaultValues::new());
        values.set_automated(Box::new(Lfo));
        let rate = ParamId::MODULATOR_RATE;

        assert_eq!(values.resolve(rate, SourceKind::GameParameter, &obj(1)), 0.75);
        values.write(rate, &obj(1), 0.1).unwrap();
        assert_eq!(values.resolve(rate, SourceKind::GameParameter, &obj(1)), 0.1);
        assert_eq!(values.resolve(rate, SourceKind::Modulator, &obj(1)), 0.75);

        // Unsupported and unset: default
        assert_eq!(values.resolve(ParamId::PITCH, SourceKind::Modulator, &obj(1)), 0.0);
    }

    #[test]
    fn empty_stores_are_dropped() {
        let mut values = ParamValues::new(DefaultValues::new());
        values.write(ParamId::VOLUME, &obj(1), 1.0).unwrap();
        values.write(ParamId::VOLUME, &obj(2), 1.0).unwrap();

        assert_eq!(values.remove_all(ParamId::VOLUME, &obj(1)), 1);
        assert!(values.store(ParamId::VOLUME).is_some());
        assert_eq!(values.remove_all(ParamId::VOLUME, &RtpcKey::any()), 1);
        assert!(values.store(ParamId::VOLUME).is_none());
        assert_eq!(values.remove_all(ParamId::PITCH, &RtpcKey::any()), 0);
    }

    #[test]
    fn write_overwrites_in_place() {
        let mut values = ParamValues::new(DefaultValues::new());
        values.write(ParamId::VOLUME, &obj(1), 1.0).unwrap();
        values.write(ParamId::VOLUME, &obj(1), 0.5).unwrap();
        assert_eq!(values.exact(ParamId::VOLUME, &obj(1)), Some(0.5));
        assert_eq!(values.store(ParamId::VOLUME).map(|s| s.len()), Some(1));
    }
}
