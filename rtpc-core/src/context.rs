//! `RtpcContext`: the engine facade owning every store, registry and target.
//!
//! All operations run on the caller's thread; the context is meant to sit
//! behind one coarse lock shared by the game-side writers and the render
//! pass. Nothing here blocks, and ramps only advance on [`RtpcContext::tick`].

use std::collections::HashMap;
use std::time::Duration;

use rtpc_types::{
    Accumulation, Conversion, CurveId, GameObjectId, ParamBits, ParamId, RtpcKey, SourceKind,
    SubscriberId, SubscriberKind, TransitionParams, ValueKind,
};

use crate::config::Config;
use crate::directory::TargetDirectory;
use crate::dispatch::{fan_out, sort_by_priority, PendingDispatch, StoreExceptionChecker};
use crate::error::{RtpcError, RtpcResult};
use crate::registry::{CurveBinding, Subscription, SubscriptionRegistry};
use crate::targets::{ParameterTarget, TargetEntry, TargetHandle, TargetTable};
use crate::telemetry::{LogObserver, NullObserver, RtpcObserver};
use crate::transition::Transitions;
use crate::values::{AutomatedParams, ParamValues};

struct SubscriberNode {
    kind: SubscriberKind,
    parent: Option<SubscriberId>,
    directory: TargetDirectory,
}

/// A target reached by a removal, with its converted value beforehand.
struct Reached {
    handle: TargetHandle,
    key: RtpcKey,
    before: f32,
}

pub struct RtpcContext {
    config: Config,
    values: ParamValues,
    registry: SubscriptionRegistry,
    subscribers: HashMap<SubscriberId, SubscriberNode>,
    next_subscriber: u32,
    targets: TargetTable,
    transitions: Transitions,
    observer: Box<dyn RtpcObserver>,
}

impl RtpcContext {
    pub fn new(config: Config) -> Self {
        let observer: Box<dyn RtpcObserver> = if config.telemetry_enabled() {
            Box::new(LogObserver)
        } else {
            Box::new(NullObserver)
        };
        Self {
            values: ParamValues::new(config.defaults().clone()),
            transitions: Transitions::new(config.min_ramp_duration())
                .with_default_curve(config.default_transition_curve()),
            registry: SubscriptionRegistry::new(),
            subscribers: HashMap::new(),
            next_subscriber: 1,
            targets: TargetTable::new(),
            observer,
            config,
        }
    }

    pub fn with_observer(mut self, observer: impl RtpcObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn with_automated_params(mut self, automated: impl AutomatedParams + 'static) -> Self {
        self.values.set_automated(Box::new(automated));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ─── Subscribers ───────────────────────────────────────────────────

    pub fn add_subscriber(&mut self, kind: SubscriberKind) -> RtpcResult<SubscriberId> {
        self.subscribers.try_reserve(1)?;
        let id = SubscriberId::new(self.next_subscriber);
        self.next_subscriber += 1;
        self.subscribers.insert(
            id,
            SubscriberNode {
                kind,
                parent: None,
                directory: TargetDirectory::new(),
            },
        );
        log::debug!(target: "rtpc::context", "subscriber {} added ({:?})", id, kind);
        Ok(id)
    }

    pub fn subscriber_kind(&self, subscriber: SubscriberId) -> Option<SubscriberKind> {
        self.subscribers.get(&subscriber).map(|n| n.kind)
    }

    /// Attach `child` under `parent` in the bus hierarchy, or detach it with
    /// `None`. Targets registered with `propagate` through `child` move to
    /// the new chain of ancestors.
    pub fn set_subscriber_parent(
        &mut self,
        child: SubscriberId,
        parent: Option<SubscriberId>,
    ) -> RtpcResult {
        if !self.subscribers.contains_key(&child) {
            return Err(RtpcError::UnknownSubscriber(child));
        }
        if let Some(parent) = parent {
            if !self.subscribers.contains_key(&parent) {
                return Err(RtpcError::UnknownSubscriber(parent));
            }
            if self.levels(parent).contains(&child) {
                return Err(RtpcError::HierarchyCycle { child, parent });
            }
        }
        let previous = self.subscribers.get(&child).and_then(|n| n.parent);
        self.reparent(child, parent);
        if let Err(e) = self.relevel_targets(child) {
            self.reparent(child, previous);
            if let Err(undo) = self.relevel_targets(child) {
                log::warn!(target: "rtpc::context", "restoring levels under {} failed: {}", child, undo);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Drop a subscriber, its subscriptions and its directory. Children are
    /// detached; targets stay registered on their other levels.
    pub fn remove_subscriber(&mut self, subscriber: SubscriberId) -> bool {
        if self.subscribers.remove(&subscriber).is_none() {
            return false;
        }
        let dropped = self.registry.remove_subscriber(subscriber);
        for node in self.subscribers.values_mut() {
            if node.parent == Some(subscriber) {
                node.parent = None;
            }
        }
        for (_, entry) in self.targets.iter_mut() {
            entry.roots.retain(|r| *r != subscriber);
        }
        log::debug!(
            target: "rtpc::context",
            "subscriber {} removed with {} subscriptions",
            subscriber,
            dropped
        );
        true
    }

    // ─── Subscriptions ─────────────────────────────────────────────────

    /// Bind `curve_id` of (subscriber, param) to the `source` parameter.
    /// Re-subscribing the same curve id replaces its binding.
    #[allow(clippy::too_many_arguments)]
    pub fn subscribe(
        &mut self,
        subscriber: SubscriberId,
        param: ParamId,
        curve_id: CurveId,
        accumulation: Accumulation,
        scope: RtpcKey,
        source: ParamId,
        source_kind: SourceKind,
        converter: impl Conversion + 'static,
    ) -> RtpcResult {
        if !ParamBits::fits(param) {
            return Err(RtpcError::ParamOutOfRange(param));
        }
        if !self.subscribers.contains_key(&subscriber) {
            return Err(RtpcError::UnknownSubscriber(subscriber));
        }

        let binding = CurveBinding::new(curve_id, source, source_kind, Box::new(converter));
        let created = self
            .registry
            .subscribe(subscriber, param, accumulation, scope, binding)?;
        if created {
            if let Some(node) = self.subscribers.get_mut(&subscriber) {
                node.directory.set_available(param, true);
            }
            if let Err(e) = self.refresh_directory(subscriber) {
                self.registry.unsubscribe(subscriber, param);
                self.disable_param(subscriber, param);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Remove every curve of (subscriber, param).
    pub fn unsubscribe(&mut self, subscriber: SubscriberId, param: ParamId) -> bool {
        let existed = self.registry.unsubscribe(subscriber, param);
        if existed {
            self.disable_param(subscriber, param);
        }
        existed
    }

    /// Remove one curve; returns whether the subscription has curves left.
    pub fn unsubscribe_curve(
        &mut self,
        subscriber: SubscriberId,
        param: ParamId,
        curve_id: CurveId,
    ) -> bool {
        let remaining = self.registry.unsubscribe_curve(subscriber, param, curve_id);
        if !remaining && self.registry.get(subscriber, param).is_none() {
            self.disable_param(subscriber, param);
        }
        remaining
    }

    /// A subscription is active once its subscriber has a registered target.
    pub fn is_active(&self, subscriber: SubscriberId, param: ParamId) -> bool {
        self.registry.get(subscriber, param).is_some()
            && self
                .subscribers
                .get(&subscriber)
                .is_some_and(|n| !n.directory.is_empty())
    }

    // ─── Values ────────────────────────────────────────────────────────

    /// Set the base value of `param` at `key`'s exact scope.
    ///
    /// Continuous params ramp when `transition` asks for it; a ramp already
    /// running on the same (param, key) is replaced. Discrete params always
    /// snap to the nearest whole value.
    pub fn set_value(
        &mut self,
        param: ParamId,
        value: f32,
        key: &RtpcKey,
        transition: TransitionParams,
    ) -> RtpcResult {
        let discrete = self.values.defaults().kind(param) == ValueKind::Discrete;
        if discrete {
            self.transitions.cancel(param, key);
            return self.apply_value(param, key, value.round());
        }

        let from = self
            .values
            .exact(param, key)
            .unwrap_or_else(|| self.values.query(param, key).0);
        if self.transitions.start(param, key, from, value, &transition) {
            return Ok(());
        }
        self.apply_value(param, key, value)
    }

    /// Advance every ramp by `elapsed` and apply the resulting steps.
    pub fn tick(&mut self, elapsed: Duration) -> RtpcResult {
        for step in self.transitions.update(elapsed) {
            self.apply_value(step.param, &step.key, step.value)?;
            if step.done {
                self.observer
                    .log_transition_done(step.param, &step.key, step.value);
            }
        }
        Ok(())
    }

    pub fn is_ramping(&self, param: ParamId, key: &RtpcKey) -> bool {
        self.transitions.is_ramping(param, key)
    }

    /// Pull path: the converted value of (subscriber, param) at `key`. Falls
    /// back to the default of `param` when there is no subscription.
    pub fn converted_value(&self, subscriber: SubscriberId, param: ParamId, key: &RtpcKey) -> f32 {
        match self.registry.get(subscriber, param) {
            Some(sub) => converted(&self.values, sub, key),
            None => self.values.defaults().value(param),
        }
    }

    /// Raw base value in effect for `key` and the scope it was found at.
    pub fn query_value(&self, param: ParamId, key: &RtpcKey) -> (f32, RtpcKey) {
        self.values.query(param, key)
    }

    /// Remove every stored value of `param` matching `pattern`, cancel the
    /// matching ramps and re-notify targets with the fallback value.
    pub fn remove_all_values_matching(
        &mut self,
        param: ParamId,
        pattern: &RtpcKey,
    ) -> RtpcResult<usize> {
        self.transitions.cancel_matching(param, pattern);
        if self.values.store(param).is_none() {
            return Ok(0);
        }

        let pending = self.collect_pending(param, pattern)?;
        let reached = self.collect_reached(&pending, pattern)?;
        let removed = self.values.remove_all(param, pattern);
        if removed == 0 {
            return Ok(0);
        }
        self.renotify(&pending, reached, pattern);

        log::debug!(
            target: "rtpc::context",
            "removed {} values of param {} matching {}",
            removed,
            param,
            pattern
        );
        Ok(removed)
    }

    /// Remove every value scoped to `game_object`, across all params.
    pub fn remove_game_object(&mut self, game_object: GameObjectId) -> RtpcResult<usize> {
        let pattern = RtpcKey::for_object(game_object);
        self.transitions.cancel_all_matching(&pattern);
        let mut removed = 0;
        for param in self.values.params() {
            removed += self.remove_all_values_matching(param, &pattern)?;
        }
        Ok(removed)
    }

    // ─── Targets ───────────────────────────────────────────────────────

    /// Register `target` at `key` on `root`, and on every ancestor of `root`
    /// when `propagate` is set. The target only hears about params it wants
    /// that each level subscribes to.
    pub fn register_parameter_target(
        &mut self,
        target: Box<dyn ParameterTarget>,
        key: RtpcKey,
        wanted: ParamBits,
        root: SubscriberId,
        propagate: bool,
    ) -> RtpcResult<TargetHandle> {
        if !self.subscribers.contains_key(&root) {
            return Err(RtpcError::UnknownSubscriber(root));
        }
        let levels = if propagate {
            self.levels(root)
        } else {
            vec![root]
        };

        let handle = self.targets.insert(TargetEntry {
            key,
            wanted: wanted.clone(),
            target,
            roots: levels.clone(),
            propagate,
        })?;

        for (i, level) in levels.iter().enumerate() {
            let added = match self.subscribers.get_mut(level) {
                Some(node) => node.directory.add_target(handle, &key, &wanted),
                None => Ok(false),
            };
            if let Err(e) = added {
                for done in &levels[..i] {
                    if let Some(node) = self.subscribers.get_mut(done) {
                        node.directory.remove_target(handle, &key);
                    }
                }
                self.targets.remove(handle);
                return Err(e);
            }
        }

        log::debug!(
            target: "rtpc::context",
            "target {:?} at {} registered on {} levels",
            handle,
            key,
            levels.len()
        );
        Ok(handle)
    }

    /// Detach a target from every level it was registered on and hand it back.
    pub fn unregister_parameter_target(
        &mut self,
        handle: TargetHandle,
    ) -> RtpcResult<Box<dyn ParameterTarget>> {
        let Some(entry) = self.targets.remove(handle) else {
            log::debug!(target: "rtpc::context", "unregister of unknown target {:?}", handle);
            return Err(RtpcError::StaleTarget(handle));
        };
        for level in &entry.roots {
            if let Some(node) = self.subscribers.get_mut(level) {
                node.directory.remove_target(handle, &entry.key);
            }
        }
        Ok(entry.target)
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Whether `subscriber`'s directory currently holds `handle`.
    pub fn has_target(&self, subscriber: SubscriberId, handle: TargetHandle) -> bool {
        match (self.subscribers.get(&subscriber), self.targets.get(handle)) {
            (Some(node), Some(entry)) => node.directory.contains(handle, &entry.key),
            _ => false,
        }
    }

    // ─── Internals ─────────────────────────────────────────────────────

    /// `subscriber` followed by its ancestors, nearest first.
    fn levels(&self, subscriber: SubscriberId) -> Vec<SubscriberId> {
        let mut levels = vec![subscriber];
        let mut current = self.subscribers.get(&subscriber).and_then(|n| n.parent);
        while let Some(id) = current {
            if levels.contains(&id) {
                debug_assert!(false, "cycle in subscriber hierarchy at {}", id);
                break;
            }
            levels.push(id);
            current = self.subscribers.get(&id).and_then(|n| n.parent);
        }
        levels
    }

    /// Re-run `add_target` for every target registered on `subscriber` so
    /// its directory reflects the subscriber's current params.
    fn refresh_directory(&mut self, subscriber: SubscriberId) -> RtpcResult {
        let Some(node) = self.subscribers.get_mut(&subscriber) else {
            return Ok(());
        };
        for (handle, entry) in self.targets.iter() {
            if entry.roots.contains(&subscriber) {
                node.directory.add_target(handle, &entry.key, &entry.wanted)?;
            }
        }
        Ok(())
    }

    fn disable_param(&mut self, subscriber: SubscriberId, param: ParamId) {
        if let Some(node) = self.subscribers.get_mut(&subscriber) {
            node.directory.set_available(param, false);
        }
        // Shrinking only removes entries, so this cannot allocate
        if let Err(e) = self.refresh_directory(subscriber) {
            log::warn!(target: "rtpc::context", "directory refresh for {} failed: {}", subscriber, e);
        }
    }

    fn reparent(&mut self, child: SubscriberId, parent: Option<SubscriberId>) {
        if let Some(node) = self.subscribers.get_mut(&child) {
            node.parent = parent;
        }
    }

    /// Move every propagated target registered through `child` onto
    /// `child`'s current chain of ancestors.
    fn relevel_targets(&mut self, child: SubscriberId) -> RtpcResult {
        let chain = self.levels(child);
        let affected: Vec<TargetHandle> = self
            .targets
            .iter()
            .filter(|(_, e)| e.propagate && e.roots.contains(&child))
            .map(|(h, _)| h)
            .collect();
        for handle in affected {
            self.relevel_target(handle, child, &chain)?;
        }
        Ok(())
    }

    fn relevel_target(
        &mut self,
        handle: TargetHandle,
        child: SubscriberId,
        chain: &[SubscriberId],
    ) -> RtpcResult {
        let Some(entry) = self.targets.get(handle) else {
            return Ok(());
        };
        let Some(pos) = entry.roots.iter().position(|r| *r == child) else {
            return Ok(());
        };
        let mut roots = Vec::new();
        roots.try_reserve(pos + chain.len())?;
        roots.extend_from_slice(&entry.roots[..pos]);
        roots.extend_from_slice(chain);

        let added: Vec<SubscriberId> = roots
            .iter()
            .filter(|l| !entry.roots.contains(l))
            .copied()
            .collect();
        let dropped: Vec<SubscriberId> = entry
            .roots
            .iter()
            .filter(|l| !roots.contains(l))
            .copied()
            .collect();
        let (key, wanted) = (entry.key, entry.wanted.clone());

        for (i, level) in added.iter().enumerate() {
            let result = match self.subscribers.get_mut(level) {
                Some(node) => node.directory.add_target(handle, &key, &wanted),
                None => Ok(false),
            };
            if let Err(e) = result {
                for done in &added[..i] {
                    if let Some(node) = self.subscribers.get_mut(done) {
                        node.directory.remove_target(handle, &key);
                    }
                }
                return Err(e);
            }
        }
        for level in &dropped {
            if let Some(node) = self.subscribers.get_mut(level) {
                node.directory.remove_target(handle, &key);
            }
        }
        if let Some(entry) = self.targets.get_mut(handle) {
            entry.roots = roots;
        }
        Ok(())
    }

    /// Active subscriptions reading `source` that an update at `key`
    /// concerns, with their converted value before the change.
    fn collect_pending(&self, source: ParamId, key: &RtpcKey) -> RtpcResult<Vec<PendingDispatch>> {
        let mut pending = Vec::new();
        for sub in self.registry.subscriptions_for_source(source) {
            if !sub.applies_to(key) {
                continue;
            }
            let Some(node) = self.subscribers.get(&sub.subscriber()) else {
                continue;
            };
            if node.directory.is_empty() {
                continue;
            }
            pending.try_reserve(1)?;
            pending.push(PendingDispatch {
                kind: node.kind,
                subscriber: sub.subscriber(),
                param: sub.param(),
                value: converted(&self.values, sub, key),
                delta: 0.0,
            });
        }
        Ok(pending)
    }

    /// Replace the recorded old values with new ones and their deltas, then
    /// put the pass in priority order.
    fn finish_pending(&mut self, pending: &mut [PendingDispatch], key: &RtpcKey) {
        for p in pending.iter_mut() {
            if let Some(sub) = self.registry.get(p.subscriber, p.param) {
                let new = converted(&self.values, sub, key);
                p.delta = new - p.value;
                p.value = new;
                self.observer.log_rtpc(p.subscriber, p.param, key, new);
            }
        }
        sort_by_priority(pending);
    }

    /// Targets an update at `key` reaches for each pending subscription,
    /// with the converted value each of them currently resolves to.
    fn collect_reached(
        &self,
        pending: &[PendingDispatch],
        key: &RtpcKey,
    ) -> RtpcResult<Vec<Vec<Reached>>> {
        let mut reached = Vec::new();
        reached.try_reserve(pending.len())?;
        for p in pending {
            let mut hits = Vec::new();
            let (Some(node), Some(sub)) = (
                self.subscribers.get(&p.subscriber),
                self.registry.get(p.subscriber, p.param),
            ) else {
                reached.push(hits);
                continue;
            };
            hits.try_reserve(node.directory.len())?;
            node.directory.push_param_update(p.param, key, None, |handle| {
                if let Some(entry) = self.targets.get(handle) {
                    let before = converted(&self.values, sub, &entry.key);
                    hits.push(Reached {
                        handle,
                        key: entry.key,
                        before,
                    });
                }
            });
            reached.push(hits);
        }
        Ok(reached)
    }

    /// After a removal, hand every reached target the value its own key now
    /// resolves to. Targets whose value did not move are skipped.
    fn renotify(
        &mut self,
        pending: &[PendingDispatch],
        reached: Vec<Vec<Reached>>,
        pattern: &RtpcKey,
    ) {
        let mut work: Vec<(SubscriberKind, SubscriberId, ParamId, Vec<Reached>)> = pending
            .iter()
            .zip(reached)
            .map(|(p, hits)| (p.kind, p.subscriber, p.param, hits))
            .collect();
        work.sort_by_key(|(kind, sub, param, _)| (*kind, *sub, *param));

        for (_, subscriber, param, hits) in work {
            let Some(sub) = self.registry.get(subscriber, param) else {
                continue;
            };
            let at_pattern = converted(&self.values, sub, pattern);
            self.observer.log_rtpc(subscriber, param, pattern, at_pattern);
            let mut count = 0;
            for hit in hits {
                let value = converted(&self.values, sub, &hit.key);
                if value == hit.before {
                    continue;
                }
                if let Some(entry) = self.targets.get_mut(hit.handle) {
                    entry
                        .target
                        .update_target_param(param, value, value - hit.before);
                    count += 1;
                }
            }
            self.observer.log_dispatch(subscriber, param, count);
        }
    }

    /// Write one value and push it through every concerned subscription.
    fn apply_value(&mut self, param: ParamId, key: &RtpcKey, value: f32) -> RtpcResult {
        let mut pending = self.collect_pending(param, key)?;
        self.values.write(param, key, value)?;

        if self.values.defaults().kind(param) == ValueKind::Discrete {
            self.observer.log_state(param, key, value);
        } else {
            self.observer.log_base_value(param, key, value);
        }

        self.finish_pending(&mut pending, key);

        let Some(store) = self.values.store(param) else {
            return Ok(());
        };
        let checker = StoreExceptionChecker::new(store, *key);
        for p in &pending {
            let Some(node) = self.subscribers.get(&p.subscriber) else {
                continue;
            };
            let count = fan_out(&node.directory, &mut self.targets, p, key, Some(&checker));
            self.observer.log_dispatch(p.subscriber, p.param, count);
        }
        Ok(())
    }
}

fn converted(values: &ParamValues, sub: &Subscription, key: &RtpcKey) -> f32 {
    sub.converted_value(|curve| values.resolve(curve.source, curve.source_kind, key))
}
