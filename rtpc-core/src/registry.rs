//! Subscriptions: which subscriber consumes which parameter, through which
//! curves.
//!
//! A subscription is keyed by (subscriber, target param) and holds an
//! ordered list of curve bindings. Each binding reads one source parameter,
//! converts it, and the results are folded with the subscription's
//! accumulation policy. The registry also keeps a reverse index from source
//! parameter to subscriptions so a `set_value` only visits the
//! subscriptions that actually read that parameter.

use std::collections::HashMap;
use std::fmt;

use rtpc_types::{
    Accumulation, Conversion, CurveId, HierarchicalKey, ParamId, RtpcKey, SourceKind,
    SubscriberId,
};

use crate::error::RtpcResult;

/// One curve of a subscription.
pub struct CurveBinding {
    pub curve_id: CurveId,
    /// Parameter the curve reads
    pub source: ParamId,
    pub source_kind: SourceKind,
    converter: Box<dyn Conversion>,
}

impl CurveBinding {
    pub fn new(
        curve_id: CurveId,
        source: ParamId,
        source_kind: SourceKind,
        converter: Box<dyn Conversion>,
    ) -> Self {
        Self {
            curve_id,
            source,
            source_kind,
            converter,
        }
    }

    pub fn convert(&self, input: f32) -> f32 {
        self.converter.convert(input)
    }
}

impl fmt::Debug for CurveBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurveBinding")
            .field("curve_id", &self.curve_id)
            .field("source", &self.source)
            .field("source_kind", &self.source_kind)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct Subscription {
    subscriber: SubscriberId,
    param: ParamId,
    accumulation: Accumulation,
    scope: RtpcKey,
    curves: Vec<CurveBinding>,
}

impl Subscription {
    pub fn subscriber(&self) -> SubscriberId {
        self.subscriber
    }

    /// Target parameter this subscription produces.
    pub fn param(&self) -> ParamId {
        self.param
    }

    pub fn accumulation(&self) -> Accumulation {
        self.accumulation
    }

    pub fn scope(&self) -> &RtpcKey {
        &self.scope
    }

    pub fn curves(&self) -> &[CurveBinding] {
        &self.curves
    }

    pub fn reads(&self, source: ParamId) -> bool {
        self.curves.iter().any(|c| c.source == source)
    }

    /// Whether an update scoped to `key` concerns this subscription: every
    /// field concrete in both must agree.
    pub fn applies_to(&self, key: &RtpcKey) -> bool {
        self.scope.intersects(key)
    }

    /// Fold every curve's converted source value. `source_value` resolves
    /// the raw input of one binding.
    pub fn converted_value<F>(&self, mut source_value: F) -> f32
    where
        F: FnMut(&CurveBinding) -> f32,
    {
        self.curves.iter().fold(self.accumulation.base(), |acc, curve| {
            self.accumulation.combine(acc, curve.convert(source_value(curve)))
        })
    }
}

type SubscriptionKey = (SubscriberId, ParamId);

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    subscriptions: HashMap<SubscriptionKey, Subscription>,
    by_source: HashMap<ParamId, Vec<SubscriptionKey>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Add `curve` to the (subscriber, param) subscription, creating it if
    /// needed. A curve with the same id is replaced. The accumulation policy
    /// and scope of an existing subscription follow the latest call.
    /// Returns true if the subscription was created.
    pub fn subscribe(
        &mut self,
        subscriber: SubscriberId,
        param: ParamId,
        accumulation: Accumulation,
        scope: RtpcKey,
        curve: CurveBinding,
    ) -> RtpcResult<bool> {
        let key = (subscriber, param);
        let source = curve.source;
        let curve_id = curve.curve_id;

        // Reserve everything up front so a failure leaves nothing half-added
        self.subscriptions.try_reserve(1)?;
        self.by_source.try_reserve(1)?;
        let indexed = self
            .by_source
            .get(&source)
            .is_some_and(|subs| subs.contains(&key));
        if !indexed {
            if let Some(subs) = self.by_source.get_mut(&source) {
                subs.try_reserve(1)?;
            }
        }

        let created = !self.subscriptions.contains_key(&key);
        let sub = self.subscriptions.entry(key).or_insert_with(|| Subscription {
            subscriber,
            param,
            accumulation,
            scope,
            curves: Vec::new(),
        });
        sub.accumulation = accumulation;
        sub.scope = scope;

        let replaced = match sub.curves.iter().position(|c| c.curve_id == curve_id) {
            Some(i) => Some(std::mem::replace(&mut sub.curves[i], curve)),
            None => {
                if let Err(e) = sub.curves.try_reserve(1) {
                    if created {
                        self.subscriptions.remove(&key);
                    }
                    return Err(e.into());
                }
                sub.curves.push(curve);
                None
            }
        };

        if !indexed {
            self.by_source.entry(source).or_default().push(key);
        }
        if let Some(old) = replaced {
            if old.source != source {
                self.unindex_if_unused(old.source, key);
            }
        }

        log::debug!(
            target: "rtpc::registry",
            "sub {} param {} <- curve {} from {} ({} curves)",
            subscriber,
            param,
            curve_id,
            source,
            self.subscriptions.get(&key).map(|s| s.curves.len()).unwrap_or(0)
        );
        Ok(created)
    }

    /// Remove one curve. Returns whether curves remain on the subscription;
    /// a subscription left without curves is dropped.
    pub fn unsubscribe_curve(
        &mut self,
        subscriber: SubscriberId,
        param: ParamId,
        curve_id: CurveId,
    ) -> bool {
        let key = (subscriber, param);
        let Some(sub) = self.subscriptions.get_mut(&key) else {
            return false;
        };
        let Some(i) = sub.curves.iter().position(|c| c.curve_id == curve_id) else {
            return !sub.curves.is_empty();
        };
        let removed = sub.curves.remove(i);
        let remaining = !sub.curves.is_empty();
        if !remaining {
            self.subscriptions.remove(&key);
        }
        self.unindex_if_unused(removed.source, key);
        remaining
    }

    /// Remove every curve of (subscriber, param). Returns whether a
    /// subscription existed.
    pub fn unsubscribe(&mut self, subscriber: SubscriberId, param: ParamId) -> bool {
        let key = (subscriber, param);
        match self.subscriptions.remove(&key) {
            Some(sub) => {
                for curve in &sub.curves {
                    self.unindex_if_unused(curve.source, key);
                }
                true
            }
            None => false,
        }
    }

    /// Drop every subscription `subscriber` owns. Returns how many there were.
    pub fn remove_subscriber(&mut self, subscriber: SubscriberId) -> usize {
        let params: Vec<ParamId> = self
            .subscriptions
            .keys()
            .filter(|(s, _)| *s == subscriber)
            .map(|(_, p)| *p)
            .collect();
        for param in &params {
            self.unsubscribe(subscriber, *param);
        }
        params.len()
    }

    pub fn get(&self, subscriber: SubscriberId, param: ParamId) -> Option<&Subscription> {
        self.subscriptions.get(&(subscriber, param))
    }

    /// Subscriptions with at least one curve reading `source`.
    pub fn subscriptions_for_source(&self, source: ParamId) -> impl Iterator<Item = &Subscription> {
        self.by_source
            .get(&source)
            .into_iter()
            .flatten()
            .filter_map(|key| self.subscriptions.get(key))
    }

    fn unindex_if_unused(&mut self, source: ParamId, key: SubscriptionKey) {
        let still_read = self
            .subscriptions
            .get(&key)
            .is_some_and(|sub| sub.reads(source));
        if still_read {
            return;
        }
        if let Some(subs) = self.by_source.get_mut(&source) {
            subs.retain(|k| *k != key);
            if subs.is_empty() {
                self.by_source.remove(&source);
            }
        }
    }
}
