//! Time-smoothed value changes.
//!
//! Ramps are advanced only by [`Transitions::update`], called once per
//! audio block. There is no cancel token: starting a ramp on a (param, key)
//! that already has one replaces it.

use std::time::Duration;

use rtpc_types::{CurveType, HierarchicalKey, ParamId, RtpcKey, TransitionParams};

#[derive(Debug, Clone)]
struct Ramp {
    param: ParamId,
    key: RtpcKey,
    from: f32,
    to: f32,
    elapsed: Duration,
    duration: Duration,
    curve: CurveType,
}

impl Ramp {
    fn progress(&self) -> f32 {
        (self.elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }
}

/// Value produced by one ramp on one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampStep {
    pub param: ParamId,
    pub key: RtpcKey,
    pub value: f32,
    /// Last step of the ramp; `value` is exactly the target
    pub done: bool,
}

#[derive(Debug, Default)]
pub struct Transitions {
    ramps: Vec<Ramp>,
    min_duration: Duration,
    default_curve: CurveType,
}

impl Transitions {
    /// Ramps shorter than `min_duration` snap instead.
    pub fn new(min_duration: Duration) -> Self {
        Self {
            ramps: Vec::new(),
            min_duration,
            default_curve: CurveType::default(),
        }
    }

    /// Shape for ramps that do not name a curve.
    pub fn with_default_curve(mut self, curve: CurveType) -> Self {
        self.default_curve = curve;
        self
    }

    pub fn len(&self) -> usize {
        self.ramps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ramps.is_empty()
    }

    pub fn is_ramping(&self, param: ParamId, key: &RtpcKey) -> bool {
        self.ramps.iter().any(|r| r.param == param && r.key == *key)
    }

    /// Start a ramp from `from` to `to`, replacing any ramp on the same
    /// (param, key). Returns false when the change should snap instead; any
    /// previous ramp on the slot is dropped either way.
    pub fn start(
        &mut self,
        param: ParamId,
        key: &RtpcKey,
        from: f32,
        to: f32,
        transition: &TransitionParams,
    ) -> bool {
        self.ramps.retain(|r| !(r.param == param && r.key == *key));

        if transition.duration.is_zero() || transition.duration < self.min_duration || from == to {
            return false;
        }

        log::trace!(
            target: "rtpc::transition",
            "ramp {} {} {} -> {} over {:?}",
            param, key, from, to, transition.duration
        );
        self.ramps.push(Ramp {
            param,
            key: *key,
            from,
            to,
            elapsed: Duration::ZERO,
            duration: transition.duration,
            curve: transition.curve.unwrap_or(self.default_curve),
        });
        true
    }

    /// Advance every ramp by `elapsed`. Finished ramps are dropped after
    /// yielding their final step.
    pub fn update(&mut self, elapsed: Duration) -> Vec<RampStep> {
        let mut steps = Vec::with_capacity(self.ramps.len());
        self.ramps.retain_mut(|ramp| {
            ramp.elapsed += elapsed;
            let t = ramp.progress();
            let done = t >= 1.0;
            let value = if done {
                ramp.to
            } else {
                ramp.curve.interpolate(ramp.from, ramp.to, t)
            };
            steps.push(RampStep {
                param: ramp.param,
                key: ramp.key,
                value,
                done,
            });
            !done
        });
        steps
    }

    /// Drop the ramp on exactly (param, key), if any.
    pub fn cancel(&mut self, param: ParamId, key: &RtpcKey) -> bool {
        self.cancel_where(|r| r.param == param && r.key == *key) > 0
    }

    /// Drop ramps on `param` whose key matches `pattern`.
    pub fn cancel_matching(&mut self, param: ParamId, pattern: &RtpcKey) -> usize {
        self.cancel_where(|r| r.param == param && r.key.match_valid_fields(pattern))
    }

    /// Drop ramps on any parameter whose key matches `pattern`.
    pub fn cancel_all_matching(&mut self, pattern: &RtpcKey) -> usize {
        self.cancel_where(|r| r.key.match_valid_fields(pattern))
    }

    fn cancel_where<F: Fn(&Ramp) -> bool>(&mut self, pred: F) -> usize {
        let before = self.ramps.len();
        self.ramps.retain(|r| !pred(r));
        let cancelled = before - self.ramps.len();
        if cancelled > 0 {
            log::trace!(target: "rtpc::transition", "cancelled {} ramps", cancelled);
        }
        cancelled
    }
}
