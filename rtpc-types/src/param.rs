use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::CurveType;

/// How the curves of one subscription combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Accumulation {
    /// Base 0, values are summed (dB offsets, semitones)
    #[default]
    Additive,
    /// Base 1, values are multiplied (linear gains)
    Multiplicative,
    /// Base 0, the last curve in the list wins (switch-like bindings)
    Exclusive,
}

impl Accumulation {
    pub fn base(self) -> f32 {
        match self {
            Accumulation::Additive | Accumulation::Exclusive => 0.0,
            Accumulation::Multiplicative => 1.0,
        }
    }

    pub fn combine(self, acc: f32, value: f32) -> f32 {
        match self {
            Accumulation::Additive => acc + value,
            Accumulation::Multiplicative => acc * value,
            Accumulation::Exclusive => value,
        }
    }
}

/// Where the source value of a curve comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourceKind {
    /// A game parameter held in the engine's scoped store
    #[default]
    GameParameter,
    /// A driven quantity resolved by another collaborator (LFO, envelope)
    Modulator,
}

/// Whether a parameter is continuous or switch-like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Interpolated, may ramp
    #[default]
    Continuous,
    /// Step behavior, always snaps to whole values
    Discrete,
}

/// Subscriber category. Declaration order is dispatch priority: within one
/// update, earlier categories are notified first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum SubscriberKind {
    PlaybackInstance,
    PluginContext,
    Node,
    Modulator,
    Layer,
    CrossfadeLayer,
    SwitchGroup,
}

/// Time-smoothing for a value change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionParams {
    pub duration: Duration,
    /// Ramp shape; `None` takes the engine's configured default
    #[serde(default)]
    pub curve: Option<CurveType>,
}

impl TransitionParams {
    /// Apply the new value right away.
    pub fn immediate() -> Self {
        Self {
            duration: Duration::ZERO,
            curve: None,
        }
    }

    pub fn ramp(duration: Duration, curve: CurveType) -> Self {
        Self {
            duration,
            curve: Some(curve),
        }
    }

    /// Ramp over `duration` using the default curve.
    pub fn over(duration: Duration) -> Self {
        Self {
            duration,
            curve: None,
        }
    }

    pub fn is_immediate(&self) -> bool {
        self.duration.is_zero()
    }
}

impl Default for TransitionParams {
    fn default() -> Self {
        Self::immediate()
    }
}
