//! # rtpc-types
//!
//! Shared value types for the scoped RTPC engine: identifiers, the hierarchical
//! scope key, parameter bitsets, conversion curves and policy enums.
//! Nothing in this crate owns engine state; see `rtpc-core` for that.

mod bits;
mod curve;
mod key;
mod param;

pub use bits::{ParamBits, MAX_TARGET_PARAMS};
pub use curve::{Conversion, Curve, CurvePoint, CurveType};
pub use key::{HierarchicalKey, KeyField, RtpcKey, UNSET_RANK};
pub use param::{Accumulation, SourceKind, SubscriberKind, TransitionParams, ValueKind};

/// Emitter game object. `u64::MAX` is reserved as "no game object".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct GameObjectId(u64);

impl GameObjectId {
    pub const INVALID: Self = Self(u64::MAX);

    pub fn new(id: u64) -> Self {
        Self(id)
    }
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for GameObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Playing instance identifier. Zero is never handed out by the engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct PlayingId(u32);

impl PlayingId {
    pub const INVALID: Self = Self(0);

    pub fn new(id: u32) -> Self {
        Self(id)
    }
    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for PlayingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique id of the target entity (sound, bus, effect) a value is scoped to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct TargetId(u32);

impl TargetId {
    pub const INVALID: Self = Self(0);

    pub fn new(id: u32) -> Self {
        Self(id)
    }
    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// MIDI channel (0-15). `0xFF` means "no channel".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct MidiChannel(u8);

impl MidiChannel {
    pub const INVALID: Self = Self(0xFF);

    pub fn new(channel: u8) -> Self {
        Self(channel)
    }
    pub fn get(self) -> u8 {
        self.0
    }
}

/// MIDI note number (0-127). `0xFF` means "no note".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct MidiNote(u8);

impl MidiNote {
    pub const INVALID: Self = Self(0xFF);

    pub fn new(note: u8) -> Self {
        Self(note)
    }
    pub fn get(self) -> u8 {
        self.0
    }
}

/// Leaf voice within a playing instance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct VoiceId(u32);

impl VoiceId {
    pub const INVALID: Self = Self(0);

    pub fn new(id: u32) -> Self {
        Self(id)
    }
    pub fn get(self) -> u32 {
        self.0
    }
}

/// Identifier of a parameter. Game parameters (the values drivers set) and
/// target properties (what subscribers consume) share this id space.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ParamId(u32);

#[allow(missing_docs)]
impl ParamId {
    pub const VOLUME: Self = Self(0);
    pub const PITCH: Self = Self(1);
    pub const LPF: Self = Self(2);
    pub const HPF: Self = Self(3);
    pub const BUS_VOLUME: Self = Self(4);
    pub const MAKEUP_GAIN: Self = Self(5);
    pub const PRIORITY: Self = Self(6);
    pub const POSITION_X: Self = Self(7);
    pub const POSITION_Y: Self = Self(8);
    pub const MODULATOR_DEPTH: Self = Self(9);
    pub const MODULATOR_RATE: Self = Self(10);
    pub const CROSSFADE: Self = Self(11);
    /// First id handed to plugin parameters.
    pub const PLUGIN_BASE: Self = Self(64);

    pub fn new(id: u32) -> Self {
        Self(id)
    }
    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ParamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle for a subscriber (sound node, bus, playback instance, modulator...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct SubscriberId(u32);

impl SubscriberId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one curve binding within a subscription.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct CurveId(u32);

impl CurveId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for CurveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
