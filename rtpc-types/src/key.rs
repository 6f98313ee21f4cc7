//! Hierarchical scope keys.
//!
//! A key is an ordered tuple of fields, each either concrete or unset. Unset
//! fields act as wildcards. Every field maps to a `u64` rank; rank
//! [`UNSET_RANK`] is reserved for the unset value so that "unset" always sorts
//! before every real value, whatever the field's raw sentinel is.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{GameObjectId, MidiChannel, MidiNote, PlayingId, TargetId, VoiceId};

/// Rank of an unset (wildcard) field.
pub const UNSET_RANK: u64 = 0;

/// One coordinate of a hierarchical key.
///
/// `rank` must map `INVALID` to [`UNSET_RANK`] and every other value to a
/// distinct non-zero rank, preserving the natural order of real values.
pub trait KeyField: Copy + Eq + fmt::Debug {
    const INVALID: Self;

    fn rank(self) -> u64;
    fn from_rank(rank: u64) -> Self;

    fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

// The sentinel is u64::MAX, so shift everything up by one and let it wrap to 0.
impl KeyField for GameObjectId {
    const INVALID: Self = GameObjectId::INVALID;

    fn rank(self) -> u64 {
        self.get().wrapping_add(1)
    }
    fn from_rank(rank: u64) -> Self {
        GameObjectId::new(rank.wrapping_sub(1))
    }
}

impl KeyField for PlayingId {
    const INVALID: Self = PlayingId::INVALID;

    fn rank(self) -> u64 {
        self.get() as u64
    }
    fn from_rank(rank: u64) -> Self {
        PlayingId::new(rank as u32)
    }
}

impl KeyField for TargetId {
    const INVALID: Self = TargetId::INVALID;

    fn rank(self) -> u64 {
        self.get() as u64
    }
    fn from_rank(rank: u64) -> Self {
        TargetId::new(rank as u32)
    }
}

// 0xFF wraps to rank 0; channel 0 becomes rank 1.
impl KeyField for MidiChannel {
    const INVALID: Self = MidiChannel::INVALID;

    fn rank(self) -> u64 {
        self.get().wrapping_add(1) as u64
    }
    fn from_rank(rank: u64) -> Self {
        MidiChannel::new((rank as u8).wrapping_sub(1))
    }
}

impl KeyField for MidiNote {
    const INVALID: Self = MidiNote::INVALID;

    fn rank(self) -> u64 {
        self.get().wrapping_add(1) as u64
    }
    fn from_rank(rank: u64) -> Self {
        MidiNote::new((rank as u8).wrapping_sub(1))
    }
}

impl KeyField for VoiceId {
    const INVALID: Self = VoiceId::INVALID;

    fn rank(self) -> u64 {
        self.get() as u64
    }
    fn from_rank(rank: u64) -> Self {
        VoiceId::new(rank as u32)
    }
}

/// Fixed-depth compound key addressed by field index.
///
/// Implementors only provide rank access; matching, ordering and scope
/// comparison are derived from it.
pub trait HierarchicalKey: Clone + fmt::Debug {
    const DEPTH: usize;

    /// Fully unset key (matches everything as a pattern).
    fn unset() -> Self;
    fn rank(&self, field: usize) -> u64;
    fn set_rank(&mut self, field: usize, rank: u64);

    fn is_field_valid(&self, field: usize) -> bool {
        self.rank(field) != UNSET_RANK
    }

    fn clear_field(&mut self, field: usize) {
        self.set_rank(field, UNSET_RANK);
    }

    /// Clear `field` and every field after it.
    fn clear_from(&mut self, field: usize) {
        for f in field..Self::DEPTH {
            self.clear_field(f);
        }
    }

    fn any_field_valid(&self) -> bool {
        (0..Self::DEPTH).any(|f| self.is_field_valid(f))
    }

    fn all_fields_valid(&self) -> bool {
        (0..Self::DEPTH).all(|f| self.is_field_valid(f))
    }

    /// One past the last concrete field; 0 for a fully unset key.
    fn concrete_depth(&self) -> usize {
        (0..Self::DEPTH)
            .rev()
            .find(|&f| self.is_field_valid(f))
            .map_or(0, |f| f + 1)
    }

    /// Length of the leading run of concrete fields.
    fn leading_depth(&self) -> usize {
        (0..Self::DEPTH)
            .find(|&f| !self.is_field_valid(f))
            .unwrap_or(Self::DEPTH)
    }

    /// True iff every concrete field of `pattern` equals the same field of
    /// `self`. Unset pattern fields match anything.
    fn match_valid_fields(&self, pattern: &Self) -> bool {
        (0..Self::DEPTH)
            .all(|f| !pattern.is_field_valid(f) || pattern.rank(f) == self.rank(f))
    }

    /// True iff no field is concrete in both keys with different values.
    fn intersects(&self, other: &Self) -> bool {
        (0..Self::DEPTH).all(|f| {
            !self.is_field_valid(f) || !other.is_field_valid(f) || self.rank(f) == other.rank(f)
        })
    }

    /// True if `self` is concrete at some field where `other` is not.
    fn has_narrower_scope_than(&self, other: &Self) -> bool {
        (0..Self::DEPTH).any(|f| self.is_field_valid(f) && !other.is_field_valid(f))
    }

    /// Bit `i` set iff field `i` is concrete.
    fn bitfield(&self) -> u32 {
        (0..Self::DEPTH)
            .filter(|&f| self.is_field_valid(f))
            .fold(0, |mask, f| mask | (1 << f))
    }

    /// Lexicographic order by field rank.
    fn cmp_ranks(&self, other: &Self) -> Ordering {
        (0..Self::DEPTH)
            .map(|f| self.rank(f).cmp(&other.rank(f)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Compare only the first `depth` fields.
    fn cmp_prefix(&self, other: &Self, depth: usize) -> Ordering {
        (0..depth.min(Self::DEPTH))
            .map(|f| self.rank(f).cmp(&other.rank(f)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

/// Scope key for parameter values and targets:
/// game object → playing instance → target entity → MIDI channel → MIDI note → voice.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RtpcKey {
    pub game_object: GameObjectId,
    pub playing_id: PlayingId,
    pub target: TargetId,
    pub midi_channel: MidiChannel,
    pub midi_note: MidiNote,
    pub voice: VoiceId,
}

impl RtpcKey {
    pub const FIELD_GAME_OBJECT: usize = 0;
    pub const FIELD_PLAYING_ID: usize = 1;
    pub const FIELD_TARGET: usize = 2;
    pub const FIELD_MIDI_CHANNEL: usize = 3;
    pub const FIELD_MIDI_NOTE: usize = 4;
    pub const FIELD_VOICE: usize = 5;

    /// Global scope: every field unset.
    pub fn any() -> Self {
        Self {
            game_object: GameObjectId::INVALID,
            playing_id: PlayingId::INVALID,
            target: TargetId::INVALID,
            midi_channel: MidiChannel::INVALID,
            midi_note: MidiNote::INVALID,
            voice: VoiceId::INVALID,
        }
    }

    pub fn for_object(game_object: GameObjectId) -> Self {
        Self {
            game_object,
            ..Self::any()
        }
    }

    pub fn with_playing(mut self, playing_id: PlayingId) -> Self {
        self.playing_id = playing_id;
        self
    }

    pub fn with_target(mut self, target: TargetId) -> Self {
        self.target = target;
        self
    }

    pub fn with_midi(mut self, channel: MidiChannel, note: MidiNote) -> Self {
        self.midi_channel = channel;
        self.midi_note = note;
        self
    }

    pub fn with_voice(mut self, voice: VoiceId) -> Self {
        self.voice = voice;
        self
    }
}

impl Default for RtpcKey {
    fn default() -> Self {
        Self::any()
    }
}

impl HierarchicalKey for RtpcKey {
    const DEPTH: usize = 6;

    fn unset() -> Self {
        Self::any()
    }

    fn rank(&self, field: usize) -> u64 {
        match field {
            Self::FIELD_GAME_OBJECT => self.game_object.rank(),
            Self::FIELD_PLAYING_ID => self.playing_id.rank(),
            Self::FIELD_TARGET => self.target.rank(),
            Self::FIELD_MIDI_CHANNEL => self.midi_channel.rank(),
            Self::FIELD_MIDI_NOTE => self.midi_note.rank(),
            Self::FIELD_VOICE => self.voice.rank(),
            _ => {
                debug_assert!(false, "RtpcKey has no field {}", field);
                UNSET_RANK
            }
        }
    }

    fn set_rank(&mut self, field: usize, rank: u64) {
        match field {
            Self::FIELD_GAME_OBJECT => self.game_object = GameObjectId::from_rank(rank),
            Self::FIELD_PLAYING_ID => self.playing_id = PlayingId::from_rank(rank),
            Self::FIELD_TARGET => self.target = TargetId::from_rank(rank),
            Self::FIELD_MIDI_CHANNEL => self.midi_channel = MidiChannel::from_rank(rank),
            Self::FIELD_MIDI_NOTE => self.midi_note = MidiNote::from_rank(rank),
            Self::FIELD_VOICE => self.voice = VoiceId::from_rank(rank),
            _ => debug_assert!(false, "RtpcKey has no field {}", field),
        }
    }
}

impl PartialOrd for RtpcKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RtpcKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_ranks(other)
    }
}

impl fmt::Debug for RtpcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for RtpcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn field(f: &mut fmt::Formatter<'_>, name: &str, valid: bool, value: u64) -> fmt::Result {
            if valid {
                write!(f, "{}={}", name, value)
            } else {
                write!(f, "{}=*", name)
            }
        }
        write!(f, "(")?;
        field(f, "obj", self.game_object.is_valid(), self.game_object.get())?;
        write!(f, ", ")?;
        field(f, "play", self.playing_id.is_valid(), self.playing_id.get() as u64)?;
        write!(f, ", ")?;
        field(f, "tgt", self.target.is_valid(), self.target.get() as u64)?;
        write!(f, ", ")?;
        field(f, "ch", self.midi_channel.is_valid(), self.midi_channel.get() as u64)?;
        write!(f, ", ")?;
        field(f, "note", self.midi_note.is_valid(), self.midi_note.get() as u64)?;
        write!(f, ", ")?;
        field(f, "voice", self.voice.is_valid(), self.voice.get() as u64)?;
        write!(f, ")")
    }
}
