//! Parameter targets and the arena that tracks them while registered.
//!
//! A target is registered by its creator and handed back on
//! unregistration. In between, the engine refers to it only through a
//! generational [`TargetHandle`], so a handle kept past unregistration is
//! detected instead of reaching a recycled slot.

use crossbeam_channel::{Sender, TrySendError};
use rtpc_types::{ParamBits, ParamId, RtpcKey, SubscriberId};

use crate::error::RtpcResult;

/// Leaf listener consuming converted parameter values.
///
/// `update_target_param` runs inside the dispatch pass and must stay cheap:
/// record the value and reconcile later.
pub trait ParameterTarget: Send {
    fn update_target_param(&mut self, param: ParamId, value: f32, delta: f32);
}

/// Stable reference to a registered target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetHandle {
    index: u32,
    generation: u32,
}

pub(crate) struct TargetEntry {
    pub key: RtpcKey,
    pub wanted: ParamBits,
    pub target: Box<dyn ParameterTarget>,
    /// Subscribers whose directories hold this target, nearest first
    pub roots: Vec<SubscriberId>,
    /// Registered on the whole bus chain above the first root
    pub propagate: bool,
}

struct Slot {
    generation: u32,
    entry: Option<TargetEntry>,
}

/// Generational arena of registered targets.
#[derive(Default)]
pub(crate) struct TargetTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl TargetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: TargetEntry) -> RtpcResult<TargetHandle> {
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.generation = slot.generation.wrapping_add(1);
                slot.entry = Some(entry);
                TargetHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.try_reserve(1)?;
                // Keep room to free every slot so `remove` never allocates
                self.free
                    .try_reserve(self.slots.len() + 1 - self.free.len())?;
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                TargetHandle {
                    index,
                    generation: 0,
                }
            }
        };
        self.live += 1;
        Ok(handle)
    }

    pub fn remove(&mut self, handle: TargetHandle) -> Option<TargetEntry> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        self.free.push(handle.index);
        self.live -= 1;
        Some(entry)
    }

    pub fn get(&self, handle: TargetHandle) -> Option<&TargetEntry> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.entry.as_ref())
    }

    pub fn get_mut(&mut self, handle: TargetHandle) -> Option<&mut TargetEntry> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.entry.as_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = (TargetHandle, &TargetEntry)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.entry.as_ref().map(|entry| {
                (
                    TargetHandle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    entry,
                )
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (TargetHandle, &mut TargetEntry)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.entry.as_mut().map(|entry| {
                (
                    TargetHandle {
                        index: index as u32,
                        generation,
                    },
                    entry,
                )
            })
        })
    }

    /// Number of registered targets.
    pub fn len(&self) -> usize {
        self.live
    }
}

/// One update as delivered to a [`ChannelTarget`] receiver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetUpdate {
    pub param: ParamId,
    pub value: f32,
    pub delta: f32,
}

/// Target that forwards every update over a channel, e.g. to a voice
/// running on another thread.
pub struct ChannelTarget {
    tx: Sender<TargetUpdate>,
}

impl ChannelTarget {
    pub fn new(tx: Sender<TargetUpdate>) -> Self {
        Self { tx }
    }
}

impl ParameterTarget for ChannelTarget {
    fn update_target_param(&mut self, param: ParamId, value: f32, delta: f32) {
        match self.tx.try_send(TargetUpdate { param, value, delta }) {
            Ok(()) => {}
            Err(TrySendError::Full(update)) => {
                log::warn!(target: "rtpc::targets", "target queue full, dropping {:?}", update);
            }
            Err(TrySendError::Disconnected(_)) => {
                log::debug!(target: "rtpc::targets", "target receiver gone (param {})", param);
            }
        }
    }
}
