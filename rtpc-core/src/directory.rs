//! Per-subscriber directory of registered targets.
//!
//! Entries are kept sorted by target key (then handle), so an update scoped
//! to a concrete key only touches the contiguous run of entries sharing the
//! update's leading concrete prefix: binary search to the first candidate,
//! then scan forward while the prefix still matches.

use rtpc_types::{HierarchicalKey, ParamBits, ParamId, RtpcKey};

use crate::error::RtpcResult;
use crate::targets::TargetHandle;

/// Decides whether a target is shadowed by a narrower stored value.
pub trait ExceptionChecker {
    fn is_exception(&self, target_key: &RtpcKey) -> bool;
}

#[derive(Debug, Clone)]
struct DirectoryEntry {
    key: RtpcKey,
    handle: TargetHandle,
    bits: ParamBits,
}

/// Sorted target collection plus the subscriber's parameter bitsets.
#[derive(Debug, Default)]
pub struct TargetDirectory {
    /// Parameters this subscriber has subscriptions for
    available: ParamBits,
    /// Parameters wanted by every registered target
    common: ParamBits,
    entries: Vec<DirectoryEntry>,
}

impl TargetDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn available(&self) -> &ParamBits {
        &self.available
    }

    pub fn common(&self) -> &ParamBits {
        &self.common
    }

    pub fn set_available(&mut self, param: ParamId, available: bool) {
        if available {
            self.available.insert(param);
        } else {
            self.available.remove(param);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, handle: TargetHandle, key: &RtpcKey) -> bool {
        self.position(handle, key).is_ok()
    }

    /// Bits a target is registered with here, if it is registered.
    pub fn target_bits(&self, handle: TargetHandle, key: &RtpcKey) -> Option<&ParamBits> {
        self.position(handle, key)
            .ok()
            .map(|i| &self.entries[i].bits)
    }

    pub fn handles(&self) -> impl Iterator<Item = TargetHandle> + '_ {
        self.entries.iter().map(|e| e.handle)
    }

    /// Register (or re-register) a target. The stored bits are `wanted`
    /// intersected with this directory's available parameters; an empty
    /// intersection unregisters the target. Returns whether it is stored.
    pub fn add_target(
        &mut self,
        handle: TargetHandle,
        key: &RtpcKey,
        wanted: &ParamBits,
    ) -> RtpcResult<bool> {
        let bits = wanted.intersection(&self.available);
        let pos = self.position(handle, key);

        if bits.is_empty() {
            if let Ok(i) = pos {
                self.entries.remove(i);
                self.recompute_common();
            }
            return Ok(false);
        }

        match pos {
            Ok(i) => self.entries[i].bits = bits,
            Err(i) => {
                self.entries.try_reserve(1)?;
                self.entries.insert(
                    i,
                    DirectoryEntry {
                        key: *key,
                        handle,
                        bits,
                    },
                );
            }
        }
        self.recompute_common();
        Ok(true)
    }

    pub fn remove_target(&mut self, handle: TargetHandle, key: &RtpcKey) -> bool {
        match self.position(handle, key) {
            Ok(i) => {
                self.entries.remove(i);
                self.recompute_common();
                true
            }
            Err(_) => false,
        }
    }

    /// Deliver an update to every matching target and return how many were hit.
    ///
    /// A fully unset `update_key` reaches every entry. Otherwise only entries
    /// whose key matches the update's concrete fields are considered. The
    /// per-target bit test is skipped when `param` is wanted by everyone, and
    /// targets the exception checker flags are left alone.
    pub fn push_param_update<F: FnMut(TargetHandle)>(
        &self,
        param: ParamId,
        update_key: &RtpcKey,
        exceptions: Option<&dyn ExceptionChecker>,
        mut deliver: F,
    ) -> usize {
        let fast_path = self.common.contains(param);

        let (candidates, lead) = if update_key.any_field_valid() {
            let lead = update_key.leading_depth();
            let start = self
                .entries
                .partition_point(|e| e.key.cmp_prefix(update_key, lead).is_lt());
            (&self.entries[start..], lead)
        } else {
            (&self.entries[..], 0)
        };

        let mut delivered = 0;
        for entry in candidates {
            if lead > 0 && entry.key.cmp_prefix(update_key, lead).is_ne() {
                break;
            }
            if !entry.key.match_valid_fields(update_key) {
                continue;
            }
            if !fast_path && !entry.bits.contains(param) {
                continue;
            }
            if exceptions.is_some_and(|c| c.is_exception(&entry.key)) {
                continue;
            }
            deliver(entry.handle);
            delivered += 1;
        }
        delivered
    }

    fn position(&self, handle: TargetHandle, key: &RtpcKey) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|e| e.key.cmp(key).then(e.handle.cmp(&handle)))
    }

    fn recompute_common(&mut self) {
        let mut entries = self.entries.iter();
        self.common = match entries.next() {
            Some(first) => entries.fold(first.bits.clone(), |mut acc, e| {
                acc.intersect_with(&e.bits);
                acc
            }),
            None => ParamBits::empty(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::{TargetEntry, TargetTable};
    use rtpc_types::{GameObjectId, PlayingId};

    struct Nop;
    impl crate::targets::ParameterTarget for Nop {
        fn update_target_param(&mut self, _: ParamId, _: f32, _: f32) {}
    }

    fn handles(n: usize) -> Vec<TargetHandle> {
        let mut table = TargetTable::new();
        (0..n)
            .map(|_| {
                table
                    .insert(TargetEntry {
                        key: RtpcKey::any(),
                        wanted: ParamBits::empty(),
                        target: Box::new(Nop),
                        roots: Vec::new(),
                        propagate: false,
                    })
                    .unwrap()
            })
            .collect()
    }

    fn play(o: u64, p: u32) -> RtpcKey {
        RtpcKey::for_object(GameObjectId::new(o)).with_playing(PlayingId::new(p))
    }

    fn directory_with(params: &[ParamId]) -> TargetDirectory {
        let mut dir = TargetDirectory::new();
        for p in params {
            dir.set_available(*p, true);
        }
        dir
    }

    fn collect(dir: &TargetDirectory, param: ParamId, key: &RtpcKey) -> Vec<TargetHandle> {
        let mut hit = Vec::new();
        dir.push_param_update(param, key, None, |h| hit.push(h));
        hit
    }

    #[test]
    fn add_is_idempotent_and_sorted() {
        let h = handles(3);
        let mut dir = directory_with(&[ParamId::VOLUME, ParamId::PITCH]);
        let vol: ParamBits = [ParamId::VOLUME].into_iter().collect();
        let both: ParamBits = [ParamId::VOLUME, ParamId::PITCH].into_iter().collect();

        assert!(dir.add_target(h[0], &play(2, 1), &vol).unwrap());
        assert!(dir.add_target(h[1], &play(1, 1), &vol).unwrap());
        assert!(dir.add_target(h[0], &play(2, 1), &both).unwrap());
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.target_bits(h[0], &play(2, 1)), Some(&both));
        assert_eq!(dir.handles().collect::<Vec<_>>(), vec![h[1], h[0]]);
    }

    #[test]
    fn empty_intersection_is_not_stored() {
        let h = handles(1);
        let mut dir = directory_with(&[ParamId::VOLUME]);
        let pitch: ParamBits = [ParamId::PITCH].into_iter().collect();
        let vol: ParamBits = [ParamId::VOLUME].into_iter().collect();

        assert!(!dir.add_target(h[0], &play(1, 1), &pitch).unwrap());
        assert!(dir.is_empty());

        // Re-registering with nothing usable drops an existing entry
        dir.add_target(h[0], &play(1, 1), &vol).unwrap();
        assert!(!dir.add_target(h[0], &play(1, 1), &pitch).unwrap());
        assert!(dir.is_empty());
    }

    #[test]
    fn wildcard_update_reaches_everyone() {
        let h = handles(4);
        let mut dir = directory_with(&[ParamId::VOLUME]);
        let vol: ParamBits = [ParamId::VOLUME].into_iter().collect();
        for (i, handle) in h.iter().enumerate() {
            dir.add_target(*handle, &play(i as u64, 1), &vol).unwrap();
        }
        assert_eq!(collect(&dir, ParamId::VOLUME, &RtpcKey::any()).len(), 4);
        assert!(collect(&dir, ParamId::PITCH, &RtpcKey::any()).is_empty());
    }

    #[test]
    fn concrete_update_scans_only_matching_run() {
        let h = handles(5);
        let mut dir = directory_with(&[ParamId::VOLUME]);
        let vol: ParamBits = [ParamId::VOLUME].into_iter().collect();
        dir.add_target(h[0], &play(1, 1), &vol).unwrap();
        dir.add_target(h[1], &play(2, 1), &vol).unwrap();
        dir.add_target(h[2], &play(2, 2), &vol).unwrap();
        dir.add_target(h[3], &play(3, 2), &vol).unwrap();
        dir.add_target(h[4], &RtpcKey::for_object(GameObjectId::new(2)), &vol).unwrap();

        let obj2 = RtpcKey::for_object(GameObjectId::new(2));
        let mut hit = collect(&dir, ParamId::VOLUME, &obj2);
        hit.sort();
        let mut expected = vec![h[1], h[2], h[4]];
        expected.sort();
        assert_eq!(hit, expected);

        assert_eq!(collect(&dir, ParamId::VOLUME, &play(2, 2)), vec![h[2]]);

        // Interior wildcard: playing id 2 on any object
        let any_obj = RtpcKey::any().with_playing(PlayingId::new(2));
        let mut hit = collect(&dir, ParamId::VOLUME, &any_obj);
        hit.sort();
        let mut expected = vec![h[2], h[3]];
        expected.sort();
        assert_eq!(hit, expected);
    }

    #[test]
    fn exceptions_are_skipped() {
        struct SkipObject(u64);
        impl ExceptionChecker for SkipObject {
            fn is_exception(&self, key: &RtpcKey) -> bool {
                key.game_object.get() == self.0
            }
        }

        let h = handles(2);
        let mut dir = directory_with(&[ParamId::VOLUME]);
        let vol: ParamBits = [ParamId::VOLUME].into_iter().collect();
        dir.add_target(h[0], &play(1, 1), &vol).unwrap();
        dir.add_target(h[1], &play(2, 1), &vol).unwrap();

        let mut hit = Vec::new();
        dir.push_param_update(ParamId::VOLUME, &RtpcKey::any(), Some(&SkipObject(1)), |h| {
            hit.push(h)
        });
        assert_eq!(hit, vec![h[1]]);
    }

    #[test]
    fn common_params_fast_path_matches_naive_check() {
        let params = [ParamId::VOLUME, ParamId::PITCH, ParamId::LPF];
        let h = handles(8);
        let mut dir = directory_with(&params);
        let mut naive: Vec<(TargetHandle, RtpcKey, ParamBits)> = Vec::new();

        // Deterministic pseudo-random add/remove sequence
        let mut seed: u32 = 0x2545_f491;
        for _ in 0..200 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let which = (seed >> 8) as usize % h.len();
            let key = play((which % 3) as u64, which as u32 + 1);
            let wanted: ParamBits = params
                .iter()
                .enumerate()
                .filter(|(i, _)| (seed >> (16 + i)) & 1 == 1)
                .map(|(_, p)| *p)
                .collect();

            naive.retain(|(handle, _, _)| *handle != h[which]);
            if (seed >> 4) & 3 == 0 {
                dir.remove_target(h[which], &key);
            } else if dir.add_target(h[which], &key, &wanted).unwrap() {
                naive.push((h[which], key, wanted.clone()));
            }

            let common = naive.iter().skip(1).fold(
                naive.first().map(|n| n.2.clone()).unwrap_or_default(),
                |mut acc, n| {
                    acc.intersect_with(&n.2);
                    acc
                },
            );
            assert_eq!(dir.common(), &common);

            for p in params {
                let mut fast = collect(&dir, p, &RtpcKey::any());
                fast.sort();
                let mut slow: Vec<_> = naive
                    .iter()
                    .filter(|n| n.2.contains(p))
                    .map(|n| n.0)
                    .collect();
                slow.sort();
                assert_eq!(fast, slow);
            }
        }
    }
}
