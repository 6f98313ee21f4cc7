use std::fmt;

use bit_vec::BitVec;

use crate::ParamId;

/// Number of target properties a bitset can describe.
pub const MAX_TARGET_PARAMS: usize = 128;

/// Fixed-width set of target property ids.
#[derive(Clone, PartialEq, Eq)]
pub struct ParamBits(BitVec);

impl ParamBits {
    pub fn empty() -> Self {
        Self(BitVec::from_elem(MAX_TARGET_PARAMS, false))
    }

    pub fn full() -> Self {
        Self(BitVec::from_elem(MAX_TARGET_PARAMS, true))
    }

    /// Build a set from ids; ids that do not fit are dropped.
    pub fn from_params<I: IntoIterator<Item = ParamId>>(params: I) -> Self {
        let mut bits = Self::empty();
        for p in params {
            bits.insert(p);
        }
        bits
    }

    /// Whether `param` can be represented in a bitset at all.
    pub fn fits(param: ParamId) -> bool {
        (param.get() as usize) < MAX_TARGET_PARAMS
    }

    /// Returns false (and leaves the set unchanged) if `param` does not fit.
    pub fn insert(&mut self, param: ParamId) -> bool {
        if !Self::fits(param) {
            return false;
        }
        self.0.set(param.get() as usize, true);
        true
    }

    pub fn remove(&mut self, param: ParamId) {
        if Self::fits(param) {
            self.0.set(param.get() as usize, false);
        }
    }

    pub fn contains(&self, param: ParamId) -> bool {
        self.0.get(param.get() as usize).unwrap_or(false)
    }

    pub fn intersect_with(&mut self, other: &ParamBits) {
        self.0.and(&other.0);
    }

    pub fn union_with(&mut self, other: &ParamBits) {
        self.0.or(&other.0);
    }

    pub fn intersection(&self, other: &ParamBits) -> ParamBits {
        let mut out = self.clone();
        out.intersect_with(other);
        out
    }

    pub fn is_empty(&self) -> bool {
        self.0.none()
    }

    pub fn len(&self) -> usize {
        self.0.iter().filter(|b| *b).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = ParamId> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, set)| *set)
            .map(|(i, _)| ParamId::new(i as u32))
    }
}

impl Default for ParamBits {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ParamBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|p| p.get())).finish()
    }
}

impl FromIterator<ParamId> for ParamBits {
    fn from_iter<I: IntoIterator<Item = ParamId>>(iter: I) -> Self {
        Self::from_params(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_contains_remove() {
        let mut bits = ParamBits::empty();
        assert!(bits.is_empty());
        assert!(bits.insert(ParamId::VOLUME));
        assert!(bits.insert(ParamId::PLUGIN_BASE));
        assert!(bits.contains(ParamId::VOLUME));
        assert!(!bits.contains(ParamId::PITCH));
        assert_eq!(bits.len(), 2);

        bits.remove(ParamId::VOLUME);
        assert!(!bits.contains(ParamId::VOLUME));
    }

    #[test]
    fn out_of_range_is_rejected() {
        let mut bits = ParamBits::empty();
        assert!(!bits.insert(ParamId::new(MAX_TARGET_PARAMS as u32)));
        assert!(!bits.contains(ParamId::new(1000)));
        assert!(bits.is_empty());
    }

    #[test]
    fn intersection_and_union() {
        let a: ParamBits = [ParamId::VOLUME, ParamId::PITCH].into_iter().collect();
        let b: ParamBits = [ParamId::PITCH, ParamId::LPF].into_iter().collect();

        let both = a.intersection(&b);
        assert_eq!(both.iter().collect::<Vec<_>>(), vec![ParamId::PITCH]);

        let mut all = a.clone();
        all.union_with(&b);
        assert_eq!(all.len(), 3);

        let mut full = ParamBits::full();
        full.intersect_with(&a);
        assert_eq!(full, a);
    }
}
