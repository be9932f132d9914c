//! Utility types.

use crate::grammar::TerminalID;

type BuildHasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;

pub type Map<K, V> = indexmap::IndexMap<K, V, BuildHasher>;
pub type Set<T> = indexmap::IndexSet<T, BuildHasher>;

/// A set of terminal symbols, iterated in ascending ID order.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct TerminalSet {
    inner: bit_set::BitSet,
}

impl TerminalSet {
    pub fn contains(&self, id: TerminalID) -> bool {
        self.inner.contains(id.into_raw().into())
    }
    pub fn insert(&mut self, id: TerminalID) -> bool {
        self.inner.insert(id.into_raw().into())
    }
    pub fn remove(&mut self, id: TerminalID) -> bool {
        self.inner.remove(id.into_raw().into())
    }
    /// Merge `other` into this set and report whether anything was added.
    pub fn union_with(&mut self, other: &Self) -> bool {
        let before = self.inner.len();
        self.inner.union_with(&other.inner);
        self.inner.len() != before
    }
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
    pub fn len(&self) -> usize {
        self.inner.len()
    }
    pub fn iter(&self) -> impl Iterator<Item = TerminalID> + '_ {
        self.inner.iter().map(|raw| {
            // Only `TerminalID` raw values are ever inserted.
            TerminalID::from_raw(raw as u16)
        })
    }
}

impl FromIterator<TerminalID> for TerminalSet {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = TerminalID>,
    {
        Self {
            inner: iter.into_iter().map(|t| t.into_raw().into()).collect(),
        }
    }
}

impl Extend<TerminalID> for TerminalSet {
    fn extend<I: IntoIterator<Item = TerminalID>>(&mut self, iter: I) {
        for t in iter {
            self.insert(t);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_set_iterates_in_id_order() {
        let set: TerminalSet = [5, 0, 3]
            .into_iter()
            .map(TerminalID::from_raw)
            .collect();
        let ids: Vec<_> = set.iter().map(TerminalID::into_raw).collect();
        assert_eq!(ids, [0, 3, 5]);
    }

    #[test]
    fn union_reports_change() {
        let mut a: TerminalSet = [TerminalID::from_raw(4)].into_iter().collect();
        let b: TerminalSet = [TerminalID::from_raw(4)].into_iter().collect();
        assert!(!a.union_with(&b));
        let c: TerminalSet = [TerminalID::from_raw(7)].into_iter().collect();
        assert!(a.union_with(&c));
        assert_eq!(a.len(), 2);
    }
}
