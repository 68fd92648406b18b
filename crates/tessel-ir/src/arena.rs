//! Append-only storage addressed by typed handles.
//!
//! Every kernel function owns an [`Arena`] of expressions; a [`Module`](crate::Module)
//! interns block types in a [`UniqueArena`] so equal types share a handle.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::Index;

/// A typed index into an [`Arena`] or [`UniqueArena`].
pub struct Handle<T> {
    index: u32,
    _phantom: PhantomData<T>,
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index.cmp(&other.index)
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.index)
    }
}

impl<T> Handle<T> {
    pub(crate) fn new(index: u32) -> Self {
        Self {
            index,
            _phantom: PhantomData,
        }
    }

    /// Zero-based position of the handle in its arena.
    pub fn index(self) -> usize {
        self.index as usize
    }
}

fn checked_index(len: usize) -> u32 {
    u32::try_from(len).unwrap_or_else(|_| panic!("arena overflow: {len} items exceeds u32::MAX"))
}

/// A half-open run of consecutive handles, `[first, end)`.
///
/// Used by [`Statement::Emit`](crate::Statement::Emit) to mark which expressions
/// are evaluated at that point of the body.
pub struct Range<T> {
    first: u32,
    end: u32,
    _phantom: PhantomData<T>,
}

impl<T> Clone for Range<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Range<T> {}

impl<T> PartialEq for Range<T> {
    fn eq(&self, other: &Self) -> bool {
        self.first == other.first && self.end == other.end
    }
}

impl<T> Eq for Range<T> {}

impl<T> fmt::Debug for Range<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}..%{}", self.first, self.end)
    }
}

impl<T> Range<T> {
    /// Range from `first` up to, but excluding, `end`.
    pub fn new(first: Handle<T>, end: Handle<T>) -> Self {
        Self {
            first: first.index,
            end: end.index,
            _phantom: PhantomData,
        }
    }

    pub fn first(&self) -> Handle<T> {
        Handle::new(self.first)
    }

    pub fn end(&self) -> Handle<T> {
        Handle::new(self.end)
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.first) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.first >= self.end
    }

    pub fn contains(&self, handle: Handle<T>) -> bool {
        (self.first..self.end).contains(&handle.index)
    }

    /// Handles in the range, in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Handle<T>> + use<T> {
        (self.first..self.end).map(Handle::new)
    }
}

/// An append-only arena.
#[derive(Clone, Debug)]
pub struct Arena<T> {
    data: Vec<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Handle the next appended value will receive.
    pub fn next_handle(&self) -> Handle<T> {
        Handle::new(checked_index(self.data.len()))
    }

    pub fn append(&mut self, value: T) -> Handle<T> {
        let handle = self.next_handle();
        self.data.push(value);
        handle
    }

    /// Everything appended since `start` was the next handle.
    pub fn range_from(&self, start: Handle<T>) -> Range<T> {
        Range::new(start, self.next_handle())
    }

    pub fn try_get(&self, handle: Handle<T>) -> Option<&T> {
        self.data.get(handle.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.data
            .iter()
            .enumerate()
            .map(|(i, v)| (Handle::new(i as u32), v))
    }
}

impl<T> Index<Handle<T>> for Arena<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        &self.data[handle.index()]
    }
}

/// An arena that hands out the same handle for equal values.
#[derive(Clone, Debug)]
pub struct UniqueArena<T> {
    data: Vec<T>,
    map: HashMap<T, u32>,
}

impl<T: Hash + Eq> Default for UniqueArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hash + Eq> UniqueArena<T> {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            map: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Interns `value`, returning the existing handle when an equal value is present.
    pub fn insert(&mut self, value: T) -> Handle<T>
    where
        T: Clone,
    {
        if let Some(&index) = self.map.get(&value) {
            return Handle::new(index);
        }
        let index = checked_index(self.data.len());
        self.map.insert(value.clone(), index);
        self.data.push(value);
        Handle::new(index)
    }

    pub fn try_get(&self, handle: Handle<T>) -> Option<&T> {
        self.data.get(handle.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.data
            .iter()
            .enumerate()
            .map(|(i, v)| (Handle::new(i as u32), v))
    }
}

impl<T> Index<Handle<T>> for UniqueArena<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        &self.data[handle.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_hands_out_sequential_handles() {
        let mut arena = Arena::new();
        let a = arena.append("lhs");
        let b = arena.append("rhs");
        assert_eq!((a.index(), b.index()), (0, 1));
        assert_eq!(arena[b], "rhs");
        assert_eq!(arena.next_handle().index(), 2);
    }

    #[test]
    fn range_from_covers_new_values_only() {
        let mut arena = Arena::new();
        arena.append(1);
        let start = arena.next_handle();
        arena.append(2);
        arena.append(3);
        let range = arena.range_from(start);
        assert_eq!(range.len(), 2);
        let values: Vec<_> = range.iter().map(|h| arena[h]).collect();
        assert_eq!(values, vec![2, 3]);
        assert!(!range.contains(Handle::new(0)));
        assert!(arena.range_from(arena.next_handle()).is_empty());
    }

    #[test]
    fn unique_arena_interns_equal_values() {
        let mut arena = UniqueArena::new();
        let a = arena.insert(vec![4u32, 8]);
        let b = arena.insert(vec![8u32]);
        let c = arena.insert(vec![4u32, 8]);
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn handles_debug_print_as_ssa_names() {
        let h: Handle<u8> = Handle::new(7);
        assert_eq!(format!("{h:?}"), "%7");
        let r = Range::<u8>::new(Handle::new(2), Handle::new(5));
        assert_eq!(format!("{r:?}"), "%2..%5");
    }

    #[test]
    fn try_get_rejects_foreign_handles() {
        let mut arena = Arena::new();
        let h = arena.append(42);
        assert_eq!(arena.try_get(h), Some(&42));
        assert_eq!(arena.try_get(Handle::new(9)), None);
    }
}
