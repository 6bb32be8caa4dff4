//! Generational slot pools for enemies and projectiles.
//!
//! Slots are reused instead of reallocated. Every release bumps the slot's
//! generation, so a [`Handle`] taken before the release no longer resolves
//! once the slot is recycled.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// Reference to a pooled object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// Slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation the handle was issued for.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Slot<T> {
    generation: u32,
    active: bool,
    value: T,
}

/// Fixed-size arena with optional doubling growth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool<T> {
    name: String,
    slots: Vec<Slot<T>>,
    /// Free slot indices, next to reuse on top.
    free: Vec<u32>,
    growable: bool,
    active: usize,
    grown_to: Option<usize>,
}

impl<T: Default> Pool<T> {
    /// Create a pool with `capacity` pre-allocated slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(name: &str, capacity: usize, growable: bool) -> Self {
        assert!(capacity > 0, "pool capacity must be positive");
        let mut pool = Self {
            name: name.to_string(),
            slots: Vec::with_capacity(capacity),
            free: Vec::with_capacity(capacity),
            growable,
            active: 0,
            grown_to: None,
        };
        pool.extend_to(capacity);
        pool
    }

    /// Take a free slot and overwrite it with `value`.
    ///
    /// When the pool is full it doubles if growable, otherwise fails with
    /// [`GameError::PoolExhausted`] and nothing changes.
    pub fn acquire(&mut self, value: T) -> Result<Handle> {
        if self.free.is_empty() {
            let capacity = self.slots.len();
            if !self.growable {
                return Err(GameError::PoolExhausted {
                    pool: self.name.clone(),
                    capacity,
                });
            }
            let doubled = capacity * 2;
            tracing::warn!(pool = %self.name, from = capacity, to = doubled, "Pool grown");
            self.extend_to(doubled);
            self.grown_to = Some(doubled);
        }

        let index = self.free.pop().ok_or_else(|| GameError::PoolExhausted {
            pool: self.name.clone(),
            capacity: self.slots.len(),
        })?;
        let slot = &mut self.slots[index as usize];
        slot.active = true;
        slot.value = value;
        self.active += 1;
        Ok(Handle {
            index,
            generation: slot.generation,
        })
    }

    fn extend_to(&mut self, capacity: usize) {
        let start = self.slots.len();
        self.slots.resize_with(capacity, || Slot {
            generation: 0,
            active: false,
            value: T::default(),
        });
        // New slots go under the existing free list.
        let mut fresh: Vec<u32> = (start as u32..capacity as u32).rev().collect();
        fresh.extend(self.free.drain(..));
        self.free = fresh;
    }
}

impl<T> Pool<T> {
    /// Mark the slot free. Returns `false` for a stale or unknown handle.
    pub fn release(&mut self, handle: Handle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index as usize) else {
            return false;
        };
        if !slot.active || slot.generation != handle.generation {
            return false;
        }
        slot.active = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.active -= 1;
        true
    }

    /// Resolve a handle, `None` if released or recycled.
    #[must_use]
    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.active && slot.generation == handle.generation)
            .map(|slot| &slot.value)
    }

    /// Resolve a handle mutably.
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.active && slot.generation == handle.generation)
            .map(|slot| &mut slot.value)
    }

    /// Whether the handle still refers to a live object.
    #[must_use]
    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Live objects.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.active
    }

    /// No live objects.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.active == 0
    }

    /// Total slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Pool name used in logs and errors.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capacity reached by the last growth, cleared on read.
    pub fn take_growth(&mut self) -> Option<usize> {
        self.grown_to.take()
    }

    /// Handles of live objects in slot order.
    #[must_use]
    pub fn handles(&self) -> Vec<Handle> {
        self.iter().map(|(handle, _)| handle).collect()
    }

    /// Live objects in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter(|(_, s)| s.active).map(|(i, s)| {
            (
                Handle {
                    index: i as u32,
                    generation: s.generation,
                },
                &s.value,
            )
        })
    }

    /// Live objects in slot order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter(|(_, s)| s.active)
            .map(|(i, s)| {
                (
                    Handle {
                        index: i as u32,
                        generation: s.generation,
                    },
                    &mut s.value,
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let mut pool: Pool<u32> = Pool::new("test", 2, false);
        let a = pool.acquire(10).unwrap();
        let b = pool.acquire(20).unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(a), Some(&10));
        assert_eq!(pool.get(b), Some(&20));

        assert!(pool.release(a));
        assert!(!pool.release(a));
        assert_eq!(pool.get(a), None);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_stale_handle_after_recycle() {
        let mut pool: Pool<u32> = Pool::new("test", 1, false);
        let old = pool.acquire(1).unwrap();
        pool.release(old);
        let new = pool.acquire(2).unwrap();
        assert_eq!(old.index(), new.index());
        assert_ne!(old.generation(), new.generation());
        assert_eq!(pool.get(old), None);
        assert_eq!(pool.get(new), Some(&2));
    }

    #[test]
    fn test_exhausted_without_growth() {
        let mut pool: Pool<u32> = Pool::new("bullets", 1, false);
        pool.acquire(1).unwrap();
        let err = pool.acquire(2).unwrap_err();
        assert!(matches!(
            err,
            GameError::PoolExhausted { ref pool, capacity: 1 } if pool == "bullets"
        ));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_growth_doubles() {
        let mut pool: Pool<u32> = Pool::new("enemies", 2, true);
        pool.acquire(1).unwrap();
        pool.acquire(2).unwrap();
        assert_eq!(pool.take_growth(), None);
        let third = pool.acquire(3).unwrap();
        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.take_growth(), Some(4));
        assert_eq!(pool.take_growth(), None);
        assert_eq!(third.index(), 2);
    }

    #[test]
    fn test_last_freed_slot_reused_first() {
        let mut pool: Pool<u32> = Pool::new("test", 4, false);
        let handles: Vec<_> = (0..4).map(|i| pool.acquire(i).unwrap()).collect();
        pool.release(handles[3]);
        pool.release(handles[1]);
        assert_eq!(pool.acquire(9).unwrap().index(), 1);
        let values: Vec<u32> = pool.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![0, 9, 2]);
    }
}
