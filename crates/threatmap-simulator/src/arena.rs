//! Generational slot storage for live simulations.

use threatmap_domain::SimId;

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Vec-backed arena handing out [`SimId`] keys.
///
/// Removing a value bumps its slot's generation, so a stale key never
/// resolves to whatever reuses the slot later.
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Arena<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn insert(&mut self, value: T) -> SimId {
        self.insert_with(|_| value)
    }

    /// Insert a value that needs to know its own key.
    pub fn insert_with(&mut self, build: impl FnOnce(SimId) -> T) -> SimId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            let key = SimId::new(index, slot.generation);
            slot.value = Some(build(key));
            return key;
        }

        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        let key = SimId::new(index, 0);
        self.slots.push(Slot {
            generation: 0,
            value: Some(build(key)),
        });
        key
    }

    pub fn get(&self, key: SimId) -> Option<&T> {
        self.slots
            .get(key.index() as usize)
            .filter(|slot| slot.generation == key.generation())
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, key: SimId) -> Option<&mut T> {
        self.slots
            .get_mut(key.index() as usize)
            .filter(|slot| slot.generation == key.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn remove(&mut self, key: SimId) -> Option<T> {
        let slot = self.slots.get_mut(key.index() as usize)?;
        if slot.generation != key.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index());
        self.len -= 1;
        Some(value)
    }

    pub fn contains(&self, key: SimId) -> bool {
        self.get(key).is_some()
    }

    /// Live keys in slot order.
    pub fn keys(&self) -> Vec<SimId> {
        self.iter().map(|(key, _)| key).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SimId, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let index = u32::try_from(index).ok()?;
            slot.value
                .as_ref()
                .map(|value| (SimId::new(index, slot.generation), value))
        })
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Remove every value, invalidating all outstanding keys.
    pub fn drain(&mut self) -> Vec<T> {
        let mut drained = Vec::with_capacity(self.len);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                slot.generation = slot.generation.wrapping_add(1);
                if let Ok(index) = u32::try_from(index) {
                    self.free.push(index);
                }
                drained.push(value);
            }
        }
        self.len = 0;
        drained
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}
