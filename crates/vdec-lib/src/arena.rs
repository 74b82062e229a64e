//! Generation-checked slot storage backing the opaque handles.
//!
//! A handle packs `(generation << 32) | (slot + 1)`, so the value 0 is never
//! issued and reusing a slot invalidates every handle that pointed at it.

use std::ffi::c_void;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    pub fn from_raw(raw: *mut c_void) -> Option<Self> {
        let value = raw as usize as u64;
        if value == 0 {
            None
        } else {
            Some(Handle(value))
        }
    }

    pub fn into_raw(self) -> *mut c_void {
        self.0 as usize as *mut c_void
    }

    pub fn to_bits(self) -> u64 {
        self.0
    }

    fn slot(self) -> Option<usize> {
        let low = (self.0 & 0xFFFF_FFFF) as usize;
        low.checked_sub(1)
    }

    fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    fn new(slot: usize, generation: u32) -> Self {
        Handle(((generation as u64) << 32) | (slot as u64 + 1))
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

pub struct HandleArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    capacity: usize,
    live: usize,
}

impl<T> HandleArena<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            capacity,
            live: 0,
        }
    }

    /// Stores `value`, handing it back if the arena is full.
    pub fn insert(&mut self, value: T) -> Result<Handle, T> {
        if self.live >= self.capacity {
            return Err(value);
        }
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    // Generation 0 would let slot 0 collide with small raw values.
                    generation: 1,
                    value: None,
                });
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.value = Some(value);
        self.live += 1;
        Ok(Handle::new(index, slot.generation))
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        let slot = self.slots.get(handle.slot()?)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.slot()?)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let index = handle.slot()?;
        let slot = self.slots.get_mut(index)?;
        if slot.generation != handle.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free.push(index);
        self.live -= 1;
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Drops every stored value and invalidates all outstanding handles.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1).max(1);
                self.free.push(index);
            }
        }
        self.live = 0;
    }
}
