//! Per-game directory of networked objects
//!
//! Objects live in an arena of generation-tagged slots. The wire handle maps
//! to a slot index; an [`ObjectKey`] names a slot *and* the generation it was
//! issued for, so a key kept past a despawn resolves to nothing instead of
//! whatever object later reuses the slot.

use crate::net_objects::NetObject;
use shared::protocol::INVALID_HANDLE;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("handle {0} is already registered")]
    DuplicateHandle(u32),
    #[error("cannot register an object with the invalid handle")]
    InvalidHandle,
}

/// Stable reference to one registration of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    object: Option<NetObject>,
}

#[derive(Debug, Default)]
pub struct NetObjectRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_handle: HashMap<u32, u32>,
}

impl NetObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `object` under its own handle.
    ///
    /// Handles come from the wire; the registry never assigns them. On
    /// failure the object is dropped and the registry is unchanged.
    pub fn add(&mut self, object: NetObject) -> Result<ObjectKey, RegistryError> {
        let handle = object.handle;
        if handle == INVALID_HANDLE {
            return Err(RegistryError::InvalidHandle);
        }
        if self.by_handle.contains_key(&handle) {
            return Err(RegistryError::DuplicateHandle(handle));
        }

        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].object = Some(object);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    object: Some(object),
                });
                (self.slots.len() - 1) as u32
            }
        };

        self.by_handle.insert(handle, index);
        Ok(ObjectKey {
            index,
            generation: self.slots[index as usize].generation,
        })
    }

    /// Detaches the object registered under `handle`.
    ///
    /// The returned object carries [`INVALID_HANDLE`]. Removing an absent
    /// handle is a no-op.
    pub fn remove(&mut self, handle: u32) -> Option<NetObject> {
        let index = self.by_handle.remove(&handle)?;
        let slot = &mut self.slots[index as usize];
        let mut object = slot.object.take()?;

        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);

        object.handle = INVALID_HANDLE;
        Some(object)
    }

    pub fn find(&self, handle: u32) -> Option<&NetObject> {
        let index = *self.by_handle.get(&handle)?;
        self.slots[index as usize].object.as_ref()
    }

    pub fn find_mut(&mut self, handle: u32) -> Option<&mut NetObject> {
        let index = *self.by_handle.get(&handle)?;
        self.slots[index as usize].object.as_mut()
    }

    pub fn key_of(&self, handle: u32) -> Option<ObjectKey> {
        let index = *self.by_handle.get(&handle)?;
        Some(ObjectKey {
            index,
            generation: self.slots[index as usize].generation,
        })
    }

    /// Resolves a key; stale keys resolve to `None`.
    pub fn get(&self, key: ObjectKey) -> Option<&NetObject> {
        let slot = self.slots.get(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.object.as_ref()
    }

    pub fn get_mut(&mut self, key: ObjectKey) -> Option<&mut NetObject> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.object.as_mut()
    }

    pub fn contains(&self, handle: u32) -> bool {
        self.by_handle.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }

    /// Iterates live objects in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &NetObject> {
        self.slots.iter().filter_map(|slot| slot.object.as_ref())
    }

    /// Removes every object, invalidating all outstanding keys.
    ///
    /// Returns each object with the handle it was registered under.
    pub fn clear(&mut self) -> Vec<(u32, NetObject)> {
        let mut handles: Vec<u32> = self.by_handle.keys().copied().collect();
        handles.sort_unstable();

        let mut removed = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Some(object) = self.remove(handle) {
                removed.push((handle, object));
            }
        }
        removed
    }
}
