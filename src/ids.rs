//! Index-based handles standing in for the source's pointer graph.
//!
//! Cross-resource references (Space <-> World, NavBlocker/Navigator <-> Layer)
//! are plain integer ids into arenas owned by [`crate::world::World`] /
//! [`crate::layer::Layer`], matching the "Pointer graphs -> indices" design
//! note. Removal uses an `Option<T>` slot plus a free list rather than
//! shifting the arena; a generation counter catches stale ids that refer to
//! a slot reused by a different resource.

use std::fmt;

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            pub(crate) index: u32,
            pub(crate) generation: u32,
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}#{})", stringify!($name), self.index, self.generation)
            }
        }
    };
}

define_id!(SpaceId);
define_id!(BlockerId);
define_id!(NavigatorId);
define_id!(TerrainSpaceId);

/// Typed wrapper so a single `Arena<T>` can mint the right id kind.
pub trait IdKind: Copy {
    fn new(index: u32, generation: u32) -> Self;
    fn parts(self) -> (u32, u32);
}

macro_rules! impl_id_kind {
    ($name:ident) => {
        impl IdKind for $name {
            fn new(index: u32, generation: u32) -> Self {
                $name { index, generation }
            }
            fn parts(self) -> (u32, u32) {
                (self.index, self.generation)
            }
        }
    };
}
impl_id_kind!(SpaceId);
impl_id_kind!(BlockerId);
impl_id_kind!(NavigatorId);
impl_id_kind!(TerrainSpaceId);

/// Simple generational arena. Slots are reused (via a free list) so that
/// indices stay dense, but a stale id (from before a slot was freed) is
/// rejected because its generation no longer matches.
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self { slots: Vec::new(), free: Vec::new() }
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<Id: IdKind>(&mut self, value: T) -> Id {
        let (index, generation) = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            (index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, value: Some(value) });
            (index, 0)
        };
        Id::new(index, generation)
    }

    pub fn remove<Id: IdKind>(&mut self, id: Id) -> Option<T> {
        let (index, generation) = id.parts();
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.value.take();
        if value.is_some() {
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index);
        }
        value
    }

    pub fn get<Id: IdKind>(&self, id: Id) -> Option<&T> {
        let (index, generation) = id.parts();
        let slot = self.slots.get(index as usize)?;
        (slot.generation == generation).then(|| slot.value.as_ref()).flatten()
    }

    pub fn get_mut<Id: IdKind>(&mut self, id: Id) -> Option<&mut T> {
        let (index, generation) = id.parts();
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.value.as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(|slot| slot.value.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().filter_map(|slot| slot.value.as_mut())
    }

    pub fn iter_with_id<Id: IdKind>(&self) -> impl Iterator<Item = (Id, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value.as_ref().map(|v| (Id::new(i as u32, slot.generation), v))
        })
    }
}
