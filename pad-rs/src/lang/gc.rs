//! Object arena.
//!
//! Every runtime object is allocated through a [`Gc`].  The arena hands out a
//! slot addressed by a generation-checked [`ObjId`] and keeps a weak handle to
//! the object in it; ownership itself is the `Rc` returned by
//! [`Gc::alloc`].  Cloning an [`ObjRef`] is the reference-count increment,
//! dropping it the decrement, and when the last strong handle goes the
//! object's `Drop` returns its slot to the free list.
//!
//! There is no cycle collection: an array that contains itself keeps its slot
//! alive until the arena is dropped.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::object::{Dict, Obj, ObjRef, Object};

/// Stable identity of an allocated object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjId {
    index: u32,
    generation: u32,
}

impl ObjId {
    /// Integer form exposed to scripts by `id()`.
    pub fn as_int(self) -> i64 {
        (i64::from(self.generation) << 32) | i64::from(self.index)
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    obj: Weak<Obj>,
}

#[derive(Debug, Default)]
pub(crate) struct Arena {
    slots: RefCell<Vec<Slot>>,
    free: RefCell<Vec<u32>>,
}

impl Arena {
    fn claim(&self) -> ObjId {
        let mut slots = self.slots.borrow_mut();
        if let Some(index) = self.free.borrow_mut().pop() {
            let slot = &mut slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            return ObjId {
                index,
                generation: slot.generation,
            };
        }
        let index = slots.len() as u32;
        slots.push(Slot::default());
        ObjId {
            index,
            generation: 0,
        }
    }

    pub(crate) fn release(&self, id: ObjId) {
        let Ok(mut slots) = self.slots.try_borrow_mut() else {
            return;
        };
        if let Some(slot) = slots.get_mut(id.index as usize) {
            if slot.generation == id.generation {
                slot.obj = Weak::new();
                self.free.borrow_mut().push(id.index);
            }
        }
    }
}

/// Handle to an object arena.  Cheap to clone; clones share the arena.
#[derive(Debug, Clone, Default)]
pub struct Gc {
    arena: Rc<Arena>,
}

impl Gc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&self, value: Object) -> ObjRef {
        let id = self.arena.claim();
        let obj = Rc::new(Obj::new(id, Rc::downgrade(&self.arena), value));
        if let Some(slot) = self.arena.slots.borrow_mut().get_mut(id.index as usize) {
            slot.obj = Rc::downgrade(&obj);
        }
        obj
    }

    /// Look an object up by id; `None` once it has been freed, even if the
    /// slot has since been reused.
    pub fn get(&self, id: ObjId) -> Option<ObjRef> {
        let slots = self.arena.slots.borrow();
        let slot = slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.obj.upgrade()
    }

    /// Number of objects currently alive in this arena.
    pub fn live(&self) -> usize {
        self.arena.slots.borrow().len() - self.arena.free.borrow().len()
    }

    // ── Constructors ──────────────────────────────────────────────────────────

    pub fn nil(&self) -> ObjRef {
        self.alloc(Object::Nil)
    }

    pub fn boolean(&self, b: bool) -> ObjRef {
        self.alloc(Object::Bool(b))
    }

    pub fn int(&self, n: i64) -> ObjRef {
        self.alloc(Object::Int(n))
    }

    pub fn string(&self, s: impl Into<String>) -> ObjRef {
        self.alloc(Object::Str(s.into()))
    }

    pub fn array(&self, items: Vec<ObjRef>) -> ObjRef {
        self.alloc(Object::Array(RefCell::new(items)))
    }

    pub fn dict(&self, dict: Dict) -> ObjRef {
        self.alloc(Object::Dict(RefCell::new(dict)))
    }
}
