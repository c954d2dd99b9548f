//! A registry of buffers addressed by generation-checked ids.
//!
//! [`ProxyBuffer`] borrows its backing buffer, which ties the proxy to a scope.
//! When a view has to be stored or passed around independently of the
//! buffer's owner, a [`ProxyDescriptor`] records the window by [`BufferId`]
//! instead, and [`BufferArena::resolve`] turns it back into a proxy on demand.
//! Removing a buffer bumps its slot's generation, so descriptors and ids that
//! referred to it fail to resolve rather than observing a different buffer.

use std::fmt;

use tessera_common::{Result, error::Error};

use crate::buffer::Buffer;
use crate::element::ElementKind;
use crate::proxy::ProxyBuffer;
use crate::shape::ShapeDescriptor;

/// Stable identifier of a buffer inside a [`BufferArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId {
    index: u32,
    generation: u32,
}

impl BufferId {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferId({}v{})", self.index, self.generation)
    }
}

/// A validated proxy window recorded by backing-buffer id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyDescriptor {
    backing: BufferId,
    kind: ElementKind,
    element_offset: usize,
    shape: ShapeDescriptor,
}

impl ProxyDescriptor {
    pub fn backing(&self) -> BufferId {
        self.backing
    }

    pub fn element_kind(&self) -> ElementKind {
        self.kind
    }

    pub fn element_offset(&self) -> usize {
        self.element_offset
    }

    pub fn shape(&self) -> &ShapeDescriptor {
        &self.shape
    }
}

struct Slot {
    generation: u32,
    buffer: Option<Buffer>,
}

/// Owns a set of buffers and hands out [`BufferId`]s for them.
#[derive(Default)]
pub struct BufferArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl BufferArena {
    pub fn new() -> BufferArena {
        BufferArena::default()
    }

    /// Number of buffers currently held.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Takes ownership of `buffer` and returns its id.
    ///
    /// Fails with `AllocationFailure` if the arena would need more slots than
    /// a `u32` index can address.
    pub fn insert(&mut self, buffer: Buffer) -> Result<BufferId> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.buffer = Some(buffer);
            self.len += 1;
            return Ok(BufferId {
                index,
                generation: slot.generation,
            });
        }
        let index = slot_index(self.slots.len())?;
        self.slots.push(Slot {
            generation: 0,
            buffer: Some(buffer),
        });
        self.len += 1;
        Ok(BufferId {
            index,
            generation: 0,
        })
    }

    pub fn contains(&self, id: BufferId) -> bool {
        self.get(id).is_ok()
    }

    pub fn get(&self, id: BufferId) -> Result<&Buffer> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.buffer.as_ref())
            .ok_or_else(|| Error::unknown_buffer(id.index, id.generation))
    }

    pub fn get_mut(&mut self, id: BufferId) -> Result<&mut Buffer> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.buffer.as_mut())
            .ok_or_else(|| Error::unknown_buffer(id.index, id.generation))
    }

    /// Removes the buffer and returns it to the caller; the id becomes stale.
    pub fn remove(&mut self, id: BufferId) -> Result<Buffer> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .ok_or_else(|| Error::unknown_buffer(id.index, id.generation))?;
        let buffer = slot
            .buffer
            .take()
            .ok_or_else(|| Error::unknown_buffer(id.index, id.generation))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Ok(buffer)
    }

    /// Iterates over the live buffers and their ids.
    pub fn iter(&self) -> impl Iterator<Item = (BufferId, &Buffer)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.buffer.as_ref().map(|buffer| {
                (
                    BufferId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    buffer,
                )
            })
        })
    }

    /// Validates a proxy window over the buffer `backing` and records it.
    ///
    /// Fails with `UnknownBuffer` for a stale id and with `OutOfRange` when
    /// the window does not fit, exactly as [`ProxyBuffer::new`] would.
    pub fn describe_proxy(
        &self,
        backing: BufferId,
        kind: ElementKind,
        element_offset: usize,
        shape: impl Into<ShapeDescriptor>,
    ) -> Result<ProxyDescriptor> {
        let shape = shape.into();
        ProxyBuffer::new(kind, self.get(backing)?, element_offset, shape.clone())?;
        Ok(ProxyDescriptor {
            backing,
            kind,
            element_offset,
            shape,
        })
    }

    /// Builds the proxy a descriptor refers to, re-validating the window
    /// against the backing buffer as it is now.
    pub fn resolve(&self, descriptor: &ProxyDescriptor) -> Result<ProxyBuffer<'_>> {
        ProxyBuffer::new(
            descriptor.kind,
            self.get(descriptor.backing)?,
            descriptor.element_offset,
            descriptor.shape.clone(),
        )
    }
}

fn slot_index(slot_count: usize) -> Result<u32> {
    u32::try_from(slot_count).map_err(|_| {
        Error::allocation_failure(slot_count, "arena slot index does not fit in u32")
    })
}

impl fmt::Debug for BufferArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
