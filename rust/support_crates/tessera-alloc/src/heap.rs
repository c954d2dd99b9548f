//! Reference in-process allocator backed by aligned, zero-filled heap blocks.
//!
//! `HeapAllocator` keeps a table of live blocks keyed by handle. Each block
//! tracks its outstanding locks: any number of readers, or a single writer.
//! Conflicting locks, unlocks of unlocked handles and frees of locked or unknown
//! handles are reported as protocol violations instead of corrupting state.

use std::alloc::Layout;
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard};

use tessera_common::{Result, error::Error, verify_arg};

use crate::allocator::{Allocator, LockMode, LockedRegion, StorageHandle};

/// Default alignment of heap blocks, in bytes.
const DEFAULT_ALIGNMENT: usize = 64;

/// Largest alignment accepted by [`HeapAllocatorConfig`].
const MAX_ALIGNMENT: usize = 4096;

/// Configuration of a [`HeapAllocator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapAllocatorConfig {
    /// Alignment of every block, in bytes. Must be a power of two no greater
    /// than 4096.
    pub alignment: usize,

    /// Upper bound on the total number of bytes live at once, if any.
    pub capacity_limit: Option<usize>,
}

impl Default for HeapAllocatorConfig {
    fn default() -> Self {
        Self {
            alignment: DEFAULT_ALIGNMENT,
            capacity_limit: None,
        }
    }
}

impl HeapAllocatorConfig {
    /// Creates a validated configuration.
    pub fn with_all_parameters(
        alignment: usize,
        capacity_limit: Option<usize>,
    ) -> Result<HeapAllocatorConfig> {
        let config = HeapAllocatorConfig {
            alignment,
            capacity_limit,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn capacity_limit(mut self, limit: usize) -> Self {
        self.capacity_limit = Some(limit);
        self
    }

    pub fn validate(&self) -> Result<()> {
        verify_arg!(alignment, self.alignment.is_power_of_two());
        verify_arg!(alignment, self.alignment <= MAX_ALIGNMENT);
        Ok(())
    }
}

/// A heap allocator with per-handle lock tracking.
pub struct HeapAllocator {
    config: HeapAllocatorConfig,
    state: Mutex<HeapState>,
}

impl HeapAllocator {
    /// Creates an allocator with the default configuration.
    pub fn new() -> HeapAllocator {
        HeapAllocator {
            config: HeapAllocatorConfig::default(),
            state: Mutex::new(HeapState::default()),
        }
    }

    /// Creates an allocator with the given configuration.
    pub fn with_config(config: HeapAllocatorConfig) -> Result<HeapAllocator> {
        config.validate()?;
        Ok(HeapAllocator {
            config,
            state: Mutex::new(HeapState::default()),
        })
    }

    pub fn config(&self) -> &HeapAllocatorConfig {
        &self.config
    }

    /// Total number of bytes currently allocated (as requested by callers).
    pub fn allocated_bytes(&self) -> usize {
        self.state().allocated_bytes
    }

    /// Number of blocks that have been allocated and not yet freed.
    pub fn live_allocations(&self) -> usize {
        self.state().blocks.len()
    }

    fn state(&self) -> MutexGuard<'_, HeapState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for HeapAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HeapAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("HeapAllocator")
            .field("config", &self.config)
            .field("live_allocations", &state.blocks.len())
            .field("allocated_bytes", &state.allocated_bytes)
            .finish()
    }
}

unsafe impl Allocator for HeapAllocator {
    fn allocate(&self, size: usize) -> Result<StorageHandle> {
        let mut state = self.state();
        if let Some(limit) = self.config.capacity_limit {
            let total = state.allocated_bytes.saturating_add(size);
            if total > limit {
                return Err(Error::allocation_failure(
                    size,
                    format!(
                        "capacity limit of {limit} bytes exceeded ({} bytes in use)",
                        state.allocated_bytes
                    ),
                ));
            }
        }

        let storage = AlignedStorage::zeroed(size, self.config.alignment)?;
        state.next_id += 1;
        let id = state.next_id;
        state.allocated_bytes += size;
        state.blocks.insert(
            id,
            Block {
                storage,
                size,
                readers: 0,
                writer: false,
            },
        );
        log::debug!("heap: allocated {size} bytes as block {id}");
        Ok(StorageHandle::from_raw(id))
    }

    unsafe fn free(&self, handle: StorageHandle) -> Result<()> {
        let mut state = self.state();
        let id = handle.into_raw();
        let block = state
            .blocks
            .get(&id)
            .ok_or_else(|| Error::protocol_violation(format!("free of unknown {handle:?}")))?;
        if block.is_locked() {
            return Err(Error::protocol_violation(format!(
                "free of locked {handle:?}"
            )));
        }
        if let Some(block) = state.blocks.remove(&id) {
            state.allocated_bytes -= block.size;
            log::debug!("heap: freed block {id} ({} bytes)", block.size);
        }
        Ok(())
    }

    fn lock(&self, handle: StorageHandle, mode: LockMode) -> Result<LockedRegion> {
        let mut state = self.state();
        let block = state
            .blocks
            .get_mut(&handle.into_raw())
            .ok_or_else(|| Error::protocol_violation(format!("lock of unknown {handle:?}")))?;
        if block.writer {
            return Err(Error::protocol_violation(format!(
                "{handle:?} is already locked for writing"
            )));
        }
        match mode {
            LockMode::ReadOnly => block.readers += 1,
            LockMode::ReadWrite => {
                if block.readers != 0 {
                    return Err(Error::protocol_violation(format!(
                        "{handle:?} is locked by {} reader(s)",
                        block.readers
                    )));
                }
                block.writer = true;
            }
        }
        Ok(LockedRegion {
            ptr: block.storage.ptr,
            len: block.size,
        })
    }

    unsafe fn unlock(&self, handle: StorageHandle) -> Result<()> {
        let mut state = self.state();
        let block = state
            .blocks
            .get_mut(&handle.into_raw())
            .ok_or_else(|| Error::protocol_violation(format!("unlock of unknown {handle:?}")))?;
        if block.writer {
            block.writer = false;
        } else if block.readers > 0 {
            block.readers -= 1;
        } else {
            return Err(Error::protocol_violation(format!(
                "unlock of {handle:?} without a matching lock"
            )));
        }
        Ok(())
    }
}

#[derive(Default)]
struct HeapState {
    blocks: HashMap<u64, Block>,
    next_id: u64,
    allocated_bytes: usize,
}

struct Block {
    storage: AlignedStorage,
    /// Size requested by the caller; `storage` may be larger.
    size: usize,
    readers: u32,
    writer: bool,
}

impl Block {
    fn is_locked(&self) -> bool {
        self.writer || self.readers != 0
    }
}

/// A zero-filled heap block with a fixed alignment.
///
/// The address never changes for the life of the block, so pointers handed
/// out by `lock` stay valid while the block table is rehashed.
struct AlignedStorage {
    ptr: NonNull<u8>,
    layout: Layout,
}

// The block is plain bytes; access is serialized by the lock protocol.
unsafe impl Send for AlignedStorage {}

impl AlignedStorage {
    fn zeroed(size: usize, alignment: usize) -> Result<AlignedStorage> {
        let layout = Layout::from_size_align(size.max(1), alignment)
            .map_err(|e| Error::allocation_failure(size, e.to_string()))?;
        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr)
            .ok_or_else(|| Error::allocation_failure(size, "out of memory"))?;
        Ok(AlignedStorage { ptr, layout })
    }
}

impl Drop for AlignedStorage {
    fn drop(&mut self) {
        // SAFETY: `ptr` was returned by `alloc_zeroed` with this same layout.
        unsafe { std::alloc::dealloc(self.ptr.as_ptr(), self.layout) };
    }
}
