//! The session buffer allocator.
//!
//! [`BufferArena`] owns every shared buffer the client creates during a
//! session. Each allocation is registered for cleanup, so dropping the
//! arena (or calling [`BufferArena::release_all`]) unmaps and unlinks all
//! of them and no OS object outlives the session.

use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, warn};
use simlink_core::{BufferSpec, Element};

use crate::backend::IpcBackend;
use crate::error::ArenaError;
use crate::handle::BufferHandle;
use crate::mapping::Mapping;
use crate::naming::{validate_os_name, ShmNaming};

struct SharedBuffer {
    name: String,
    os_name: String,
    spec: BufferSpec,
    mapping: Mapping,
}

#[derive(Default)]
struct Slot {
    generation: u32,
    buffer: Option<SharedBuffer>,
}

/// Allocator and owner of a session's named shared buffers.
pub struct BufferArena {
    backend: Arc<dyn IpcBackend>,
    naming: ShmNaming,
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    /// Live buffer names to slot index, in allocation order.
    by_name: IndexMap<String, u32>,
}

impl BufferArena {
    /// Create an empty arena that allocates through `backend`.
    pub fn new(backend: Arc<dyn IpcBackend>, naming: ShmNaming) -> Self {
        Self {
            backend,
            naming,
            slots: Vec::new(),
            free_slots: Vec::new(),
            by_name: IndexMap::new(),
        }
    }

    /// The backend this arena allocates through.
    pub fn backend(&self) -> &Arc<dyn IpcBackend> {
        &self.backend
    }

    /// The naming scheme in use.
    pub fn naming(&self) -> &ShmNaming {
        &self.naming
    }

    /// Allocate a zero-initialised buffer.
    ///
    /// The OS object name is derived from the session naming and `name`,
    /// so the engine resolves the same region without any handshake.
    ///
    /// # Errors
    ///
    /// [`ArenaError::DuplicateName`] if `name` is live in this session,
    /// [`ArenaError::InvalidName`] if it cannot form an OS name, and
    /// [`ArenaError::Allocation`] if the backend fails.
    pub fn allocate(&mut self, name: &str, spec: BufferSpec) -> Result<BufferHandle, ArenaError> {
        if self.by_name.contains_key(name) {
            return Err(ArenaError::DuplicateName {
                name: name.to_string(),
            });
        }
        let os_name = self.naming.region(name);
        if name.is_empty() || !validate_os_name(&os_name) {
            return Err(ArenaError::InvalidName {
                name: name.to_string(),
            });
        }
        let mapping = self
            .backend
            .create_region(&os_name, spec.byte_len())
            .map_err(|source| ArenaError::Allocation {
                name: name.to_string(),
                source,
            })?;
        debug!("allocated buffer {name} {spec} as {os_name}");

        let buffer = SharedBuffer {
            name: name.to_string(),
            os_name,
            spec,
            mapping,
        };
        let slot = match self.free_slots.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let entry = &mut self.slots[slot as usize];
        entry.buffer = Some(buffer);
        self.by_name.insert(name.to_string(), slot);
        Ok(BufferHandle::new(slot, entry.generation))
    }

    fn resolve(&self, handle: BufferHandle) -> Result<&SharedBuffer, ArenaError> {
        self.slots
            .get(handle.slot as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.buffer.as_ref())
            .ok_or(ArenaError::StaleHandle {
                slot: handle.slot,
                handle_generation: handle.generation,
            })
    }

    fn resolve_mut(&mut self, handle: BufferHandle) -> Result<&mut SharedBuffer, ArenaError> {
        self.slots
            .get_mut(handle.slot as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.buffer.as_mut())
            .ok_or(ArenaError::StaleHandle {
                slot: handle.slot,
                handle_generation: handle.generation,
            })
    }

    /// Handle of the live buffer called `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<BufferHandle> {
        let slot = *self.by_name.get(name)?;
        Some(BufferHandle::new(slot, self.slots[slot as usize].generation))
    }

    /// Shape and element type of a buffer.
    pub fn spec(&self, handle: BufferHandle) -> Result<&BufferSpec, ArenaError> {
        Ok(&self.resolve(handle)?.spec)
    }

    /// Session-local name of a buffer.
    pub fn name(&self, handle: BufferHandle) -> Result<&str, ArenaError> {
        Ok(&self.resolve(handle)?.name)
    }

    /// OS object name of a buffer.
    pub fn os_name(&self, handle: BufferHandle) -> Result<&str, ArenaError> {
        Ok(&self.resolve(handle)?.os_name)
    }

    /// Zero-copy view of a buffer's bytes, exactly `spec.byte_len()` long.
    pub fn bytes(&self, handle: BufferHandle) -> Result<&[u8], ArenaError> {
        let buf = self.resolve(handle)?;
        let len = buf.spec.byte_len();
        Ok(&buf.mapping.as_slice()[..len])
    }

    /// Decode a buffer's full contents as `T`.
    ///
    /// # Errors
    ///
    /// [`ArenaError::TypeMismatch`] if `T` is not the buffer's element type.
    pub fn read<T: Element>(&self, handle: BufferHandle) -> Result<Vec<T>, ArenaError> {
        let buf = self.resolve(handle)?;
        let element = buf.spec.element();
        if T::ELEMENT_TYPE != element {
            return Err(ArenaError::TypeMismatch {
                name: buf.name.clone(),
                expected: element,
                actual: T::ELEMENT_TYPE,
            });
        }
        let width = element.size_bytes();
        let bytes = &buf.mapping.as_slice()[..buf.spec.byte_len()];
        Ok(bytes.chunks_exact(width).map(T::decode).collect())
    }

    /// Overwrite a buffer's full contents.
    ///
    /// # Errors
    ///
    /// [`ArenaError::TypeMismatch`] on a wrong element type and
    /// [`ArenaError::ShapeMismatch`] if `data` does not hold exactly the
    /// declared number of elements.
    pub fn write<T: Element>(&mut self, handle: BufferHandle, data: &[T]) -> Result<(), ArenaError> {
        let buf = self.resolve_mut(handle)?;
        let element = buf.spec.element();
        if T::ELEMENT_TYPE != element {
            return Err(ArenaError::TypeMismatch {
                name: buf.name.clone(),
                expected: element,
                actual: T::ELEMENT_TYPE,
            });
        }
        let expected = buf.spec.element_count();
        if data.len() != expected {
            return Err(ArenaError::ShapeMismatch {
                name: buf.name.clone(),
                expected,
                actual: data.len(),
            });
        }
        let width = element.size_bytes();
        let bytes = &mut buf.mapping.as_mut_slice()[..expected * width];
        for (out, v) in bytes.chunks_exact_mut(width).zip(data) {
            v.encode(out);
        }
        Ok(())
    }

    /// Copy raw bytes into a buffer at `offset`.
    ///
    /// # Errors
    ///
    /// [`ArenaError::OutOfBounds`] if the write does not fit.
    pub fn write_bytes_at(
        &mut self,
        handle: BufferHandle,
        offset: usize,
        data: &[u8],
    ) -> Result<(), ArenaError> {
        let buf = self.resolve_mut(handle)?;
        let capacity = buf.spec.byte_len();
        let end = offset.checked_add(data.len()).filter(|&e| e <= capacity);
        let Some(end) = end else {
            return Err(ArenaError::OutOfBounds {
                name: buf.name.clone(),
                offset,
                len: data.len(),
                capacity,
            });
        };
        buf.mapping.as_mut_slice()[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Release one buffer: unmap it and remove its OS name.
    ///
    /// The handle (and any copy of it) is stale afterwards.
    pub fn free(&mut self, handle: BufferHandle) -> Result<(), ArenaError> {
        self.resolve(handle)?;
        let slot = &mut self.slots[handle.slot as usize];
        if let Some(buf) = slot.buffer.take() {
            slot.generation = slot.generation.wrapping_add(1);
            self.free_slots.push(handle.slot);
            self.by_name.shift_remove(&buf.name);
            self.unlink(buf);
        }
        Ok(())
    }

    fn unlink(&self, buf: SharedBuffer) {
        let SharedBuffer {
            name,
            os_name,
            mapping,
            ..
        } = buf;
        drop(mapping);
        if let Err(e) = self.backend.unlink_region(&os_name) {
            warn!("failed to unlink buffer {name} ({os_name}): {e}");
        }
    }

    /// Release every buffer. Idempotent; also run on drop.
    pub fn release_all(&mut self) {
        if self.by_name.is_empty() {
            return;
        }
        let count = self.by_name.len();
        for idx in 0..self.slots.len() {
            let slot = &mut self.slots[idx];
            if let Some(buf) = slot.buffer.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free_slots.push(idx as u32);
                self.unlink(buf);
            }
        }
        self.by_name.clear();
        debug!("released {count} shared buffers");
    }

    /// Number of live buffers.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether no buffers are live.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Live buffer names in allocation order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}

impl Drop for BufferArena {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl std::fmt::Debug for BufferArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferArena")
            .field("naming", &self.naming)
            .field("buffers", &self.by_name.len())
            .finish()
    }
}
