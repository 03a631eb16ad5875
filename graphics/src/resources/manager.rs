use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::error::ResourceError;
use crate::frame::FrameContext;
use crate::types::ImageDescriptor;

use super::policy::{OutOfRange, ReplicationCounts, ReplicationPolicy};
use super::{LogicalResourceId, PhysicalCopyHandle, ResourceDescriptor};

/// Acknowledgement that the caller synchronizes a rewrite of a
/// [`Single`](ReplicationPolicy::Single) resource with every frame that may
/// still read it, typically by waiting for the GPU to go idle first.
///
/// Single-policy resources accept exactly one plain [`ResourceManager::write`].
/// Later writes must go through [`ResourceManager::write_synchronized`] with
/// this token.
#[derive(Debug, Clone, Copy)]
pub struct ExternalSync {
    _private: (),
}

impl ExternalSync {
    /// Create the acknowledgement.
    pub fn acknowledged() -> Self {
        Self { _private: () }
    }
}

#[derive(Debug)]
struct PhysicalCopy {
    data: Vec<u8>,
    capacity: u64,
    generation: u64,
    written: bool,
}

impl PhysicalCopy {
    fn new(capacity: u64, generation: u64) -> Self {
        Self {
            data: Vec::new(),
            capacity,
            generation,
            written: false,
        }
    }
}

#[derive(Debug)]
struct LogicalResource {
    name: String,
    descriptor: ResourceDescriptor,
    policy: ReplicationPolicy,
    copies: Vec<PhysicalCopy>,
    destroyed: bool,
}

#[derive(Debug)]
struct RetiredCopy {
    handle: PhysicalCopyHandle,
    copy: PhysicalCopy,
    retire_at: u64,
}

/// Owns every logical resource and its physical copies.
///
/// Each logical resource sits behind its own lock, so update tasks writing
/// different resources proceed in parallel and [`resolve`](Self::resolve)
/// never waits on another resource.
///
/// # Example
///
/// ```ignore
/// let manager = ResourceManager::new(ReplicationCounts::with_images(3), 1 << 20);
/// let camera = manager.declare("camera", ResourceDescriptor::uniform(128), ReplicationPolicy::PerImage)?;
///
/// manager.write(camera, &ctx, bytemuck::bytes_of(&camera_uniforms))?;
/// let handle = manager.resolve(camera, &ctx)?;
/// ```
#[derive(Debug)]
pub struct ResourceManager {
    counts: ReplicationCounts,
    max_capacity: u64,
    resources: RwLock<Vec<Arc<RwLock<LogicalResource>>>>,
    names: RwLock<HashMap<String, LogicalResourceId>>,
    retired: Mutex<Vec<RetiredCopy>>,
    next_generation: AtomicU64,
}

static_assertions::assert_impl_all!(ResourceManager: Send, Sync);

/// Smallest power-of-two multiple of `current` that holds `required`, capped at `max`.
fn next_capacity_class(current: u64, required: u64, max: u64) -> u64 {
    let mut capacity = current.max(1);
    while capacity < required {
        capacity = capacity.saturating_mul(2);
    }
    capacity.min(max)
}

impl ResourceManager {
    /// Create a manager for the given replication counts.
    ///
    /// `max_capacity` is the hard per-copy limit in bytes.
    pub fn new(counts: ReplicationCounts, max_capacity: u64) -> Self {
        Self {
            counts,
            max_capacity,
            resources: RwLock::new(Vec::new()),
            names: RwLock::new(HashMap::new()),
            retired: Mutex::new(Vec::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Replication counts.
    pub fn counts(&self) -> ReplicationCounts {
        self.counts
    }

    /// Hard per-copy capacity limit in bytes.
    pub fn max_capacity(&self) -> u64 {
        self.max_capacity
    }

    fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    fn entry(&self, id: LogicalResourceId) -> Result<Arc<RwLock<LogicalResource>>, ResourceError> {
        self.resources
            .read()
            .get(id.index())
            .cloned()
            .ok_or(ResourceError::UnknownResource(id))
    }

    fn slot_of(&self, resource: &LogicalResource, ctx: &FrameContext) -> Result<usize, ResourceError> {
        resource
            .policy
            .slot(ctx, &self.counts)
            .map_err(|OutOfRange { axis, index, count }| ResourceError::FrameContextOutOfRange {
                name: resource.name.clone(),
                axis,
                index,
                count,
            })
    }

    fn check_capacity(&self, name: &str, size: u64) -> Result<(), ResourceError> {
        if size > self.max_capacity {
            return Err(ResourceError::CapacityExceeded {
                name: name.to_string(),
                size,
                max: self.max_capacity,
            });
        }
        Ok(())
    }

    fn retire(&self, handle: PhysicalCopyHandle, copy: PhysicalCopy, frame_index: u64) {
        let retire_at = frame_index + self.counts.retirement_horizon();
        log::trace!(
            "Retiring copy {} of resource {} (generation {}) at frame {}",
            handle.slot,
            handle.resource,
            handle.generation,
            retire_at
        );
        self.retired.lock().push(RetiredCopy {
            handle,
            copy,
            retire_at,
        });
    }

    /// Declare a logical resource and allocate its copies.
    pub fn declare(
        &self,
        name: impl Into<String>,
        descriptor: ResourceDescriptor,
        policy: ReplicationPolicy,
    ) -> Result<LogicalResourceId, ResourceError> {
        let name = name.into();
        let mut names = self.names.write();
        if names.contains_key(&name) {
            return Err(ResourceError::DuplicateName(name));
        }
        self.check_capacity(&name, descriptor.initial_capacity)?;

        let copies = (0..policy.copy_count(&self.counts))
            .map(|_| PhysicalCopy::new(descriptor.initial_capacity, self.next_generation()))
            .collect::<Vec<_>>();

        let mut resources = self.resources.write();
        let id = LogicalResourceId::new(resources.len() as u32);
        log::debug!(
            "Declared resource '{}' {} ({:?}, {}, {} copies of {} bytes)",
            name,
            id,
            descriptor.kind,
            policy,
            copies.len(),
            descriptor.initial_capacity
        );
        resources.push(Arc::new(RwLock::new(LogicalResource {
            name: name.clone(),
            descriptor,
            policy,
            copies,
            destroyed: false,
        })));
        names.insert(name, id);
        Ok(id)
    }

    /// Copy `payload` into the copy selected by the resource's policy and `ctx`.
    ///
    /// A payload larger than the copy's capacity reallocates the copy. The
    /// superseded copy stays readable until it retires.
    ///
    /// # Errors
    ///
    /// - [`ResourceError::CapacityExceeded`] if the payload is larger than the
    ///   hard maximum. Nothing is written.
    /// - [`ResourceError::UnsynchronizedRewrite`] for a second write to a
    ///   single-policy resource.
    pub fn write(
        &self,
        id: LogicalResourceId,
        ctx: &FrameContext,
        payload: &[u8],
    ) -> Result<(), ResourceError> {
        self.write_impl(id, ctx, payload, false)
    }

    /// Like [`write`](Self::write), but also accepts rewrites of single-policy
    /// resources.
    pub fn write_synchronized(
        &self,
        id: LogicalResourceId,
        ctx: &FrameContext,
        payload: &[u8],
        _sync: ExternalSync,
    ) -> Result<(), ResourceError> {
        self.write_impl(id, ctx, payload, true)
    }

    fn write_impl(
        &self,
        id: LogicalResourceId,
        ctx: &FrameContext,
        payload: &[u8],
        synchronized: bool,
    ) -> Result<(), ResourceError> {
        let entry = self.entry(id)?;
        let mut resource = entry.write();
        if resource.destroyed {
            return Err(ResourceError::UnknownResource(id));
        }
        let slot = self.slot_of(&resource, ctx)?;
        let size = payload.len() as u64;
        self.check_capacity(&resource.name, size)?;

        if resource.policy == ReplicationPolicy::Single
            && resource.copies[slot].written
            && !synchronized
        {
            return Err(ResourceError::UnsynchronizedRewrite {
                name: resource.name.clone(),
            });
        }

        let current = &resource.copies[slot];
        if size > current.capacity {
            let capacity = next_capacity_class(current.capacity, size, self.max_capacity);
            let fresh = PhysicalCopy::new(capacity, self.next_generation());
            log::debug!(
                "Reallocating copy {} of '{}': {} -> {} bytes (generation {} -> {})",
                slot,
                resource.name,
                current.capacity,
                capacity,
                current.generation,
                fresh.generation
            );
            let old = std::mem::replace(&mut resource.copies[slot], fresh);
            let handle = PhysicalCopyHandle {
                resource: id,
                slot: slot as u32,
                generation: old.generation,
            };
            self.retire(handle, old, ctx.frame_index);
        }

        let copy = &mut resource.copies[slot];
        copy.data.clear();
        copy.data.extend_from_slice(payload);
        copy.written = true;
        Ok(())
    }

    /// Handle of the copy `ctx` reads and writes. Never allocates.
    pub fn resolve(
        &self,
        id: LogicalResourceId,
        ctx: &FrameContext,
    ) -> Result<PhysicalCopyHandle, ResourceError> {
        let entry = self.entry(id)?;
        let resource = entry.read();
        if resource.destroyed {
            return Err(ResourceError::UnknownResource(id));
        }
        let slot = self.slot_of(&resource, ctx)?;
        Ok(PhysicalCopyHandle {
            resource: id,
            slot: slot as u32,
            generation: resource.copies[slot].generation,
        })
    }

    /// Run `f` on the content of the copy `handle` names.
    ///
    /// Works for current copies and for superseded copies that have not been
    /// collected yet.
    pub fn with_copy<R>(
        &self,
        handle: PhysicalCopyHandle,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, ResourceError> {
        let entry = self.entry(handle.resource)?;
        let resource = entry.read();
        if let Some(copy) = resource.copies.get(handle.slot as usize)
            && copy.generation == handle.generation
        {
            return Ok(f(&copy.data));
        }

        let retired = self.retired.lock();
        match retired.iter().find(|r| r.handle == handle) {
            Some(r) => Ok(f(&r.copy.data)),
            None => Err(ResourceError::StaleHandle {
                name: resource.name.clone(),
                slot: handle.slot,
                generation: handle.generation,
            }),
        }
    }

    /// Content of the copy `handle` names.
    pub fn read(&self, handle: PhysicalCopyHandle) -> Result<Vec<u8>, ResourceError> {
        self.with_copy(handle, |data| data.to_vec())
    }

    /// Capacity in bytes of the copy `ctx` selects.
    pub fn capacity(&self, id: LogicalResourceId, ctx: &FrameContext) -> Result<u64, ResourceError> {
        let entry = self.entry(id)?;
        let resource = entry.read();
        if resource.destroyed {
            return Err(ResourceError::UnknownResource(id));
        }
        let slot = self.slot_of(&resource, ctx)?;
        Ok(resource.copies[slot].capacity)
    }

    /// Grow every copy of a resource to at least `capacity` bytes.
    ///
    /// Copies that are already large enough are left alone. Grown copies keep
    /// their content; the superseded ones retire like reallocated copies.
    pub fn reserve(
        &self,
        id: LogicalResourceId,
        capacity: u64,
        frame_index: u64,
    ) -> Result<(), ResourceError> {
        let entry = self.entry(id)?;
        let mut resource = entry.write();
        if resource.destroyed {
            return Err(ResourceError::UnknownResource(id));
        }
        self.check_capacity(&resource.name, capacity)?;

        for slot in 0..resource.copies.len() {
            if resource.copies[slot].capacity >= capacity {
                continue;
            }
            let mut fresh = PhysicalCopy::new(capacity, self.next_generation());
            fresh.data = resource.copies[slot].data.clone();
            fresh.written = resource.copies[slot].written;
            let old = std::mem::replace(&mut resource.copies[slot], fresh);
            let handle = PhysicalCopyHandle {
                resource: id,
                slot: slot as u32,
                generation: old.generation,
            };
            self.retire(handle, old, frame_index);
        }
        log::debug!("Reserved {} bytes for '{}'", capacity, resource.name);
        Ok(())
    }

    /// Replace the image description of an image resource and grow its copies
    /// to the new byte size.
    pub fn resize_image(
        &self,
        id: LogicalResourceId,
        image: ImageDescriptor,
        frame_index: u64,
    ) -> Result<(), ResourceError> {
        let capacity = image.byte_size();
        {
            let entry = self.entry(id)?;
            let mut resource = entry.write();
            if resource.destroyed {
                return Err(ResourceError::UnknownResource(id));
            }
            self.check_capacity(&resource.name, capacity)?;
            resource.descriptor.image = Some(image);
        }
        self.reserve(id, capacity, frame_index)
    }

    /// Destroy a resource. Its copies retire and its name becomes free again.
    pub fn destroy(&self, id: LogicalResourceId, frame_index: u64) -> Result<(), ResourceError> {
        let entry = self.entry(id)?;
        let mut resource = entry.write();
        if resource.destroyed {
            return Err(ResourceError::UnknownResource(id));
        }
        resource.destroyed = true;
        self.names.write().remove(&resource.name);
        for (slot, copy) in std::mem::take(&mut resource.copies).into_iter().enumerate() {
            let handle = PhysicalCopyHandle {
                resource: id,
                slot: slot as u32,
                generation: copy.generation,
            };
            self.retire(handle, copy, frame_index);
        }
        log::debug!("Destroyed resource '{}' {}", resource.name, id);
        Ok(())
    }

    /// Free retired copies whose retirement frame is at or before `current_frame`.
    ///
    /// Returns the number of copies freed.
    pub fn collect_retired(&self, current_frame: u64) -> usize {
        let mut retired = self.retired.lock();
        let before = retired.len();
        retired.retain(|r| r.retire_at > current_frame);
        let freed = before - retired.len();
        if freed > 0 {
            log::trace!("Freed {} retired copies at frame {}", freed, current_frame);
        }
        freed
    }

    /// Number of retired copies not yet freed.
    pub fn retired_count(&self) -> usize {
        self.retired.lock().len()
    }

    /// Id of the live resource with the given name.
    pub fn lookup(&self, name: &str) -> Option<LogicalResourceId> {
        self.names.read().get(name).copied()
    }

    /// Name of a resource.
    pub fn name(&self, id: LogicalResourceId) -> Result<String, ResourceError> {
        Ok(self.entry(id)?.read().name.clone())
    }

    /// Descriptor of a resource.
    pub fn descriptor(&self, id: LogicalResourceId) -> Result<ResourceDescriptor, ResourceError> {
        Ok(self.entry(id)?.read().descriptor.clone())
    }

    /// Replication policy of a resource.
    pub fn policy(&self, id: LogicalResourceId) -> Result<ReplicationPolicy, ResourceError> {
        Ok(self.entry(id)?.read().policy)
    }

    /// Number of physical copies a resource currently owns.
    pub fn copy_count(&self, id: LogicalResourceId) -> Result<usize, ResourceError> {
        Ok(self.entry(id)?.read().copies.len())
    }

    /// Number of live resources.
    pub fn resource_count(&self) -> usize {
        self.names.read().len()
    }
}
