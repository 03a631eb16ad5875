//! Render workflow lifecycle.
//!
//! A [`RenderWorkflow`] owns a [`WorkflowGraph`] and walks it through
//! `Building → Validated → Compiled → Active`:
//!
//! ```text
//!            compile() ok                         activate()
//! Building ──────────────► Validated ──► Compiled ──────────► Active
//!    ▲  │                                   │                   │
//!    │  └── compile() err: stays Building   │                   │
//!    └──────────────── rebuild() ───────────┴───────────────────┘
//! ```
//!
//! The graph can only change while `Building`. A failed compile leaves the
//! workflow in `Building` and the previously active schedule untouched, so a
//! broken edit never interrupts rendering.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::compiler::{self, CompiledSchedule};
use crate::error::{ResourceError, WorkflowError};
use crate::graph::{
    AttachmentBinding, AttachmentSize, AttachmentType, BindingHandle, OperationHandle,
    QueueTraits, RenderOperation, ResourceType, ResourceTypeHandle, WorkflowGraph,
};
use crate::resources::{
    LogicalResourceId, ReplicationPolicy, ResourceDescriptor, ResourceKind, ResourceManager,
};
use crate::types::{Extent3d, ImageDescriptor};

/// Lifecycle state of a [`RenderWorkflow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WorkflowState {
    /// The graph accepts changes.
    #[default]
    Building,
    /// The graph passed validation and is being scheduled.
    Validated,
    /// A schedule is ready to activate.
    Compiled,
    /// The schedule is bound to a surface and runs every frame.
    Active,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Presentation target a schedule is activated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceBinding {
    /// Index of the surface in frame contexts.
    pub surface_index: u32,
    /// Current surface size.
    pub extent: Extent3d,
    /// Number of swapchain images.
    pub image_count: u32,
}

/// A schedule bound to a surface, with its framebuffer resources.
#[derive(Debug, Clone)]
pub struct ActiveSchedule {
    /// The schedule executed every frame.
    pub schedule: Arc<CompiledSchedule>,
    /// Surface the schedule renders to.
    pub surface: SurfaceBinding,
    /// Backing resources by graph resource name. Surface resources are owned
    /// by the presentation engine and are not listed.
    pub resources: HashMap<String, LogicalResourceId>,
}

/// Storage a framebuffer resource needs on activation.
#[derive(Debug, Clone)]
enum Backing {
    Buffer(u64),
    Image(ImageDescriptor),
}

impl Backing {
    fn byte_size(&self) -> u64 {
        match self {
            Self::Buffer(size) => *size,
            Self::Image(image) => image.byte_size(),
        }
    }
}

#[derive(Debug, Clone)]
struct PlannedResource {
    resource: String,
    name: String,
    backing: Backing,
    existing: Option<LogicalResourceId>,
}

/// A workflow graph plus its compile and activation state.
#[derive(Debug)]
pub struct RenderWorkflow {
    name: String,
    graph: WorkflowGraph,
    queues: Vec<QueueTraits>,
    state: WorkflowState,
    compiled: Option<Arc<CompiledSchedule>>,
    active: Option<ActiveSchedule>,
}

impl RenderWorkflow {
    /// Create an empty workflow for the given queues.
    pub fn new(name: impl Into<String>, queues: Vec<QueueTraits>) -> Self {
        Self {
            name: name.into(),
            graph: WorkflowGraph::new(),
            queues,
            state: WorkflowState::Building,
            compiled: None,
            active: None,
        }
    }

    /// Workflow name. Prefixes the names of its backing resources.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// The graph being built or last compiled.
    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    /// Queues operations are assigned to.
    pub fn queues(&self) -> &[QueueTraits] {
        &self.queues
    }

    fn building(&mut self) -> Result<&mut WorkflowGraph, WorkflowError> {
        if self.state != WorkflowState::Building {
            return Err(WorkflowError::NotBuilding {
                workflow: self.name.clone(),
                state: self.state,
            });
        }
        Ok(&mut self.graph)
    }

    /// Declare a resource type.
    pub fn add_resource_type(
        &mut self,
        resource_type: ResourceType,
    ) -> Result<ResourceTypeHandle, WorkflowError> {
        Ok(self.building()?.add_resource_type(resource_type))
    }

    /// Declare a render operation.
    pub fn add_render_operation(
        &mut self,
        operation: RenderOperation,
    ) -> Result<OperationHandle, WorkflowError> {
        Ok(self.building()?.add_render_operation(operation))
    }

    /// Record the pipeline an operation uses.
    pub fn set_operation_pipeline(
        &mut self,
        operation: OperationHandle,
        pipeline: impl Into<String>,
    ) -> Result<(), WorkflowError> {
        if self.building()?.set_operation_pipeline(operation, pipeline) {
            Ok(())
        } else {
            Err(WorkflowError::UnknownOperationHandle {
                workflow: self.name.clone(),
                index: operation.index(),
            })
        }
    }

    /// Add an input binding.
    pub fn add_attachment_input(
        &mut self,
        binding: AttachmentBinding,
    ) -> Result<BindingHandle, WorkflowError> {
        Ok(self.building()?.add_attachment_input(binding))
    }

    /// Add an output binding.
    pub fn add_attachment_output(
        &mut self,
        binding: AttachmentBinding,
    ) -> Result<BindingHandle, WorkflowError> {
        Ok(self.building()?.add_attachment_output(binding))
    }

    /// Validate and compile the graph.
    ///
    /// On success the workflow is `Compiled` and holds a pending schedule.
    /// On failure it stays `Building`; the active schedule keeps running.
    pub fn compile(&mut self) -> Result<Arc<CompiledSchedule>, WorkflowError> {
        self.building()?;

        let validated = compiler::validate(&self.graph, &self.queues).inspect_err(|err| {
            log::error!("Workflow '{}' failed validation: {}", self.name, err);
        })?;
        self.state = WorkflowState::Validated;

        let schedule = match compiler::schedule(&validated) {
            Ok(schedule) => Arc::new(schedule),
            Err(err) => {
                self.state = WorkflowState::Building;
                return Err(err.into());
            }
        };
        log::info!(
            "Compiled workflow '{}': {} operations, {} barriers",
            self.name,
            schedule.len(),
            schedule.barrier_count()
        );

        self.compiled = Some(Arc::clone(&schedule));
        self.state = WorkflowState::Compiled;
        Ok(schedule)
    }

    /// Schedule waiting for activation.
    pub fn compiled_schedule(&self) -> Option<&Arc<CompiledSchedule>> {
        self.compiled.as_ref()
    }

    /// Bind the compiled schedule to a surface and make it active.
    ///
    /// Framebuffer-class resources are declared in `manager` as per-image
    /// images sized from their resource type, or resized if an earlier
    /// activation declared them. Resources the new graph no longer uses are
    /// destroyed and retire after `frame_index`.
    pub fn activate(
        &mut self,
        surface: SurfaceBinding,
        manager: &ResourceManager,
        frame_index: u64,
    ) -> Result<Arc<CompiledSchedule>, WorkflowError> {
        if self.state != WorkflowState::Compiled {
            return Err(WorkflowError::NotCompiled {
                workflow: self.name.clone(),
                state: self.state,
            });
        }
        let expected = manager.counts().images;
        if surface.image_count != expected {
            return Err(WorkflowError::ImageCountMismatch {
                surface: surface.image_count,
                expected,
            });
        }
        let schedule = self
            .compiled
            .clone()
            .ok_or_else(|| WorkflowError::NotActive(self.name.clone()))?;

        // Plan every backing resource before touching the manager, so a
        // rejected activation leaves the previous one intact.
        let mut planned = Vec::new();
        for lifetime in schedule.lifetimes() {
            let Some(resource_type) = self
                .graph
                .find_resource_type(&lifetime.resource_type)
                .and_then(|handle| self.graph.resource_type(handle))
            else {
                continue;
            };
            if resource_type.attachment_type == AttachmentType::Surface {
                continue;
            }
            planned.push(self.plan_resource(&lifetime.resource, resource_type, &surface, manager)?);
        }

        let mut resources = HashMap::with_capacity(planned.len());
        let mut declared = Vec::new();
        for plan in &planned {
            match self.commit_resource(plan, manager, frame_index) {
                Ok(id) => {
                    if plan.existing.is_none() {
                        declared.push(id);
                    }
                    resources.insert(plan.resource.clone(), id);
                }
                Err(err) => {
                    for id in declared {
                        let _ = manager.destroy(id, frame_index);
                    }
                    log::error!("Activation of workflow '{}' failed: {}", self.name, err);
                    return Err(err);
                }
            }
        }

        if let Some(previous) = &self.active {
            for (resource, &id) in &previous.resources {
                if !resources.contains_key(resource) {
                    manager.destroy(id, frame_index)?;
                }
            }
        }

        log::info!(
            "Activated workflow '{}' on surface {} ({}x{}, {} images, {} resources)",
            self.name,
            surface.surface_index,
            surface.extent.width,
            surface.extent.height,
            surface.image_count,
            resources.len()
        );
        self.active = Some(ActiveSchedule {
            schedule: Arc::clone(&schedule),
            surface,
            resources,
        });
        self.state = WorkflowState::Active;
        Ok(schedule)
    }

    fn plan_resource(
        &self,
        resource: &str,
        resource_type: &ResourceType,
        surface: &SurfaceBinding,
        manager: &ResourceManager,
    ) -> Result<PlannedResource, WorkflowError> {
        let name = format!("{}:{}", self.name, resource);
        let backing = match resource_type.size {
            AttachmentSize::Bytes(size) => Backing::Buffer(size),
            _ => {
                let extent = resource_type
                    .size
                    .image_extent(surface.extent)
                    .unwrap_or(surface.extent);
                Backing::Image(
                    ImageDescriptor::new_2d(
                        extent.width,
                        extent.height,
                        resource_type.format,
                        resource_type.usage,
                    )
                    .with_sample_count(resource_type.samples),
                )
            }
        };

        let size = backing.byte_size();
        if size > manager.max_capacity() {
            return Err(ResourceError::CapacityExceeded {
                name,
                size,
                max: manager.max_capacity(),
            }
            .into());
        }
        Ok(PlannedResource {
            resource: resource.to_string(),
            existing: manager.lookup(&name),
            name,
            backing,
        })
    }

    fn commit_resource(
        &self,
        plan: &PlannedResource,
        manager: &ResourceManager,
        frame_index: u64,
    ) -> Result<LogicalResourceId, WorkflowError> {
        let id = match (&plan.backing, plan.existing) {
            (Backing::Buffer(size), Some(id)) => {
                manager.reserve(id, *size, frame_index)?;
                id
            }
            (Backing::Buffer(size), None) => manager.declare(
                &plan.name,
                ResourceDescriptor::buffer(ResourceKind::Storage, *size),
                ReplicationPolicy::PerImage,
            )?,
            (Backing::Image(image), Some(id)) => {
                manager.resize_image(id, image.clone(), frame_index)?;
                id
            }
            (Backing::Image(image), None) => manager.declare(
                &plan.name,
                ResourceDescriptor::image(image.clone()),
                ReplicationPolicy::PerImage,
            )?,
        };
        Ok(id)
    }
    /// The schedule executed every frame.
    pub fn active_schedule(&self) -> Option<&Arc<CompiledSchedule>> {
        self.active.as_ref().map(|active| &active.schedule)
    }

    /// The active schedule with its surface and resources.
    pub fn active(&self) -> Option<&ActiveSchedule> {
        self.active.as_ref()
    }

    /// Backing resource of a graph resource in the active schedule.
    pub fn resource_id(&self, resource: &str) -> Option<LogicalResourceId> {
        self.active.as_ref()?.resources.get(resource).copied()
    }

    /// Return to `Building`, discarding the pending schedule.
    ///
    /// The active schedule keeps running until a new one is activated.
    pub fn rebuild(&mut self) {
        log::debug!("Workflow '{}' re-entered building from {}", self.name, self.state);
        self.compiled = None;
        self.state = WorkflowState::Building;
    }

    /// Mutable access to the graph while building.
    pub fn graph_mut(&mut self) -> Result<&mut WorkflowGraph, WorkflowError> {
        self.building()
    }
}
