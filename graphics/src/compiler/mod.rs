//! Workflow graph compilation.
//!
//! Compilation turns a [`WorkflowGraph`] into a [`CompiledSchedule`] in two
//! steps:
//!
//! 1. [`validate`] checks references, formats, acyclicity, surface output and
//!    queue compatibility, and derives operation dependencies from shared
//!    resource names.
//! 2. [`schedule`] orders operations topologically (ties broken by
//!    declaration order), assigns queues by weighted round-robin, places
//!    barriers and records resource lifetimes.
//!
//! Both steps are pure functions of the graph and queue list, so compiling
//! the same graph twice yields identical schedules.
//!
//! # Example
//!
//! ```ignore
//! let queues = [QueueTraits::graphics(0.75)];
//! let schedule = compiler::compile(&graph, &queues)?;
//! for op in schedule.operations() {
//!     println!("{} on queue {} with {} barriers", op.name, op.queue, op.barriers.len());
//! }
//! ```

mod barriers;
mod queues;
mod validate;

pub use barriers::{Barrier, Hazard};
pub use validate::{ValidatedGraph, validate};

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::error::GraphValidationError;
use crate::graph::{
    AttachmentType, OperationHandle, OperationKind, QueueTraits, WorkflowGraph,
};
use crate::types::ImageLayout;

use barriers::{Access, BarrierTracker};
use queues::QueueBalancer;

/// One operation of a compiled schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledOperation {
    /// Handle in the source graph.
    pub operation: OperationHandle,
    /// Operation name.
    pub name: String,
    /// Kind of work.
    pub kind: OperationKind,
    /// Index of the assigned queue.
    pub queue: usize,
    /// Pipeline recorded for the operation.
    pub pipeline: Option<String>,
    /// Barriers to record before the operation.
    pub barriers: Vec<Barrier>,
}

/// Span of schedule positions during which a resource is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLifetime {
    /// Resource name.
    pub resource: String,
    /// Resource type name.
    pub resource_type: String,
    /// Position of the first operation using the resource.
    pub first: usize,
    /// Position of the last operation using the resource.
    pub last: usize,
    /// Content survives between frames.
    pub persistent: bool,
}

impl ResourceLifetime {
    /// Returns true if both lifetimes overlap in the schedule.
    pub fn overlaps(&self, other: &ResourceLifetime) -> bool {
        self.first <= other.last && other.first <= self.last
    }
}

/// Immutable execution plan for one workflow graph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledSchedule {
    operations: Vec<ScheduledOperation>,
    final_barriers: Vec<Barrier>,
    lifetimes: Vec<ResourceLifetime>,
    queue_count: usize,
}

impl CompiledSchedule {
    /// Operations in execution order.
    pub fn operations(&self) -> &[ScheduledOperation] {
        &self.operations
    }

    /// Barriers recorded after the last operation (presentation transitions).
    pub fn final_barriers(&self) -> &[Barrier] {
        &self.final_barriers
    }

    /// Resource lifetimes ordered by first use, then name.
    pub fn lifetimes(&self) -> &[ResourceLifetime] {
        &self.lifetimes
    }

    /// Lifetime of the resource called `resource`.
    pub fn lifetime(&self, resource: &str) -> Option<&ResourceLifetime> {
        self.lifetimes.iter().find(|l| l.resource == resource)
    }

    /// Operation names in execution order.
    pub fn operation_names(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.name.as_str()).collect()
    }

    /// Assigned queue of each operation, in execution order.
    pub fn queue_assignments(&self) -> Vec<usize> {
        self.operations.iter().map(|op| op.queue).collect()
    }

    /// Number of queues the schedule was compiled against.
    pub fn queue_count(&self) -> usize {
        self.queue_count
    }

    /// Total number of barriers, including final ones.
    pub fn barrier_count(&self) -> usize {
        self.operations.iter().map(|op| op.barriers.len()).sum::<usize>()
            + self.final_barriers.len()
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true if the schedule has no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Validate and schedule a graph in one step.
pub fn compile(
    graph: &WorkflowGraph,
    queues: &[QueueTraits],
) -> Result<CompiledSchedule, GraphValidationError> {
    let validated = validate(graph, queues)?;
    schedule(&validated)
}

/// Build the schedule of a validated graph.
///
/// Fails only if a queue cannot be found for an operation, which validation
/// already rules out.
pub fn schedule(validated: &ValidatedGraph<'_>) -> Result<CompiledSchedule, GraphValidationError> {
    let graph = validated.graph;
    let bindings = graph.bindings();

    let accesses: Vec<Vec<(usize, Access)>> = validated
        .order
        .iter()
        .map(|&handle| merged_accesses(validated, handle))
        .collect();

    // Layout each persistent resource ends the frame in; the next frame starts
    // from it.
    let mut last_layouts: HashMap<&str, ImageLayout> = HashMap::new();
    for &(index, access) in accesses.iter().flatten() {
        last_layouts.insert(bindings[index].resource.as_str(), access.layout);
    }

    let mut balancer = QueueBalancer::new(validated.queues);
    let mut tracker = BarrierTracker::new();
    let mut lifetimes: Vec<ResourceLifetime> = Vec::new();
    let mut lifetime_index: HashMap<&str, usize> = HashMap::new();
    let mut operations = Vec::with_capacity(validated.order.len());

    for (position, (&handle, accesses)) in validated.order.iter().zip(&accesses).enumerate() {
        let operation = &graph.operations()[handle.index()];
        let queue = balancer
            .pick(operation.kind)
            .ok_or_else(|| GraphValidationError::NoCompatibleQueue {
                operation: operation.name.clone(),
                kind: operation.kind,
            })?;

        let mut barriers = Vec::new();
        for &(index, access) in accesses {
            let binding = &bindings[index];
            let resource_type = validated.binding_type(index);
            let initial_layout = if resource_type.persistent
                && resource_type.attachment_type != AttachmentType::Surface
            {
                last_layouts
                    .get(binding.resource.as_str())
                    .copied()
                    .unwrap_or_default()
            } else {
                ImageLayout::Undefined
            };
            if let Some(barrier) = tracker.access(&binding.resource, access, queue, initial_layout) {
                barriers.push(barrier);
            }

            match lifetime_index.get(binding.resource.as_str()) {
                Some(&i) => lifetimes[i].last = position,
                None => {
                    lifetime_index.insert(binding.resource.as_str(), lifetimes.len());
                    lifetimes.push(ResourceLifetime {
                        resource: binding.resource.clone(),
                        resource_type: resource_type.name.clone(),
                        first: position,
                        last: position,
                        persistent: resource_type.persistent,
                    });
                }
            }
        }

        log::debug!(
            "Scheduled '{}' at {} on queue {} with {} barriers",
            operation.name,
            position,
            queue,
            barriers.len()
        );
        operations.push(ScheduledOperation {
            operation: handle,
            name: operation.name.clone(),
            kind: operation.kind,
            queue,
            pipeline: operation.pipeline.clone(),
            barriers,
        });
    }

    let mut final_barriers = Vec::new();
    for lifetime in &lifetimes {
        let Some(resource_type) = graph
            .find_resource_type(&lifetime.resource_type)
            .and_then(|handle| graph.resource_type(handle))
        else {
            continue;
        };
        if resource_type.attachment_type == AttachmentType::Surface
            && let Some(barrier) = tracker.release(&lifetime.resource, ImageLayout::PresentSrc)
        {
            final_barriers.push(barrier);
        }
    }

    lifetimes.sort_by(|a, b| a.first.cmp(&b.first).then_with(|| a.resource.cmp(&b.resource)));

    Ok(CompiledSchedule {
        operations,
        final_barriers,
        lifetimes,
        queue_count: validated.queues.len(),
    })
}

/// Bindings of one operation merged per resource, in first-binding order.
///
/// Output layouts win over input layouts.
fn merged_accesses(validated: &ValidatedGraph<'_>, handle: OperationHandle) -> Vec<(usize, Access)> {
    let bindings = validated.graph.bindings();
    let mut accesses: Vec<(usize, Access)> = Vec::new();
    for (index, binding) in bindings.iter().enumerate() {
        if validated.binding_operations[index] != handle {
            continue;
        }
        let access = Access {
            layout: binding.effective_layout(),
            reads: binding.reads(),
            writes: binding.writes(),
            is_buffer: !validated.binding_type(index).attachment_type.is_image(),
        };
        match accesses
            .iter_mut()
            .find(|(first, _)| bindings[*first].resource == binding.resource)
        {
            Some((_, merged)) => {
                if access.writes {
                    merged.layout = access.layout;
                }
                merged.reads |= access.reads;
                merged.writes |= access.writes;
            }
            None => accesses.push((index, access)),
        }
    }
    accesses
}

/// Kahn's algorithm over `count` operations.
///
/// Ready operations are taken lowest declaration index first, so the order is
/// deterministic. On a cycle, returns the operations that could not be
/// ordered, in declaration order.
pub(crate) fn topological_order(
    count: usize,
    edges: &[(OperationHandle, OperationHandle)],
) -> Result<Vec<OperationHandle>, Vec<OperationHandle>> {
    let mut in_degree = vec![0u32; count];
    let mut dependents: Vec<Vec<OperationHandle>> = vec![Vec::new(); count];
    for &(dependent, dependency) in edges {
        in_degree[dependent.index()] += 1;
        dependents[dependency.index()].push(dependent);
    }

    let mut ready: BinaryHeap<Reverse<OperationHandle>> = (0..count as u32)
        .map(OperationHandle::new)
        .filter(|h| in_degree[h.index()] == 0)
        .map(Reverse)
        .collect();

    let mut order = Vec::with_capacity(count);
    while let Some(Reverse(handle)) = ready.pop() {
        order.push(handle);
        for &dependent in &dependents[handle.index()] {
            in_degree[dependent.index()] -= 1;
            if in_degree[dependent.index()] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    if order.len() != count {
        return Err((0..count as u32)
            .map(OperationHandle::new)
            .filter(|h| in_degree[h.index()] > 0)
            .collect());
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{
        AttachmentBinding, AttachmentSize, LoadOp, RenderOperation, ResourceType,
    };
    use crate::types::TextureFormat;

    fn h(index: u32) -> OperationHandle {
        OperationHandle::new(index)
    }

    #[test]
    fn test_topological_linear_chain() {
        let edges = [(h(1), h(0)), (h(2), h(1))];
        assert_eq!(topological_order(3, &edges).unwrap(), vec![h(0), h(1), h(2)]);
    }

    #[test]
    fn test_topological_ties_by_declaration() {
        // 3 depends on 0; 1 and 2 are free. Ready set is drained lowest first.
        let edges = [(h(3), h(0))];
        assert_eq!(
            topological_order(4, &edges).unwrap(),
            vec![h(0), h(1), h(2), h(3)]
        );

        // 0 depends on 2: 1 and 2 are ready first.
        let edges = [(h(0), h(2))];
        assert_eq!(topological_order(3, &edges).unwrap(), vec![h(1), h(2), h(0)]);
    }

    #[test]
    fn test_topological_diamond() {
        //     0
        //    / \
        //   1   2
        //    \ /
        //     3
        let edges = [(h(1), h(0)), (h(2), h(0)), (h(3), h(1)), (h(3), h(2))];
        assert_eq!(
            topological_order(4, &edges).unwrap(),
            vec![h(0), h(1), h(2), h(3)]
        );
    }

    #[test]
    fn test_topological_cycle_reports_members() {
        // 0 is free, 1 <-> 2 cycle, 3 depends on the cycle.
        let edges = [(h(1), h(2)), (h(2), h(1)), (h(3), h(2))];
        assert_eq!(topological_order(4, &edges).unwrap_err(), vec![h(1), h(2), h(3)]);
    }

    fn deferred_graph() -> WorkflowGraph {
        let mut graph = WorkflowGraph::new();
        graph.add_resource_type(ResourceType::new(
            "depth",
            AttachmentType::Depth,
            TextureFormat::Depth32Float,
            AttachmentSize::surface(),
        ));
        graph.add_resource_type(ResourceType::new(
            "gbuffer",
            AttachmentType::Color,
            TextureFormat::Rgba16Float,
            AttachmentSize::surface(),
        ));
        graph.add_resource_type(ResourceType::surface("surface", TextureFormat::Bgra8Unorm));

        graph.add_render_operation(RenderOperation::graphics("lighting").with_pipeline("light"));
        graph.add_render_operation(RenderOperation::graphics("geometry").with_pipeline("gbuf"));

        graph.add_attachment_input(AttachmentBinding::image("lighting", "gbuffer", "albedo"));
        graph.add_attachment_input(AttachmentBinding::depth("lighting", "depth", "depth"));
        graph.add_attachment_output(
            AttachmentBinding::color("lighting", "surface", "final")
                .with_load_op(LoadOp::clear_color(0.0, 0.0, 0.0, 1.0)),
        );
        graph.add_attachment_output(
            AttachmentBinding::depth("geometry", "depth", "depth")
                .with_load_op(LoadOp::clear_depth(1.0)),
        );
        graph.add_attachment_output(
            AttachmentBinding::color("geometry", "gbuffer", "albedo")
                .with_load_op(LoadOp::DontCare),
        );
        graph
    }

    #[test]
    fn test_schedule_orders_producers_first() {
        let graph = deferred_graph();
        let schedule = compile(&graph, &[QueueTraits::default()]).unwrap();
        assert_eq!(schedule.operation_names(), vec!["geometry", "lighting"]);
        assert_eq!(schedule.operations()[0].pipeline.as_deref(), Some("gbuf"));
    }

    #[test]
    fn test_schedule_barriers() {
        let graph = deferred_graph();
        let schedule = compile(&graph, &[QueueTraits::default()]).unwrap();

        let geometry = &schedule.operations()[0];
        assert_eq!(geometry.barriers.len(), 2);
        assert!(geometry.barriers.iter().all(|b| b.old_layout == ImageLayout::Undefined));

        let lighting = &schedule.operations()[1];
        let albedo = lighting.barriers.iter().find(|b| b.resource == "albedo").unwrap();
        assert_eq!(albedo.hazard, Hazard::ReadAfterWrite);
        assert_eq!(albedo.old_layout, ImageLayout::ColorAttachment);
        assert_eq!(albedo.new_layout, ImageLayout::ShaderReadOnly);

        let depth = lighting.barriers.iter().find(|b| b.resource == "depth").unwrap();
        assert_eq!(depth.new_layout, ImageLayout::DepthStencilReadOnly);

        let surface = lighting.barriers.iter().find(|b| b.resource == "final").unwrap();
        assert_eq!(surface.hazard, Hazard::Layout);

        assert_eq!(schedule.final_barriers().len(), 1);
        assert_eq!(schedule.final_barriers()[0].new_layout, ImageLayout::PresentSrc);
    }

    #[test]
    fn test_schedule_lifetimes() {
        let graph = deferred_graph();
        let schedule = compile(&graph, &[QueueTraits::default()]).unwrap();
        let albedo = schedule.lifetime("albedo").unwrap();
        assert_eq!((albedo.first, albedo.last), (0, 1));
        let surface = schedule.lifetime("final").unwrap();
        assert_eq!((surface.first, surface.last), (1, 1));
        assert!(surface.persistent);
        assert!(albedo.overlaps(surface));
    }

    #[test]
    fn test_schedule_queue_transfer() {
        let graph = deferred_graph();
        let queues = [QueueTraits::graphics(1.0), QueueTraits::graphics(1.0)];
        let schedule = compile(&graph, &queues).unwrap();
        assert_eq!(schedule.queue_assignments(), vec![0, 1]);
        let lighting = &schedule.operations()[1];
        assert!(lighting.barriers.iter().any(|b| b.resource == "albedo" && b.is_queue_transfer()));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let graph = deferred_graph();
        let queues = [QueueTraits::graphics(0.75), QueueTraits::graphics(0.25)];
        let first = compile(&graph, &queues).unwrap();
        let second = compile(&graph, &queues).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_persistent_resource_starts_in_last_layout() {
        let history = |persistent| {
            ResourceType::new(
                "history",
                AttachmentType::Color,
                TextureFormat::Rgba16Float,
                AttachmentSize::surface(),
            )
            .with_persistent(persistent)
        };
        let graph_with = |persistent| {
            let mut graph = WorkflowGraph::new();
            graph.add_resource_type(history(persistent));
            graph.add_resource_type(ResourceType::surface("surface", TextureFormat::Bgra8Unorm));
            graph.add_render_operation(RenderOperation::graphics("accumulate"));
            graph.add_attachment_output(
                AttachmentBinding::color("accumulate", "history", "taa").with_load_op(LoadOp::Load),
            );
            graph.add_attachment_output(AttachmentBinding::color("accumulate", "surface", "final"));
            graph
        };

        // Content kept from the previous frame is already a color attachment.
        let schedule = compile(&graph_with(true), &[QueueTraits::default()]).unwrap();
        let barriers = &schedule.operations()[0].barriers;
        assert!(barriers.iter().all(|b| b.resource != "taa"));

        let schedule = compile(&graph_with(false), &[QueueTraits::default()]).unwrap();
        let barriers = &schedule.operations()[0].barriers;
        let taa = barriers.iter().find(|b| b.resource == "taa").unwrap();
        assert_eq!(taa.old_layout, ImageLayout::Undefined);
    }
}
