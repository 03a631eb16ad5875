//! Graph validation and dependency derivation.

use std::collections::HashMap;

use crate::error::GraphValidationError;
use crate::graph::{
    AttachmentType, BindingRole, OperationHandle, QueueTraits, ResourceType, ResourceTypeHandle,
    WorkflowGraph,
};

use super::topological_order;

/// A graph that passed validation, with its derived dependencies.
///
/// Borrowing the graph keeps it frozen until the schedule is built.
#[derive(Debug)]
pub struct ValidatedGraph<'a> {
    pub(crate) graph: &'a WorkflowGraph,
    pub(crate) queues: &'a [QueueTraits],
    /// Resource type of each binding, indexed like `graph.bindings()`.
    pub(crate) binding_types: Vec<ResourceTypeHandle>,
    /// Operation of each binding, indexed like `graph.bindings()`.
    pub(crate) binding_operations: Vec<OperationHandle>,
    /// Dependency edges as (dependent, dependency) pairs.
    pub(crate) edges: Vec<(OperationHandle, OperationHandle)>,
    /// Topological order, ties broken by declaration order.
    pub(crate) order: Vec<OperationHandle>,
}

impl<'a> ValidatedGraph<'a> {
    /// The validated graph.
    pub fn graph(&self) -> &'a WorkflowGraph {
        self.graph
    }

    /// Derived dependency edges as (dependent, dependency) pairs.
    pub fn edges(&self) -> &[(OperationHandle, OperationHandle)] {
        &self.edges
    }

    /// Dependencies of `operation`.
    pub fn dependencies(&self, operation: OperationHandle) -> impl Iterator<Item = OperationHandle> + '_ {
        self.edges
            .iter()
            .filter(move |&&(dependent, _)| dependent == operation)
            .map(|&(_, dependency)| dependency)
    }

    /// Operations in execution order.
    pub fn order(&self) -> &[OperationHandle] {
        &self.order
    }

    pub(crate) fn binding_type(&self, binding: usize) -> &'a ResourceType {
        &self.graph.resource_types()[self.binding_types[binding].index()]
    }
}

/// Check a graph against the declared queues.
///
/// Checks run in a fixed order so the same graph always reports the same
/// error: emptiness, queue priorities, duplicate names, unknown references, role and format
/// consistency, cycles, surface output, queue compatibility.
pub fn validate<'a>(
    graph: &'a WorkflowGraph,
    queues: &'a [QueueTraits],
) -> Result<ValidatedGraph<'a>, GraphValidationError> {
    if graph.is_empty() {
        return Err(GraphValidationError::Empty);
    }
    if queues.is_empty() {
        return Err(GraphValidationError::NoQueues);
    }
    if let Some(queue) = queues.iter().position(|q| !q.has_valid_priority()) {
        return Err(GraphValidationError::InvalidQueuePriority { queue });
    }

    let mut type_names = HashMap::with_capacity(graph.resource_types().len());
    for (index, resource_type) in graph.resource_types().iter().enumerate() {
        if type_names
            .insert(resource_type.name.as_str(), ResourceTypeHandle::new(index as u32))
            .is_some()
        {
            return Err(GraphValidationError::DuplicateResourceType(
                resource_type.name.clone(),
            ));
        }
    }

    let mut operation_names = HashMap::with_capacity(graph.operations().len());
    for (index, operation) in graph.operations().iter().enumerate() {
        if operation_names
            .insert(operation.name.as_str(), OperationHandle::new(index as u32))
            .is_some()
        {
            return Err(GraphValidationError::DuplicateOperation(operation.name.clone()));
        }
    }

    let bindings = graph.bindings();
    let mut binding_types = Vec::with_capacity(bindings.len());
    let mut binding_operations = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let operation = *operation_names.get(binding.operation.as_str()).ok_or_else(|| {
            GraphValidationError::UnknownOperation {
                operation: binding.operation.clone(),
                resource: binding.resource.clone(),
            }
        })?;
        let resource_type = *type_names.get(binding.resource_type.as_str()).ok_or_else(|| {
            GraphValidationError::UnknownResourceType {
                operation: binding.operation.clone(),
                resource: binding.resource.clone(),
                resource_type: binding.resource_type.clone(),
            }
        })?;
        binding_operations.push(operation);
        binding_types.push(resource_type);
    }

    // Role compatibility, then per-resource consistency against the first
    // binding of each resource name.
    let mut first_use: HashMap<&str, usize> = HashMap::new();
    for (index, binding) in bindings.iter().enumerate() {
        let resource_type = &graph.resource_types()[binding_types[index].index()];
        if !role_allows(binding.role, resource_type.attachment_type) {
            return Err(GraphValidationError::RoleMismatch {
                operation: binding.operation.clone(),
                resource: binding.resource.clone(),
                resource_type: resource_type.name.clone(),
                role: binding.role.to_string(),
            });
        }

        let first = *first_use.entry(binding.resource.as_str()).or_insert(index);
        let first_type = &graph.resource_types()[binding_types[first].index()];
        if !consistent(first_type, resource_type) {
            return Err(GraphValidationError::InconsistentAttachment {
                resource: binding.resource.clone(),
                first_operation: bindings[first].operation.clone(),
                first_type: first_type.name.clone(),
                second_operation: binding.operation.clone(),
                second_type: resource_type.name.clone(),
            });
        }
    }

    let edges = derive_edges(graph, &binding_operations);
    let order = topological_order(graph.operations().len(), &edges).map_err(|remaining| {
        GraphValidationError::Cycle {
            operations: remaining
                .into_iter()
                .map(|handle| graph.operations()[handle.index()].name.clone())
                .collect(),
        }
    })?;

    let has_surface_output = bindings.iter().enumerate().any(|(index, binding)| {
        binding.writes()
            && graph.resource_types()[binding_types[index].index()].attachment_type
                == AttachmentType::Surface
    });
    if !has_surface_output {
        return Err(GraphValidationError::NoSurfaceOutput);
    }

    if let Some(operation) = graph
        .operations()
        .iter()
        .find(|op| !queues.iter().any(|queue| queue.supports(op.kind)))
    {
        return Err(GraphValidationError::NoCompatibleQueue {
            operation: operation.name.clone(),
            kind: operation.kind,
        });
    }

    Ok(ValidatedGraph {
        graph,
        queues,
        binding_types,
        binding_operations,
        edges,
        order,
    })
}

fn role_allows(role: BindingRole, attachment_type: AttachmentType) -> bool {
    match role {
        BindingRole::Color => matches!(attachment_type, AttachmentType::Color | AttachmentType::Surface),
        BindingRole::Depth => attachment_type.is_depth(),
        BindingRole::Image => attachment_type.is_image(),
        BindingRole::Buffer => attachment_type == AttachmentType::Buffer,
    }
}

fn consistent(a: &ResourceType, b: &ResourceType) -> bool {
    if a.attachment_type.is_image() != b.attachment_type.is_image() {
        return false;
    }
    if !a.attachment_type.is_image() {
        return true;
    }
    a.format == b.format && a.samples == b.samples
}

/// An operation reading a resource depends on every other operation writing it.
fn derive_edges(
    graph: &WorkflowGraph,
    binding_operations: &[OperationHandle],
) -> Vec<(OperationHandle, OperationHandle)> {
    let bindings = graph.bindings();
    let mut edges = Vec::new();
    for (reader_index, reader) in bindings.iter().enumerate() {
        if reader.writes() {
            continue;
        }
        let dependent = binding_operations[reader_index];
        for (writer_index, writer) in bindings.iter().enumerate() {
            let dependency = binding_operations[writer_index];
            if !writer.writes() || writer.resource != reader.resource || dependency == dependent {
                continue;
            }
            if !edges.contains(&(dependent, dependency)) {
                edges.push((dependent, dependency));
            }
        }
    }
    edges
}
