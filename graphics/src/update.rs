//! Parallel CPU update tasks.
//!
//! An [`UpdateGraph`] holds the short tasks that refresh CPU-side data each
//! frame (camera, lights, instance buffers). Each task declares the logical
//! resources it writes. Two tasks are ordered when they write a common
//! resource (declaration order wins) or when an explicit dependency joins
//! them. Everything else runs concurrently on scoped threads.
//!
//! ```ignore
//! let mut update = UpdateGraph::new();
//! update.add_task("camera", &[camera], |ctx| ctx.write_pod(camera, &[view_proj]));
//! update.add_task("instances", &[instances], |ctx| ctx.write_pod(instances, &data));
//! renderer.run_update(&update, &frame)?;
//! ```

use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc;

use crate::error::{GraphicsError, GraphicsResult, UpdateError};
use crate::frame::FrameContext;
use crate::resources::{ExternalSync, LogicalResourceId, PhysicalCopyHandle, ResourceManager};

type TaskFn<'env> = Box<dyn Fn(&TaskContext<'_>) -> GraphicsResult<()> + Send + Sync + 'env>;

/// Handle to a task in an [`UpdateGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u32);

impl TaskHandle {
    /// Position of the task in declaration order.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

struct UpdateTask<'env> {
    name: String,
    writes: Vec<LogicalResourceId>,
    run: TaskFn<'env>,
}

/// What a task sees while it runs.
pub struct TaskContext<'a> {
    task: &'a str,
    frame: FrameContext,
    manager: &'a ResourceManager,
    writes: &'a [LogicalResourceId],
}

impl<'a> TaskContext<'a> {
    /// Name of the running task.
    pub fn task(&self) -> &str {
        self.task
    }

    /// Frame being prepared.
    pub fn frame(&self) -> &FrameContext {
        &self.frame
    }

    /// Resource manager, for lookups and reads.
    pub fn manager(&self) -> &ResourceManager {
        self.manager
    }

    /// Resolve the copy this frame uses.
    pub fn resolve(&self, id: LogicalResourceId) -> GraphicsResult<PhysicalCopyHandle> {
        Ok(self.manager.resolve(id, &self.frame)?)
    }

    /// Write a declared resource for this frame.
    ///
    /// # Errors
    ///
    /// [`UpdateError::UndeclaredWrite`] if the task did not declare `id`.
    pub fn write(&self, id: LogicalResourceId, payload: &[u8]) -> GraphicsResult<()> {
        self.check_declared(id)?;
        Ok(self.manager.write(id, &self.frame, payload)?)
    }

    /// Write a slice of GPU records.
    pub fn write_pod<T: bytemuck::Pod>(&self, id: LogicalResourceId, data: &[T]) -> GraphicsResult<()> {
        self.write(id, bytemuck::cast_slice(data))
    }

    /// Rewrite a declared single-policy resource.
    pub fn write_synchronized(
        &self,
        id: LogicalResourceId,
        payload: &[u8],
        sync: ExternalSync,
    ) -> GraphicsResult<()> {
        self.check_declared(id)?;
        Ok(self.manager.write_synchronized(id, &self.frame, payload, sync)?)
    }

    fn check_declared(&self, id: LogicalResourceId) -> GraphicsResult<()> {
        if self.writes.contains(&id) {
            return Ok(());
        }
        let resource = self
            .manager
            .name(id)
            .unwrap_or_else(|_| id.to_string());
        Err(UpdateError::UndeclaredWrite {
            task: self.task.to_string(),
            resource,
        }
        .into())
    }
}

/// Task graph of the CPU update timeline.
#[derive(Default)]
pub struct UpdateGraph<'env> {
    tasks: Vec<UpdateTask<'env>>,
    explicit: Vec<(TaskHandle, TaskHandle)>,
}

impl<'env> UpdateGraph<'env> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            explicit: Vec::new(),
        }
    }

    /// Add a task writing `writes`.
    pub fn add_task<F>(&mut self, name: impl Into<String>, writes: &[LogicalResourceId], run: F) -> TaskHandle
    where
        F: Fn(&TaskContext<'_>) -> GraphicsResult<()> + Send + Sync + 'env,
    {
        let handle = TaskHandle(self.tasks.len() as u32);
        self.tasks.push(UpdateTask {
            name: name.into(),
            writes: writes.to_vec(),
            run: Box::new(run),
        });
        handle
    }

    /// Run `task` only after `dependency` finished.
    pub fn add_dependency(&mut self, task: TaskHandle, dependency: TaskHandle) {
        self.explicit.push((task, dependency));
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if the graph has no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Task names in declaration order.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.name.as_str())
    }

    /// Dependency edges `(task, dependency)`, implicit ones first.
    ///
    /// Edges naming unknown tasks are dropped.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        let mut edges = Vec::new();
        let mut seen = HashSet::new();
        for (later, task) in self.tasks.iter().enumerate() {
            for (earlier, other) in self.tasks[..later].iter().enumerate() {
                if task.writes.iter().any(|w| other.writes.contains(w)) && seen.insert((later, earlier)) {
                    edges.push((later, earlier));
                }
            }
        }
        for &(task, dependency) in &self.explicit {
            let (t, d) = (task.index(), dependency.index());
            if t < self.tasks.len() && d < self.tasks.len() && seen.insert((t, d)) {
                edges.push((t, d));
            }
        }
        edges
    }

    /// Tasks grouped into waves that may run concurrently, each wave in
    /// declaration order.
    ///
    /// # Errors
    ///
    /// [`UpdateError::Cycle`] if explicit dependencies form a cycle.
    pub fn waves(&self) -> Result<Vec<Vec<TaskHandle>>, UpdateError> {
        let (mut in_degree, dependents) = self.adjacency();
        let mut waves = Vec::new();
        let mut ready: Vec<usize> = (0..self.tasks.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut placed = 0;
        while !ready.is_empty() {
            let mut next = Vec::new();
            for &i in &ready {
                for &dependent in &dependents[i] {
                    in_degree[dependent] -= 1;
                    if in_degree[dependent] == 0 {
                        next.push(dependent);
                    }
                }
            }
            placed += ready.len();
            waves.push(ready.iter().map(|&i| TaskHandle(i as u32)).collect());
            next.sort_unstable();
            ready = next;
        }
        if placed < self.tasks.len() {
            return Err(self.cycle_error(&in_degree));
        }
        Ok(waves)
    }

    /// Run every task for `frame`.
    ///
    /// A task starts as soon as its dependencies finished. After the first
    /// failure no new task starts; running ones complete, and the failure of
    /// the earliest-declared failing task is returned.
    pub fn run(&self, frame: &FrameContext, manager: &ResourceManager) -> Result<(), UpdateError> {
        let n = self.tasks.len();
        if n == 0 {
            return Ok(());
        }
        let (mut in_degree, dependents) = self.adjacency();
        let mut ready: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        if ready.is_empty() {
            return Err(self.cycle_error(&in_degree));
        }
        log::trace!("Running {} update tasks for {}", n, frame);

        let (tx, rx) = mpsc::channel::<(usize, Result<(), UpdateError>)>();
        let mut failures: Vec<(usize, UpdateError)> = Vec::new();
        let mut completed = 0;
        let mut active = 0;

        std::thread::scope(|scope| {
            loop {
                if failures.is_empty() {
                    for i in ready.drain(..) {
                        active += 1;
                        let tx = tx.clone();
                        let task = &self.tasks[i];
                        scope.spawn(move || {
                            let _ = tx.send((i, execute(task, frame, manager)));
                        });
                    }
                }
                if active == 0 {
                    break;
                }
                let Ok((i, result)) = rx.recv() else {
                    break;
                };
                active -= 1;
                completed += 1;
                match result {
                    Ok(()) => {
                        for &dependent in &dependents[i] {
                            in_degree[dependent] -= 1;
                            if in_degree[dependent] == 0 {
                                ready.push(dependent);
                            }
                        }
                        ready.sort_unstable();
                    }
                    Err(err) => failures.push((i, err)),
                }
            }
        });

        if let Some((_, err)) = failures.into_iter().min_by_key(|(i, _)| *i) {
            return Err(err);
        }
        if completed < n {
            return Err(self.cycle_error(&in_degree));
        }
        Ok(())
    }

    fn adjacency(&self) -> (Vec<usize>, Vec<Vec<usize>>) {
        let mut in_degree = vec![0; self.tasks.len()];
        let mut dependents = vec![Vec::new(); self.tasks.len()];
        for (task, dependency) in self.edges() {
            in_degree[task] += 1;
            dependents[dependency].push(task);
        }
        (in_degree, dependents)
    }

    fn cycle_error(&self, in_degree: &[usize]) -> UpdateError {
        UpdateError::Cycle {
            tasks: in_degree
                .iter()
                .enumerate()
                .filter(|&(_, &d)| d > 0)
                .map(|(i, _)| self.tasks[i].name.clone())
                .collect(),
        }
    }
}

fn execute(task: &UpdateTask<'_>, frame: &FrameContext, manager: &ResourceManager) -> Result<(), UpdateError> {
    let ctx = TaskContext {
        task: &task.name,
        frame: *frame,
        manager,
        writes: &task.writes,
    };
    match catch_unwind(AssertUnwindSafe(|| (task.run)(&ctx))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(GraphicsError::Update(err @ UpdateError::UndeclaredWrite { .. }))) => Err(err),
        Ok(Err(source)) => Err(UpdateError::TaskFailed {
            task: task.name.clone(),
            source: Box::new(source),
        }),
        Err(_) => {
            log::error!("Update task '{}' panicked", task.name);
            Err(UpdateError::TaskPanicked {
                task: task.name.clone(),
            })
        }
    }
}

static_assertions::assert_impl_all!(UpdateGraph<'static>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{ReplicationCounts, ReplicationPolicy, ResourceDescriptor, ResourceKind};
    use crate::error::ResourceError;
    use parking_lot::Mutex;

    fn manager() -> ResourceManager {
        ResourceManager::new(ReplicationCounts::with_images(3), 1024)
    }

    fn uniform(m: &ResourceManager, name: &str) -> LogicalResourceId {
        m.declare(name, ResourceDescriptor::uniform(16), ReplicationPolicy::PerImage)
            .unwrap()
    }

    #[test]
    fn test_independent_tasks_share_a_wave() {
        let m = manager();
        let (a, b) = (uniform(&m, "a"), uniform(&m, "b"));
        let mut graph = UpdateGraph::new();
        graph.add_task("a", &[a], |_| Ok(()));
        graph.add_task("b", &[b], |_| Ok(()));
        graph.add_task("a2", &[a], |_| Ok(()));

        let waves = graph.waves().unwrap();
        assert_eq!(waves.len(), 2);
        assert_eq!(waves[0], vec![TaskHandle(0), TaskHandle(1)]);
        assert_eq!(waves[1], vec![TaskHandle(2)]);
    }

    #[test]
    fn test_shared_writes_run_in_declaration_order() {
        let m = manager();
        let shared = uniform(&m, "shared");
        let log = Mutex::new(Vec::new());
        let mut graph = UpdateGraph::new();
        for i in 0..4 {
            let log = &log;
            graph.add_task(format!("t{i}"), &[shared], move |ctx| {
                log.lock().push(i);
                ctx.write(shared, &[i as u8])
            });
        }
        graph.run(&FrameContext::new(0, 0), &m).unwrap();

        assert_eq!(*log.lock(), vec![0, 1, 2, 3]);
        let handle = m.resolve(shared, &FrameContext::new(0, 0)).unwrap();
        assert_eq!(m.read(handle).unwrap(), vec![3]);
    }

    #[test]
    fn test_explicit_dependency() {
        let m = manager();
        let (a, b) = (uniform(&m, "a"), uniform(&m, "b"));
        let log = Mutex::new(Vec::new());
        let mut graph = UpdateGraph::new();
        let first = graph.add_task("first", &[b], |_| {
            log.lock().push("first");
            Ok(())
        });
        let second = graph.add_task("second", &[a], |_| {
            log.lock().push("second");
            Ok(())
        });
        graph.add_dependency(first, second);
        graph.run(&FrameContext::new(0, 0), &m).unwrap();
        assert_eq!(*log.lock(), vec!["second", "first"]);
    }

    #[test]
    fn test_cycle_rejected() {
        let m = manager();
        let mut graph = UpdateGraph::new();
        let a = graph.add_task("a", &[], |_| Ok(()));
        let b = graph.add_task("b", &[], |_| Ok(()));
        graph.add_task("free", &[], |_| Ok(()));
        graph.add_dependency(a, b);
        graph.add_dependency(b, a);

        let expected = UpdateError::Cycle {
            tasks: vec!["a".into(), "b".into()],
        };
        assert_eq!(graph.waves().unwrap_err(), expected);
        assert_eq!(graph.run(&FrameContext::new(0, 0), &m).unwrap_err(), expected);
    }

    #[test]
    fn test_undeclared_write_rejected() {
        let m = manager();
        let (a, b) = (uniform(&m, "a"), uniform(&m, "b"));
        let mut graph = UpdateGraph::new();
        graph.add_task("sneaky", &[a], move |ctx| ctx.write(b, b"x"));

        assert_eq!(
            graph.run(&FrameContext::new(0, 0), &m).unwrap_err(),
            UpdateError::UndeclaredWrite {
                task: "sneaky".into(),
                resource: "b".into(),
            }
        );
        let handle = m.resolve(b, &FrameContext::new(0, 0)).unwrap();
        assert!(m.read(handle).unwrap().is_empty());
    }

    #[test]
    fn test_failure_stops_dependents() {
        let m = manager();
        let a = uniform(&m, "a");
        let ran = Mutex::new(false);
        let mut graph = UpdateGraph::new();
        graph.add_task("big", &[a], move |ctx| ctx.write(a, &[0; 2048]));
        graph.add_task("after", &[a], |_| {
            *ran.lock() = true;
            Ok(())
        });

        let err = graph.run(&FrameContext::new(0, 0), &m).unwrap_err();
        let UpdateError::TaskFailed { task, source } = err else {
            panic!("expected a task failure");
        };
        assert_eq!(task, "big");
        assert!(matches!(
            *source,
            GraphicsError::Resource(ResourceError::CapacityExceeded { .. })
        ));
        assert!(!*ran.lock());
    }

    #[test]
    fn test_panic_is_reported() {
        let m = manager();
        let mut graph = UpdateGraph::new();
        graph.add_task("boom", &[], |_| panic!("task exploded"));
        assert_eq!(
            graph.run(&FrameContext::new(0, 0), &m).unwrap_err(),
            UpdateError::TaskPanicked { task: "boom".into() }
        );
    }

    #[test]
    fn test_write_pod() {
        let m = manager();
        let id = m
            .declare("v", ResourceDescriptor::buffer(ResourceKind::Storage, 16), ReplicationPolicy::PerImage)
            .unwrap();
        let mut graph = UpdateGraph::new();
        graph.add_task("v", &[id], move |ctx| ctx.write_pod(id, &[1.0f32, 2.0]));
        let frame = FrameContext::new(1, 1);
        graph.run(&frame, &m).unwrap();
        let bytes = m.read(m.resolve(id, &frame).unwrap()).unwrap();
        assert_eq!(bytemuck::cast_slice::<u8, f32>(&bytes), &[1.0, 2.0]);
    }
}
