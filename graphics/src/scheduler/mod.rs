//! Per-frame submission of a compiled schedule.
//!
//! The compiler decides which queue runs each operation. [`FrameSchedule`]
//! cuts the ordered operation list into *batches* of consecutive operations
//! on the same queue, hands each batch to a [`QueueSubmitter`] and chains the
//! batches with semaphores so the GPU honors the compiled order:
//!
//! ```text
//! operations:  gbuffer(q0) shadow(q0) | lighting(q1) | post(q0) + present
//! batches:     [batch 0, q0] ──sem 0──► [batch 1, q1] ──sem 1──► [batch 2, q0]
//!                                                                   └─► frame fence
//! ```
//!
//! The fence of the last batch is the frame fence. The frame pipeline stores
//! it in the image slot of the frame and waits on it before that slot's
//! per-image copies are written again.
//!
//! | Level | Primitive | Purpose |
//! |-------|-----------|---------|
//! | Operation → Operation | Barriers | Layout transitions and hazards |
//! | Batch → Batch | Semaphores | GPU-GPU ordering within a frame |
//! | Frame → Frame | Fences | CPU-GPU ordering across frames |

mod sync;

pub use sync::{Fence, FenceStatus, Semaphore};

use crate::compiler::{Barrier, CompiledSchedule, ScheduledOperation};
use crate::frame::FrameContext;

/// GPU work handed to a queue in one submission.
#[derive(Debug, Clone)]
pub struct SubmitBatch<'a> {
    /// Debug name.
    pub name: &'a str,
    /// Index into the queue list the schedule was compiled for.
    pub queue: usize,
    /// Frame the work belongs to.
    pub frame: FrameContext,
    /// Operations in execution order, each with its barriers.
    pub operations: &'a [ScheduledOperation],
    /// Barriers recorded after the last operation (presentation transitions).
    pub final_barriers: &'a [Barrier],
    /// Semaphores the queue waits on before starting.
    pub wait: &'a [Semaphore],
    /// Semaphore signaled on completion.
    pub signal: Semaphore,
}

/// Executes batches on GPU queues.
///
/// Implemented by backends. The returned fence is signaled when the batch
/// has finished on the GPU.
pub trait QueueSubmitter: Send + Sync {
    /// Submit a batch for execution.
    fn submit(&self, batch: &SubmitBatch<'_>) -> Fence;
}

#[derive(Debug)]
struct SubmittedBatch {
    completion: Semaphore,
    fence: Fence,
}

/// Submission state of one frame.
///
/// Created by the frame renderer for every frame it submits.
#[derive(Debug)]
pub struct FrameSchedule {
    frame: FrameContext,
    submitted: Vec<SubmittedBatch>,
    semaphore_counter: u64,
    fence: Option<Fence>,
}

impl FrameSchedule {
    /// Create an empty schedule for `frame`.
    pub fn new(frame: FrameContext) -> Self {
        Self {
            frame,
            submitted: Vec::new(),
            semaphore_counter: 0,
            fence: None,
        }
    }

    /// Frame this schedule submits for.
    pub fn frame(&self) -> FrameContext {
        self.frame
    }

    /// Submit every operation of a compiled schedule.
    ///
    /// Consecutive operations on the same queue form one batch, and each
    /// batch waits for the previous one. The last batch carries the final
    /// barriers and its fence becomes the frame fence. An empty schedule
    /// finishes with a signaled fence.
    pub fn submit_schedule(&mut self, submitter: &dyn QueueSubmitter, schedule: &CompiledSchedule) {
        let operations = schedule.operations();
        let mut start = 0;
        while start < operations.len() {
            let queue = operations[start].queue;
            let end = operations[start..]
                .iter()
                .position(|op| op.queue != queue)
                .map_or(operations.len(), |len| start + len);
            let final_barriers = if end == operations.len() {
                schedule.final_barriers()
            } else {
                &[]
            };
            let name = format!("{}..{}", operations[start].name, operations[end - 1].name);
            self.submit_batch(submitter, &name, queue, &operations[start..end], final_barriers);
            start = end;
        }

        self.fence = Some(match self.submitted.last() {
            Some(last) => last.fence.clone(),
            None => Fence::new_signaled(),
        });
    }

    /// Number of submitted batches.
    pub fn submitted_count(&self) -> usize {
        self.submitted.len()
    }

    /// Returns true if nothing was submitted.
    pub fn is_empty(&self) -> bool {
        self.submitted.is_empty()
    }

    /// Take the frame fence. `None` until a schedule was submitted.
    pub fn take_fence(&mut self) -> Option<Fence> {
        self.fence.take()
    }

    /// Submit one batch, waiting on the completion of the previous batch.
    fn submit_batch(
        &mut self,
        submitter: &dyn QueueSubmitter,
        name: &str,
        queue: usize,
        operations: &[ScheduledOperation],
        final_barriers: &[Barrier],
    ) {
        let completion = Semaphore::new(self.next_semaphore_id());
        let wait: Vec<Semaphore> = self.submitted.last().map(|s| s.completion).into_iter().collect();

        let fence = submitter.submit(&SubmitBatch {
            name,
            queue,
            frame: self.frame,
            operations,
            final_barriers,
            wait: &wait,
            signal: completion,
        });

        log::trace!(
            "Submitted batch '{}' to queue {}: {} operations, wait={:?}, signal={}",
            name,
            queue,
            operations.len(),
            wait.iter().map(Semaphore::id).collect::<Vec<_>>(),
            completion.id()
        );

        self.submitted.push(SubmittedBatch { completion, fence });
    }

    fn next_semaphore_id(&mut self) -> u64 {
        let id = self.semaphore_counter;
        self.semaphore_counter += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::graph::{
        AttachmentBinding, AttachmentSize, AttachmentType, QueueTraits, RenderOperation,
        ResourceType, WorkflowGraph,
    };
    use crate::types::TextureFormat;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        batches: Mutex<Vec<(usize, Vec<String>, Vec<u64>, u64, usize)>>,
    }

    impl QueueSubmitter for Recorder {
        fn submit(&self, batch: &SubmitBatch<'_>) -> Fence {
            self.batches.lock().push((
                batch.queue,
                batch.operations.iter().map(|op| op.name.clone()).collect(),
                batch.wait.iter().map(Semaphore::id).collect(),
                batch.signal.id(),
                batch.final_barriers.len(),
            ));
            Fence::new_signaled()
        }
    }

    fn chain_graph(count: usize) -> WorkflowGraph {
        let mut graph = WorkflowGraph::new();
        graph.add_resource_type(ResourceType::new(
            "color",
            AttachmentType::Color,
            TextureFormat::Rgba8Unorm,
            AttachmentSize::surface(),
        ));
        graph.add_resource_type(ResourceType::surface("surface", TextureFormat::Bgra8Unorm));
        for i in 0..count {
            let op = format!("op{i}");
            graph.add_render_operation(RenderOperation::graphics(op.clone()));
            if i > 0 {
                graph.add_attachment_input(AttachmentBinding::image(
                    op.clone(),
                    "color",
                    format!("c{}", i - 1),
                ));
            }
            if i + 1 == count {
                graph.add_attachment_output(AttachmentBinding::color(op, "surface", "surface"));
            } else {
                graph.add_attachment_output(AttachmentBinding::color(op, "color", format!("c{i}")));
            }
        }
        graph
    }

    #[test]
    fn test_single_queue_is_one_batch() {
        let schedule = compile(&chain_graph(3), &[QueueTraits::graphics(1.0)]).unwrap();
        let recorder = Recorder::default();
        let mut frame = FrameSchedule::new(FrameContext::new(0, 0));
        frame.submit_schedule(&recorder, &schedule);

        let batches = recorder.batches.lock();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].1, vec!["op0", "op1", "op2"]);
        assert!(batches[0].2.is_empty());
        assert_eq!(batches[0].4, 1);
        assert!(frame.take_fence().is_some());
    }

    #[test]
    fn test_queue_changes_chain_batches() {
        let queues = [QueueTraits::graphics(1.0), QueueTraits::graphics(1.0)];
        let schedule = compile(&chain_graph(3), &queues).unwrap();
        let recorder = Recorder::default();
        let mut frame = FrameSchedule::new(FrameContext::new(4, 1));
        frame.submit_schedule(&recorder, &schedule);

        let batches = recorder.batches.lock();
        assert_eq!(batches.len(), 3);
        assert_eq!(
            batches.iter().map(|b| b.0).collect::<Vec<_>>(),
            vec![0, 1, 0]
        );
        assert_eq!(batches[1].2, vec![batches[0].3]);
        assert_eq!(batches[2].2, vec![batches[1].3]);
        assert_eq!(batches[0].4 + batches[1].4, 0);
        assert_eq!(batches[2].4, 1);
        assert_eq!(frame.submitted_count(), 3);
    }

    #[test]
    fn test_empty_schedule_finishes_signaled() {
        let recorder = Recorder::default();
        let mut frame = FrameSchedule::new(FrameContext::new(0, 0));
        assert!(frame.take_fence().is_none());
        frame.submit_schedule(&recorder, &CompiledSchedule::default());
        assert!(frame.is_empty());
        assert!(frame.take_fence().unwrap().is_signaled());
        assert!(frame.take_fence().is_none());
    }
}
