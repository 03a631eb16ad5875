//! Queue assignment by smooth weighted round-robin.

use crate::graph::{OperationKind, QueueTraits};

/// Spreads operations over compatible queues in proportion to their priority.
///
/// Each pick adds every compatible queue's weight to its running credit,
/// takes the queue with the highest credit (lowest index on ties) and charges
/// it the total weight handed out. Over any window the picks approach the
/// weight ratio, and the sequence depends only on the inputs. Priorities are
/// positive; validation rejects anything else before queues are assigned.
#[derive(Debug)]
pub(crate) struct QueueBalancer<'a> {
    queues: &'a [QueueTraits],
    credit: Vec<f64>,
}

impl<'a> QueueBalancer<'a> {
    pub(crate) fn new(queues: &'a [QueueTraits]) -> Self {
        Self {
            queues,
            credit: vec![0.0; queues.len()],
        }
    }

    /// Pick a queue for an operation of `kind`. `None` if no queue supports it.
    pub(crate) fn pick(&mut self, kind: OperationKind) -> Option<usize> {
        let mut total = 0.0;
        let mut best: Option<usize> = None;
        for (index, queue) in self.queues.iter().enumerate() {
            if !queue.supports(kind) {
                continue;
            }
            let weight = f64::from(queue.priority);
            self.credit[index] += weight;
            total += weight;
            if best.is_none_or(|b| self.credit[index] > self.credit[b]) {
                best = Some(index);
            }
        }
        let chosen = best?;
        self.credit[chosen] -= total;
        Some(chosen)
    }
}
