// Copyright (c) 2026 Asm-Differ Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Worker pool for per-function work items.
//!
//! The coordinator dispatches closures and applies their outputs on its
//! own thread; workers never touch shared state. Every item carries a
//! monotonically assigned command id, which is also the cancellation
//! handle: outputs of cancelled ids are received and dropped.

use std::collections::HashSet;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::compare_types::ComparisonResult;
use crate::instr::StreamItem;

pub type WorkQueueCommandId = u64;

/// Result payload of one work item.
pub enum WorkOutput {
    InstructionStream {
        side: usize,
        named_index: u32,
        items: Vec<StreamItem>,
    },
    Comparison {
        matched_index: u32,
        result: ComparisonResult,
    },
}

pub struct WorkResult {
    pub command_id: WorkQueueCommandId,
    pub output: WorkOutput,
}

struct WorkItem {
    command_id: WorkQueueCommandId,
    run: Box<dyn FnOnce() -> WorkOutput + Send>,
}

pub struct WorkQueue {
    job_tx: Option<Sender<WorkItem>>,
    result_rx: Receiver<WorkResult>,
    next_command_id: WorkQueueCommandId,
    in_flight: usize,
    cancelled: HashSet<WorkQueueCommandId>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkQueue {
    pub fn new(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (job_tx, job_rx) = channel::<WorkItem>();
        let (result_tx, result_rx) = channel::<WorkResult>();
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            workers.push(thread::spawn(move || loop {
                let item = {
                    let guard = job_rx.lock().expect("job receiver poisoned");
                    guard.recv()
                };
                let Ok(item) = item else { break };
                let output = (item.run)();
                if result_tx
                    .send(WorkResult {
                        command_id: item.command_id,
                        output,
                    })
                    .is_err()
                {
                    break;
                }
            }));
        }

        Self {
            job_tx: Some(job_tx),
            result_rx,
            next_command_id: 1,
            in_flight: 0,
            cancelled: HashSet::new(),
            workers,
        }
    }

    /// Queues one work item and returns its command id.
    pub fn dispatch<F>(&mut self, run: F) -> WorkQueueCommandId
    where
        F: FnOnce() -> WorkOutput + Send + 'static,
    {
        let command_id = self.next_command_id;
        self.next_command_id += 1;
        let item = WorkItem {
            command_id,
            run: Box::new(run),
        };
        self.job_tx
            .as_ref()
            .expect("queue already shut down")
            .send(item)
            .expect("workers gone");
        self.in_flight += 1;
        command_id
    }

    /// Marks a pending item as cancelled. Its output, if one still
    /// arrives, is discarded.
    pub fn cancel(&mut self, command_id: WorkQueueCommandId) {
        self.cancelled.insert(command_id);
    }

    pub fn pending_count(&self) -> usize {
        self.in_flight
    }

    /// Blocks until every dispatched item has reported back, feeding the
    /// surviving results to `apply` in completion order.
    pub fn wait_results<F>(&mut self, mut apply: F)
    where
        F: FnMut(WorkResult),
    {
        while self.in_flight > 0 {
            let Ok(result) = self.result_rx.recv() else {
                // Workers died; the remaining slots keep their prior state.
                self.in_flight = 0;
                break;
            };
            self.in_flight -= 1;
            if self.cancelled.remove(&result.command_id) {
                continue;
            }
            apply(result);
        }
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.job_tx.take(); // closing the channel stops the workers
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comparison_output(matched_index: u32) -> WorkOutput {
        WorkOutput::Comparison {
            matched_index,
            result: ComparisonResult::default(),
        }
    }

    #[test]
    fn results_arrive_for_every_dispatch() {
        let mut queue = WorkQueue::new(4);
        for i in 0..16u32 {
            queue.dispatch(move || comparison_output(i));
        }
        let mut seen = Vec::new();
        queue.wait_results(|res| {
            if let WorkOutput::Comparison { matched_index, .. } = res.output {
                seen.push(matched_index);
            }
        });
        seen.sort_unstable();
        assert_eq!(seen, (0..16).collect::<Vec<_>>());
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn command_ids_are_monotonic() {
        let mut queue = WorkQueue::new(1);
        let a = queue.dispatch(|| comparison_output(0));
        let b = queue.dispatch(|| comparison_output(1));
        assert!(b > a);
        queue.wait_results(|_| {});
    }

    #[test]
    fn cancelled_results_are_dropped() {
        let mut queue = WorkQueue::new(2);
        let keep = queue.dispatch(|| comparison_output(1));
        let drop_id = queue.dispatch(|| comparison_output(2));
        queue.cancel(drop_id);

        let mut seen = Vec::new();
        queue.wait_results(|res| seen.push(res.command_id));
        assert_eq!(seen, vec![keep]);
    }
}
