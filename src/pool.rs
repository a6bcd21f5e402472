use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::{Sender, bounded};
use tracing::debug;

use crate::error::DumpError;

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
    capacity: usize,
}

pub struct JobQueue<'a, J> {
    sender: Sender<J>,
    stopped: &'a AtomicBool,
}

impl<J> JobQueue<'_, J> {
    pub fn push(&self, job: J) -> Result<(), DumpError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(DumpError::PipelineStopped);
        }
        self.sender
            .send(job)
            .map_err(|_| DumpError::PipelineStopped)
    }
}

impl WorkerPool {
    pub fn new(workers: usize, capacity: usize) -> Self {
        Self {
            workers: workers.max(1),
            capacity: capacity.max(1),
        }
    }

    pub fn run<J, P, W>(&self, phase: &str, produce: P, work: W) -> Result<(), DumpError>
    where
        J: Send,
        P: FnOnce(&JobQueue<'_, J>) -> Result<(), DumpError>,
        W: Fn(usize, J) -> Result<(), DumpError> + Sync,
    {
        let stopped = AtomicBool::new(false);
        let (sender, receiver) = bounded::<J>(self.capacity);

        thread::scope(|scope| {
            let handles = (1..=self.workers)
                .map(|worker| {
                    let receiver = receiver.clone();
                    let work = &work;
                    let stopped = &stopped;
                    scope.spawn(move || -> Result<(), DumpError> {
                        for job in receiver.iter() {
                            if stopped.load(Ordering::Acquire) {
                                continue;
                            }
                            if let Err(err) = work(worker, job) {
                                stopped.store(true, Ordering::Release);
                                return Err(err);
                            }
                        }
                        debug!(phase, worker, "worker drained queue");
                        Ok(())
                    })
                })
                .collect::<Vec<_>>();
            drop(receiver);

            let queue = JobQueue {
                sender,
                stopped: &stopped,
            };
            let produced = produce(&queue);
            if produced.is_err() {
                stopped.store(true, Ordering::Release);
            }
            drop(queue);

            let mut failure = None;
            for handle in handles {
                let outcome = handle
                    .join()
                    .unwrap_or_else(|_| Err(DumpError::WorkerPanicked(phase.to_string())));
                if let Err(err) = outcome {
                    failure.get_or_insert(err);
                }
            }
            // A worker failure explains a stopped producer, not the other way round.
            match (failure, produced) {
                (Some(err), _) => Err(err),
                (None, Err(err)) => Err(err),
                (None, Ok(())) => Ok(()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn every_job_is_processed_once() {
        let pool = WorkerPool::new(4, 2);
        let total = AtomicUsize::new(0);
        pool.run(
            "sum",
            |queue| {
                for n in 1..=100usize {
                    queue.push(n)?;
                }
                Ok(())
            },
            |_, n| {
                total.fetch_add(n, Ordering::Relaxed);
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(total.load(Ordering::Relaxed), 5050);
    }

    #[test]
    fn worker_error_wins_over_stopped_producer() {
        let pool = WorkerPool::new(2, 1);
        let result = pool.run(
            "fail",
            |queue| {
                for n in 0..1000usize {
                    queue.push(n)?;
                }
                Ok(())
            },
            |_, n| {
                if n == 3 {
                    return Err(DumpError::ParserHttp("boom".to_string()));
                }
                Ok(())
            },
        );
        assert_matches!(result, Err(DumpError::ParserHttp(_)));
    }

    #[test]
    fn producer_error_is_returned() {
        let pool = WorkerPool::new(2, 4);
        let result = pool.run(
            "produce",
            |queue: &JobQueue<'_, usize>| {
                queue.push(1)?;
                Err(DumpError::Filesystem("missing input".to_string()))
            },
            |_, _| Ok(()),
        );
        assert_matches!(result, Err(DumpError::Filesystem(_)));
    }
}
