//! Update Scheduler
//!
//! The scheduler decides when a component whose render effect was notified
//! actually re-renders.
//!
//! # Algorithm
//!
//! In [`FlushMode::Sync`]:
//!
//! 1. A notified job runs as soon as the mutation that caused it has finished
//!    notifying (see [`Runtime::batch`]), before the mutation returns.
//! 2. If the same job is notified again while it is running (a hook or a child
//!    wrote something it reads), the notification is remembered instead of
//!    recursing.
//! 3. When the run finishes and a notification was remembered, the job runs
//!    once more. Reruns are capped by `max_recursive_updates`.
//! 4. The same cap applies across one batch: a job whose own hooks keep
//!    retriggering it runs at most `max_recursive_updates + 1` times before
//!    the mutation returns.
//!
//! In [`FlushMode::Batched`]:
//!
//! 1. A notified job is queued once, however often it is notified.
//! 2. [`UpdateScheduler::flush_jobs`] drains the queue in id order, so parents
//!    update before their children. Jobs queued while flushing go into the
//!    next round.
//! 3. A job that keeps requeueing itself is dropped with a warning once it has
//!    run `max_recursive_updates` extra times.
//!
//! Updates triggered by a mutation have no caller to report an error to, so
//! their errors are logged and parked until [`UpdateScheduler::take_errors`].
//!
//! [`Runtime::batch`]: crate::reactive::Runtime::batch

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::config::{FlushMode, RuntimeConfig};
use crate::error::{Error, Result};
use crate::reactive::Runtime;

/// A unit of scheduled work.
pub trait Job {
    /// Ordering and deduplication key.
    fn id(&self) -> usize;

    /// Do the work.
    fn run(&self) -> Result<()>;
}

/// Queues and runs component update jobs.
#[derive(Default)]
pub struct UpdateScheduler {
    config: RefCell<RuntimeConfig>,
    queue: RefCell<IndexMap<usize, Rc<dyn Job>>>,
    running: RefCell<HashSet<usize>>,
    rerun: RefCell<HashSet<usize>>,
    epoch: Cell<u64>,
    batch_runs: RefCell<HashMap<usize, usize>>,
    flushing: Cell<bool>,
    errors: RefCell<Vec<Error>>,
}

struct Running<'a> {
    scheduler: &'a UpdateScheduler,
    id: usize,
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.scheduler.running.borrow_mut().remove(&self.id);
        self.scheduler.rerun.borrow_mut().remove(&self.id);
    }
}

struct Flushing<'a>(&'a Cell<bool>);

impl Drop for Flushing<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl UpdateScheduler {
    /// A scheduler using `config`.
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config: RefCell::new(config),
            ..Self::default()
        }
    }

    /// Current configuration.
    pub fn config(&self) -> RuntimeConfig {
        self.config.borrow().clone()
    }

    /// Replace the configuration. Applies to jobs queued afterwards.
    pub fn set_config(&self, config: RuntimeConfig) {
        *self.config.borrow_mut() = config;
    }

    /// A job's dependencies changed.
    pub fn queue(&self, job: Rc<dyn Job>) {
        let flush = self.config.borrow().flush;
        match flush {
            FlushMode::Sync => self.run_now(job),
            FlushMode::Batched => self.enqueue(job),
        }
    }

    /// Number of jobs waiting for [`UpdateScheduler::flush_jobs`].
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Whether a flush is in progress.
    pub fn is_flushing(&self) -> bool {
        self.flushing.get()
    }

    /// Run every queued job, parents first. Returns the first error; later
    /// errors are parked.
    pub fn flush_jobs(&self) -> Result<()> {
        if self.flushing.replace(true) {
            tracing::debug!("flush already in progress");
            return Ok(());
        }
        let _flushing = Flushing(&self.flushing);
        let limit = self.config.borrow().max_recursive_updates;
        let mut runs: HashMap<usize, usize> = HashMap::new();
        let mut first_error = None;

        loop {
            let mut batch: Vec<Rc<dyn Job>> =
                std::mem::take(&mut *self.queue.borrow_mut()).into_values().collect();
            if batch.is_empty() {
                break;
            }
            batch.sort_by_key(|job| job.id());
            tracing::debug!(jobs = batch.len(), "flushing update queue");

            for job in batch {
                let count = runs.entry(job.id()).or_insert(0);
                *count += 1;
                if *count > limit + 1 {
                    tracing::warn!(job = job.id(), limit, "maximum recursive updates exceeded");
                    continue;
                }
                if let Err(error) = job.run() {
                    if first_error.is_none() {
                        first_error = Some(error);
                    } else {
                        self.park(error);
                    }
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Drain the errors raised by updates nobody could be told about.
    pub fn take_errors(&self) -> Vec<Error> {
        std::mem::take(&mut *self.errors.borrow_mut())
    }

    fn enqueue(&self, job: Rc<dyn Job>) {
        let id = job.id();
        let mut queue = self.queue.borrow_mut();
        if queue.contains_key(&id) {
            tracing::trace!(job = id, "already queued");
            return;
        }
        queue.insert(id, job);
    }

    /// Count a run of `id` within the current batch. Outside a batch every
    /// run counts as the first.
    fn batch_runs(&self, id: usize) -> usize {
        if !Runtime::is_batching() {
            return 1;
        }
        let epoch = Runtime::batch_epoch();
        let mut runs = self.batch_runs.borrow_mut();
        if self.epoch.replace(epoch) != epoch {
            runs.clear();
        }
        let count = runs.entry(id).or_insert(0);
        *count += 1;
        *count
    }

    fn run_now(&self, job: Rc<dyn Job>) {
        let id = job.id();
        if self.running.borrow().contains(&id) {
            tracing::debug!(job = id, "coalesced re-entrant update");
            self.rerun.borrow_mut().insert(id);
            return;
        }

        let limit = self.config.borrow().max_recursive_updates;
        if self.batch_runs(id) > limit + 1 {
            tracing::warn!(job = id, limit, "maximum recursive updates exceeded");
            return;
        }

        self.running.borrow_mut().insert(id);
        let _running = Running {
            scheduler: self,
            id,
        };
        let mut reruns = 0;
        loop {
            if let Err(error) = job.run() {
                self.park(error);
            }
            if !self.rerun.borrow_mut().remove(&id) {
                break;
            }
            reruns += 1;
            if reruns > limit {
                tracing::warn!(job = id, limit, "maximum recursive updates exceeded");
                break;
            }
        }
    }

    fn park(&self, error: Error) {
        tracing::error!(%error, "component update failed");
        self.errors.borrow_mut().push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Weak;

    struct Counting {
        id: usize,
        runs: Cell<usize>,
        requeue: Cell<usize>,
        scheduler: Weak<UpdateScheduler>,
        me: RefCell<Weak<Counting>>,
        log: Rc<RefCell<Vec<usize>>>,
        fail: Cell<bool>,
    }

    impl Counting {
        fn new(id: usize, scheduler: &Rc<UpdateScheduler>, log: &Rc<RefCell<Vec<usize>>>) -> Rc<Self> {
            let job = Rc::new(Self {
                id,
                runs: Cell::new(0),
                requeue: Cell::new(0),
                scheduler: Rc::downgrade(scheduler),
                me: RefCell::new(Weak::new()),
                log: Rc::clone(log),
                fail: Cell::new(false),
            });
            *job.me.borrow_mut() = Rc::downgrade(&job);
            job
        }
    }

    impl Job for Counting {
        fn id(&self) -> usize {
            self.id
        }

        fn run(&self) -> Result<()> {
            self.runs.set(self.runs.get() + 1);
            self.log.borrow_mut().push(self.id);
            if self.requeue.get() > 0 {
                self.requeue.set(self.requeue.get() - 1);
                let me = self.me.borrow().upgrade();
                if let (Some(scheduler), Some(me)) = (self.scheduler.upgrade(), me) {
                    scheduler.queue(me);
                }
            }
            if self.fail.get() {
                return Err(Error::setup("Job", "failed"));
            }
            Ok(())
        }
    }

    fn scheduler(flush: FlushMode) -> Rc<UpdateScheduler> {
        Rc::new(UpdateScheduler::new(RuntimeConfig {
            flush,
            max_recursive_updates: 3,
        }))
    }

    #[test]
    fn sync_runs_immediately_and_coalesces_reentry() {
        let scheduler = scheduler(FlushMode::Sync);
        let log = Rc::new(RefCell::new(Vec::new()));
        let job = Counting::new(1, &scheduler, &log);
        job.requeue.set(1);

        scheduler.queue(job.clone());
        assert_eq!(job.runs.get(), 2);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn sync_reruns_are_capped() {
        let scheduler = scheduler(FlushMode::Sync);
        let log = Rc::new(RefCell::new(Vec::new()));
        let job = Counting::new(1, &scheduler, &log);
        job.requeue.set(100);

        scheduler.queue(job.clone());
        assert_eq!(job.runs.get(), 4);
    }

    #[test]
    fn sync_runs_within_one_batch_are_capped() {
        let scheduler = scheduler(FlushMode::Sync);
        let log = Rc::new(RefCell::new(Vec::new()));
        let job = Counting::new(1, &scheduler, &log);

        Runtime::batch(|| {
            for _ in 0..10 {
                scheduler.queue(job.clone());
            }
        });
        assert_eq!(job.runs.get(), 4);

        scheduler.queue(job.clone());
        assert_eq!(job.runs.get(), 5);
    }

    #[test]
    fn batched_jobs_wait_and_dedupe() {
        let scheduler = scheduler(FlushMode::Batched);
        let log = Rc::new(RefCell::new(Vec::new()));
        let child = Counting::new(7, &scheduler, &log);
        let parent = Counting::new(2, &scheduler, &log);

        scheduler.queue(child.clone());
        scheduler.queue(parent.clone());
        scheduler.queue(child.clone());
        assert_eq!(scheduler.pending(), 2);
        assert!(log.borrow().is_empty());

        scheduler.flush_jobs().unwrap();
        assert_eq!(*log.borrow(), vec![2, 7]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn batched_requeue_runs_next_round() {
        let scheduler = scheduler(FlushMode::Batched);
        let log = Rc::new(RefCell::new(Vec::new()));
        let job = Counting::new(1, &scheduler, &log);
        job.requeue.set(1);

        scheduler.queue(job.clone());
        scheduler.flush_jobs().unwrap();
        assert_eq!(job.runs.get(), 2);
    }

    #[test]
    fn sync_errors_are_parked() {
        let scheduler = scheduler(FlushMode::Sync);
        let log = Rc::new(RefCell::new(Vec::new()));
        let job = Counting::new(1, &scheduler, &log);
        job.fail.set(true);

        scheduler.queue(job);
        let errors = scheduler.take_errors();
        assert_eq!(errors.len(), 1);
        assert!(scheduler.take_errors().is_empty());
    }
}
