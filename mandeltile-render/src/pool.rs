use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

use crate::error::{JobError, RenderError};

type Outcome<R> = std::result::Result<R, JobError>;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Report sent from a compute unit back to the controlling thread.
struct Completion<R> {
    unit: usize,
    outcome: Outcome<R>,
}

/// Resolves the [`JobHandle`] of one submitted job.
struct Notifier<R> {
    job: u64,
    tx: Sender<Outcome<R>>,
}

impl<R> Notifier<R> {
    fn resolve(self, outcome: Outcome<R>) {
        if self.tx.send(outcome).is_err() {
            trace!(job = self.job, "Job handle dropped before the job settled");
        }
    }
}

/// The receive side of a submitted job.
///
/// A handle only settles while the owning [`WorkerPool`] is pumped, either
/// through [`WorkerPool::wait`] or [`WorkerPool::pump`]/[`WorkerPool::try_pump`].
pub struct JobHandle<R> {
    id: u64,
    rx: Receiver<Outcome<R>>,
    taken: bool,
}

impl<R> JobHandle<R> {
    /// Submission sequence number, unique within its pool.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Take the outcome if the job has settled. Yields `Some` at most once.
    pub fn try_take(&mut self) -> Option<Outcome<R>> {
        if self.taken {
            return None;
        }
        let outcome = match self.rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(JobError::Disconnected),
        };
        self.taken = true;
        Some(outcome)
    }
}

// ---------------------------------------------------------------------------
// Compute units
// ---------------------------------------------------------------------------

struct ComputeUnit<J> {
    jobs: Option<Sender<J>>,
    thread: Option<JoinHandle<()>>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Body of a compute-unit thread: one job at a time until the pool hangs up.
fn run_unit<J, R, E, F>(unit: usize, jobs: Receiver<J>, done: Sender<Completion<R>>, compute: &F)
where
    F: Fn(J) -> std::result::Result<R, E>,
    E: Display,
{
    debug!(unit, "Compute unit started");
    while let Ok(job) = jobs.recv() {
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| compute(job))) {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(JobError::Failed(e.to_string())),
            Err(payload) => Err(JobError::Panicked(panic_message(payload.as_ref()))),
        };
        if done.send(Completion { unit, outcome }).is_err() {
            break;
        }
    }
    debug!(unit, "Compute unit exiting");
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// A fixed set of compute threads fed from a FIFO queue.
///
/// All scheduling state lives here and is touched only by the thread that
/// owns the pool. Compute units share nothing with it: each receives jobs
/// on its own channel and reports on a common completion channel, which
/// the owner drains by pumping.
///
/// Each unit runs at most one job at a time. Jobs submitted while every
/// unit is busy wait in submission order and are handed to the next unit
/// that reports back.
pub struct WorkerPool<J, R> {
    units: Vec<ComputeUnit<J>>,
    idle: Vec<usize>,
    queue: VecDeque<(J, Notifier<R>)>,
    busy: HashMap<usize, Notifier<R>>,
    completions: Receiver<Completion<R>>,
    next_job: u64,
}

impl<J, R> WorkerPool<J, R>
where
    J: Send + 'static,
    R: Send + 'static,
{
    /// Spawn `size` compute units, each running `compute` on its jobs.
    ///
    /// A job that returns `Err` or panics rejects only its own handle; the
    /// unit that ran it stays in service.
    pub fn new<F, E>(size: usize, compute: F) -> crate::Result<Self>
    where
        F: Fn(J) -> std::result::Result<R, E> + Send + Sync + 'static,
        E: Display + 'static,
    {
        if size == 0 {
            return Err(RenderError::InvalidPoolSize(size));
        }

        let compute = Arc::new(compute);
        let (done_tx, done_rx) = mpsc::channel();
        let mut units = Vec::with_capacity(size);
        for unit in 0..size {
            let (job_tx, job_rx) = mpsc::channel::<J>();
            let compute = Arc::clone(&compute);
            let done_tx = done_tx.clone();
            let thread = thread::Builder::new()
                .name(format!("tile-worker-{unit}"))
                .spawn(move || run_unit(unit, job_rx, done_tx, compute.as_ref()))
                .map_err(RenderError::Spawn)?;
            units.push(ComputeUnit {
                jobs: Some(job_tx),
                thread: Some(thread),
            });
        }
        debug!(size, "Worker pool ready");

        Ok(Self {
            units,
            // Reversed so that `pop` hands out unit 0 first.
            idle: (0..size).rev().collect(),
            queue: VecDeque::new(),
            busy: HashMap::with_capacity(size),
            completions: done_rx,
            next_job: 0,
        })
    }

    /// Submit a job. It starts at once if a unit is idle, otherwise it
    /// waits behind every job queued before it.
    pub fn submit(&mut self, job: J) -> JobHandle<R> {
        let id = self.next_job;
        self.next_job += 1;
        let (tx, rx) = mpsc::channel();
        let notifier = Notifier { job: id, tx };

        match self.idle.pop() {
            Some(unit) => self.dispatch(unit, job, notifier),
            None => {
                self.queue.push_back((job, notifier));
                trace!(job = id, queued = self.queue.len(), "Job queued");
            }
        }

        JobHandle {
            id,
            rx,
            taken: false,
        }
    }

    fn dispatch(&mut self, unit: usize, job: J, notifier: Notifier<R>) {
        if self.busy.contains_key(&unit) {
            unreachable!("compute unit {unit} dispatched while busy");
        }
        let sent = self.units[unit]
            .jobs
            .as_ref()
            .is_some_and(|tx| tx.send(job).is_ok());
        if sent {
            trace!(unit, job = notifier.job, "Job dispatched");
            self.busy.insert(unit, notifier);
        } else {
            // The unit's thread is gone; it is not returned to the idle set.
            warn!(unit, job = notifier.job, "Compute unit unavailable, rejecting job");
            notifier.resolve(Err(JobError::Disconnected));
        }
    }

    fn complete(&mut self, done: Completion<R>) {
        let Some(notifier) = self.busy.remove(&done.unit) else {
            unreachable!("completion from idle compute unit {}", done.unit);
        };
        match self.queue.pop_front() {
            Some((job, next)) => self.dispatch(done.unit, job, next),
            None => self.idle.push(done.unit),
        }
        if let Err(e) = &done.outcome {
            debug!(unit = done.unit, job = notifier.job, error = %e, "Job failed");
        }
        notifier.resolve(done.outcome);
    }

    /// Reject everything still waiting once no compute unit can answer.
    fn abandon_all(&mut self) {
        let orphaned = self.busy.len() + self.queue.len();
        if orphaned > 0 {
            warn!(orphaned, "All compute units gone, rejecting outstanding jobs");
        }
        for (_, notifier) in self.busy.drain() {
            notifier.resolve(Err(JobError::Disconnected));
        }
        for (_, notifier) in self.queue.drain(..) {
            notifier.resolve(Err(JobError::Disconnected));
        }
    }

    /// Block until one compute unit reports, then settle its job and hand
    /// it the next queued one.
    ///
    /// Returns `false` without blocking when nothing is in flight, and
    /// `false` if every compute unit has gone away.
    pub fn pump(&mut self) -> bool {
        if self.busy.is_empty() {
            return false;
        }
        match self.completions.recv() {
            Ok(done) => {
                self.complete(done);
                true
            }
            Err(_) => {
                self.abandon_all();
                false
            }
        }
    }

    /// Handle every report already waiting, without blocking. Returns how
    /// many jobs settled.
    pub fn try_pump(&mut self) -> usize {
        let mut settled = 0;
        while !self.busy.is_empty() {
            match self.completions.try_recv() {
                Ok(done) => {
                    self.complete(done);
                    settled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.abandon_all();
                    break;
                }
            }
        }
        settled
    }

    /// Pump until `handle` settles and return its outcome.
    pub fn wait(&mut self, handle: &mut JobHandle<R>) -> Outcome<R> {
        loop {
            if let Some(outcome) = handle.try_take() {
                return outcome;
            }
            if !self.pump() {
                return handle.try_take().unwrap_or(Err(JobError::Disconnected));
            }
        }
    }

    /// Wait for every handle. Results come back in submission order; if any
    /// job failed, the first failure is returned once all have settled.
    pub fn wait_all(&mut self, handles: Vec<JobHandle<R>>) -> Outcome<Vec<R>> {
        let mut results = Vec::with_capacity(handles.len());
        let mut failure = None;
        for mut handle in handles {
            match self.wait(&mut handle) {
                Ok(r) => results.push(r),
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(results),
        }
    }

    /// Number of compute units, fixed for the pool's lifetime.
    pub fn size(&self) -> usize {
        self.units.len()
    }

    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    pub fn busy_count(&self) -> usize {
        self.busy.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }
}

impl<J, R> Drop for WorkerPool<J, R> {
    fn drop(&mut self) {
        // Closing every job channel ends the unit loops.
        for unit in &mut self.units {
            unit.jobs.take();
        }
        for (i, unit) in self.units.iter_mut().enumerate() {
            if let Some(thread) = unit.thread.take() {
                if thread.join().is_err() {
                    warn!(unit = i, "Compute unit thread panicked on shutdown");
                }
            }
        }
    }
}
