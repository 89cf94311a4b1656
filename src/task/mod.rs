//! Single-shot background tasks with progress reporting and cooperative
//! cancellation.
//!
//! An [`AsyncTask`] is a named closure producing `Result<T, TaskError<E>>`.
//! [`AsyncTask::spawn`] runs it on a dedicated worker thread and returns a
//! [`TaskHandle`] through which the caller:
//!
//! - receives [`TaskEvent`]s in the order the body emitted them, followed by
//!   exactly one [`TaskEvent::Finished`]
//! - requests cancellation, which the body observes at its own checkpoints
//! - waits for and takes the [`TaskOutcome`] (once; `join` consumes the handle)
//!
//! State machine:
//!
//! ```text
//! Pending -> Running -> Completed | Failed | Cancelled
//! ```
//!
//! Terminal states are final. Failures inside the body (including panics) are
//! captured into the outcome; nothing propagates out of the worker.

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed | TaskState::Cancelled)
    }
}

/// Error type returned by a task body.
///
/// `?` converts the body's own error `E` into [`TaskError::Failed`].
#[derive(Debug, Clone, PartialEq)]
pub enum TaskError<E> {
    /// The body stopped at a checkpoint after cancellation was requested.
    Cancelled,
    /// The body did not return normally (panic, or the worker never started).
    Aborted(String),
    Failed(E),
}

impl<E> From<E> for TaskError<E> {
    fn from(err: E) -> Self {
        TaskError::Failed(err)
    }
}

impl<E: fmt::Display> fmt::Display for TaskError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Cancelled => write!(f, "task cancelled"),
            TaskError::Aborted(reason) => write!(f, "task aborted: {reason}"),
            TaskError::Failed(err) => write!(f, "{err}"),
        }
    }
}

/// Terminal result of a task run.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<T, E> {
    Completed(T),
    Failed(E),
    Aborted(String),
    Cancelled,
}

impl<T, E> TaskOutcome<T, E> {
    pub fn state(&self) -> TaskState {
        match self {
            TaskOutcome::Completed(_) => TaskState::Completed,
            TaskOutcome::Failed(_) | TaskOutcome::Aborted(_) => TaskState::Failed,
            TaskOutcome::Cancelled => TaskState::Cancelled,
        }
    }

    pub fn into_result(self) -> Result<T, TaskError<E>> {
        match self {
            TaskOutcome::Completed(value) => Ok(value),
            TaskOutcome::Failed(err) => Err(TaskError::Failed(err)),
            TaskOutcome::Aborted(reason) => Err(TaskError::Aborted(reason)),
            TaskOutcome::Cancelled => Err(TaskError::Cancelled),
        }
    }

    fn from_result(result: Result<T, TaskError<E>>) -> Self {
        match result {
            Ok(value) => TaskOutcome::Completed(value),
            Err(TaskError::Failed(err)) => TaskOutcome::Failed(err),
            Err(TaskError::Aborted(reason)) => TaskOutcome::Aborted(reason),
            Err(TaskError::Cancelled) => TaskOutcome::Cancelled,
        }
    }
}

/// A progress report emitted by a task body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub message: String,
    /// 0..=100, non-decreasing within a run.
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Progress(Progress),
    /// Always the last event of a run.
    Finished(TaskState),
}

/// Handed to the task body: progress reporting and cancellation checks.
///
/// Parameterized by the body's error type so that `ctx.checkpoint()?` needs no
/// annotation.
pub struct TaskContext<E> {
    name: String,
    events: Sender<TaskEvent>,
    cancel: Arc<AtomicBool>,
    last_percent: Cell<u8>,
    _error: PhantomData<fn() -> E>,
}

impl<E> TaskContext<E> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Emit a progress event.
    ///
    /// `percent` is clamped to 100 and never moves backwards: a value below
    /// the last reported one is raised to it.
    pub fn report_progress(&self, message: impl Into<String>, percent: u8) {
        let message = message.into();
        let mut percent = percent.min(100);
        let last = self.last_percent.get();
        if percent < last {
            warn!(task = %self.name, percent, last, "progress went backwards; holding at last value");
            percent = last;
        }
        self.last_percent.set(percent);

        debug!(task = %self.name, percent, %message, "progress");
        // The receiver may have been dropped by a caller that does not care
        // about progress; the run continues regardless.
        let _ = self.events.send(TaskEvent::Progress(Progress { message, percent }));
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Cancellation checkpoint: `Err(TaskError::Cancelled)` if cancellation
    /// has been requested.
    pub fn checkpoint(&self) -> Result<(), TaskError<E>> {
        if self.is_cancelled() {
            info!(task = %self.name, "cancellation observed at checkpoint");
            return Err(TaskError::Cancelled);
        }
        Ok(())
    }
}

type TaskBody<T, E> = Box<dyn FnOnce(&TaskContext<E>) -> Result<T, TaskError<E>> + Send + 'static>;

/// A named, not-yet-started unit of background work.
pub struct AsyncTask<T, E> {
    name: String,
    body: TaskBody<T, E>,
    cancel: Arc<AtomicBool>,
}

impl<T, E> fmt::Debug for AsyncTask<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncTask").field("name", &self.name).finish()
    }
}

impl<T, E> AsyncTask<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(&TaskContext<E>) -> Result<T, TaskError<E>> + Send + 'static,
    {
        Self {
            name: name.into(),
            body: Box::new(body),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cancel before starting. The spawned worker finishes as `Cancelled`
    /// without entering the body.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        info!(task = %self.name, "cancellation requested before start");
    }

    /// Start the task on a dedicated worker thread.
    ///
    /// Consuming `self` makes the task single-shot.
    pub fn spawn(self) -> TaskHandle<T, E> {
        let (tx, rx) = mpsc::channel();
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot {
                state: TaskState::Pending,
                outcome: None,
            }),
            finished: Condvar::new(),
        });
        let cancel = self.cancel;

        let ctx = TaskContext {
            name: self.name.clone(),
            events: tx.clone(),
            cancel: Arc::clone(&cancel),
            last_percent: Cell::new(0),
            _error: PhantomData,
        };
        let worker_shared = Arc::clone(&shared);
        let body = self.body;

        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run(ctx, body, &worker_shared));

        let worker = match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(task = %self.name, error = %err, "failed to start worker thread");
                finish(&shared, &tx, &self.name, TaskOutcome::Aborted(format!("failed to start worker: {err}")));
                None
            }
        };
        drop(tx);

        TaskHandle {
            name: self.name,
            shared,
            cancel,
            events: rx,
            worker,
        }
    }
}

struct Slot<T, E> {
    state: TaskState,
    outcome: Option<TaskOutcome<T, E>>,
}

struct Shared<T, E> {
    slot: Mutex<Slot<T, E>>,
    finished: Condvar,
}

impl<T, E> Shared<T, E> {
    fn lock(&self) -> MutexGuard<'_, Slot<T, E>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn run<T, E>(ctx: TaskContext<E>, body: TaskBody<T, E>, shared: &Shared<T, E>) {
    shared.lock().state = TaskState::Running;
    info!(task = %ctx.name, "task running");

    let result = match ctx.checkpoint() {
        Ok(()) => catch_unwind(AssertUnwindSafe(|| body(&ctx)))
            .unwrap_or_else(|payload| Err(TaskError::Aborted(panic_message(payload.as_ref())))),
        Err(cancelled) => Err(cancelled),
    };

    finish(shared, &ctx.events, &ctx.name, TaskOutcome::from_result(result));
}

/// Store the outcome, wake waiters, then emit the terminal event.
fn finish<T, E>(shared: &Shared<T, E>, events: &Sender<TaskEvent>, name: &str, outcome: TaskOutcome<T, E>) {
    let state = outcome.state();
    {
        let mut slot = shared.lock();
        slot.state = state;
        slot.outcome = Some(outcome);
    }
    shared.finished.notify_all();

    match state {
        TaskState::Completed => info!(task = %name, "task completed"),
        TaskState::Cancelled => info!(task = %name, "task cancelled"),
        _ => warn!(task = %name, ?state, "task failed"),
    }
    let _ = events.send(TaskEvent::Finished(state));
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task body panicked".to_string()
    }
}

/// Caller-side view of a spawned task.
pub struct TaskHandle<T, E> {
    name: String,
    shared: Arc<Shared<T, E>>,
    cancel: Arc<AtomicBool>,
    events: Receiver<TaskEvent>,
    worker: Option<JoinHandle<()>>,
}

impl<T, E> fmt::Debug for TaskHandle<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

impl<T, E> TaskHandle<T, E> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TaskState {
        self.shared.lock().state
    }

    /// Request cooperative cancellation. No effect once the task is terminal.
    pub fn cancel(&self) {
        let slot = self.shared.lock();
        if slot.state.is_terminal() {
            debug!(task = %self.name, state = ?slot.state, "cancel ignored for finished task");
            return;
        }
        self.cancel.store(true, Ordering::SeqCst);
        info!(task = %self.name, "cancellation requested");
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Block until the next event. `None` once the terminal event has been
    /// consumed.
    pub fn next_event(&self) -> Option<TaskEvent> {
        self.events.recv().ok()
    }

    /// Non-blocking variant of [`next_event`](Self::next_event).
    pub fn try_next_event(&self) -> Option<TaskEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Block until the task reaches a terminal state.
    pub fn wait(&self) -> TaskState {
        let mut slot = self.shared.lock();
        while !slot.state.is_terminal() {
            slot = self
                .shared
                .finished
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
        slot.state
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`, returning `None`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<TaskState> {
        let slot = self.shared.lock();
        let (slot, _) = self
            .shared
            .finished
            .wait_timeout_while(slot, timeout, |s| !s.state.is_terminal())
            .unwrap_or_else(PoisonError::into_inner);
        slot.state.is_terminal().then_some(slot.state)
    }

    /// Wait for completion and take the outcome.
    pub fn join(mut self) -> TaskOutcome<T, E> {
        self.wait();
        if let Some(worker) = self.worker.take() {
            // The body's panics are caught inside the worker, so the thread
            // itself always exits normally.
            let _ = worker.join();
        }
        self.shared
            .lock()
            .outcome
            .take()
            .unwrap_or_else(|| TaskOutcome::Aborted("outcome already taken".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    #[derive(Debug, Clone, PartialEq)]
    enum TestError {
        NotEnoughData,
    }

    fn drain<T, E>(handle: &TaskHandle<T, E>) -> Vec<TaskEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.next_event() {
            events.push(event);
        }
        events
    }

    fn progress(message: &str, percent: u8) -> TaskEvent {
        TaskEvent::Progress(Progress {
            message: message.to_string(),
            percent,
        })
    }

    #[test]
    fn completed_task_delivers_progress_in_order_then_value() {
        let task: AsyncTask<i32, TestError> = AsyncTask::new("steps", |ctx| {
            ctx.report_progress("a", 0);
            ctx.report_progress("b", 50);
            ctx.report_progress("done", 100);
            Ok(7)
        });
        assert_eq!(task.name(), "steps");

        let handle = task.spawn();
        let events = drain(&handle);
        assert_eq!(
            events,
            vec![
                progress("a", 0),
                progress("b", 50),
                progress("done", 100),
                TaskEvent::Finished(TaskState::Completed),
            ]
        );
        assert_eq!(handle.state(), TaskState::Completed);
        assert_eq!(handle.join(), TaskOutcome::Completed(7));
    }

    #[test]
    fn body_error_is_preserved() {
        let task: AsyncTask<i32, TestError> = AsyncTask::new("fails", |_| Err(TestError::NotEnoughData.into()));
        let handle = task.spawn();
        assert_eq!(handle.wait(), TaskState::Failed);
        assert_eq!(handle.join(), TaskOutcome::Failed(TestError::NotEnoughData));
    }

    #[test]
    fn question_mark_converts_body_errors() {
        fn step() -> Result<i32, TestError> {
            Err(TestError::NotEnoughData)
        }
        let task: AsyncTask<i32, TestError> = AsyncTask::new("question-mark", |_| Ok(step()? + 1));
        assert_eq!(
            task.spawn().join().into_result(),
            Err(TaskError::Failed(TestError::NotEnoughData))
        );
    }

    #[test]
    fn panic_is_captured_as_failure() {
        let task: AsyncTask<i32, TestError> = AsyncTask::new("panics", |_| panic!("boom"));
        let handle = task.spawn();
        let events = drain(&handle);
        assert_eq!(events, vec![TaskEvent::Finished(TaskState::Failed)]);
        assert_eq!(handle.join(), TaskOutcome::Aborted("boom".to_string()));
    }

    #[test]
    fn progress_never_decreases_and_is_clamped() {
        let task: AsyncTask<(), TestError> = AsyncTask::new("clamp", |ctx| {
            ctx.report_progress("half", 50);
            ctx.report_progress("back", 10);
            ctx.report_progress("over", 250);
            Ok(())
        });
        let handle = task.spawn();
        let events = drain(&handle);
        assert_eq!(
            events,
            vec![
                progress("half", 50),
                progress("back", 50),
                progress("over", 100),
                TaskEvent::Finished(TaskState::Completed),
            ]
        );
    }

    #[test]
    fn cancel_after_completion_is_a_no_op() {
        let task: AsyncTask<&'static str, TestError> = AsyncTask::new("done", |_| Ok("value"));
        let handle = task.spawn();
        assert_eq!(handle.wait(), TaskState::Completed);

        handle.cancel();
        assert!(!handle.is_cancel_requested());
        assert_eq!(handle.state(), TaskState::Completed);
        assert_eq!(handle.join(), TaskOutcome::Completed("value"));
    }

    #[test]
    fn cancelled_before_start_never_runs_the_body() {
        let entered = Arc::new(AtomicBool::new(false));
        let entered_w = Arc::clone(&entered);
        let task: AsyncTask<u32, TestError> = AsyncTask::new("never started", move |_| {
            entered_w.store(true, Ordering::SeqCst);
            Ok(1)
        });

        task.cancel();
        let handle = task.spawn();
        assert!(handle.is_cancel_requested());
        assert_eq!(drain(&handle), vec![TaskEvent::Finished(TaskState::Cancelled)]);
        assert_eq!(handle.join(), TaskOutcome::Cancelled);
        assert!(!entered.load(Ordering::SeqCst));
    }

    #[test]
    fn cancellation_is_observed_at_the_next_checkpoint() {
        let reached = Arc::new(Barrier::new(2));
        let resume = Arc::new(Barrier::new(2));
        let (reached_w, resume_w) = (Arc::clone(&reached), Arc::clone(&resume));

        let task: AsyncTask<u32, TestError> = AsyncTask::new("cancellable", move |ctx| {
            ctx.report_progress("phase 1", 10);
            reached_w.wait();
            resume_w.wait();
            ctx.checkpoint()?;
            ctx.report_progress("phase 2", 60);
            Ok(1)
        });

        let handle = task.spawn();
        reached.wait();
        assert_eq!(handle.state(), TaskState::Running);
        handle.cancel();
        resume.wait();

        let events = drain(&handle);
        assert_eq!(
            events,
            vec![progress("phase 1", 10), TaskEvent::Finished(TaskState::Cancelled)]
        );
        assert_eq!(handle.join(), TaskOutcome::Cancelled);
    }

    #[test]
    fn body_without_checkpoints_runs_to_completion_despite_cancel() {
        let gate = Arc::new(Barrier::new(2));
        let gate_w = Arc::clone(&gate);
        let task: AsyncTask<u32, TestError> = AsyncTask::new("uncooperative", move |_| {
            gate_w.wait();
            gate_w.wait();
            Ok(3)
        });

        let handle = task.spawn();
        gate.wait();
        handle.cancel();
        assert!(handle.is_cancel_requested());
        gate.wait();
        assert_eq!(handle.join(), TaskOutcome::Completed(3));
    }

    #[test]
    fn wait_timeout_reports_unfinished_task() {
        let gate = Arc::new(Barrier::new(2));
        let gate_w = Arc::clone(&gate);
        let task: AsyncTask<(), TestError> = AsyncTask::new("slow", move |_| {
            gate_w.wait();
            Ok(())
        });

        let handle = task.spawn();
        assert_eq!(handle.wait_timeout(Duration::from_millis(20)), None);
        gate.wait();
        assert_eq!(handle.wait_timeout(Duration::from_secs(5)), Some(TaskState::Completed));
    }

    #[test]
    fn events_are_optional() {
        let task: AsyncTask<u8, TestError> = AsyncTask::new("quiet", |ctx| {
            ctx.report_progress("working", 30);
            Ok(9)
        });
        // Never reading events must not block or fail the run.
        assert_eq!(task.spawn().join(), TaskOutcome::Completed(9));
    }
}
