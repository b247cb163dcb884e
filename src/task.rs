//! Units of work and their type-erased handles.
//!
//! Callers hand the pool any value implementing [`Task`]. At admission time the
//! value is boxed behind a small object-safe adapter so the lanes can hold work
//! of any concrete type side by side.
//!
//! ```text
//! T: Task ──submit──▶ TaskHandle { Box<dyn ErasedTask> } ──lane──▶ worker ──▶ execute()
//! ```

/// A unit of work the pool can run.
///
/// `execute` runs synchronously on a worker thread and returns nothing. The
/// pool does not inspect or retry it, and does not report its outcome to the
/// submitter. A panic inside `execute` is caught and logged by the worker;
/// it never takes the worker down.
///
/// Every `FnOnce() + Send + 'static` closure is a `Task`.
///
/// # Example
///
/// ```
/// use lanepool::Task;
///
/// struct Fibonacci {
///     n: u64,
/// }
///
/// impl Task for Fibonacci {
///     fn execute(self) {
///         let (mut a, mut b) = (0u64, 1u64);
///         for _ in 0..self.n {
///             (a, b) = (b, a.wrapping_add(b));
///         }
///         let _ = a;
///     }
/// }
/// ```
pub trait Task: Send + 'static {
    /// Run the work to completion.
    fn execute(self);
}

impl<F> Task for F
where
    F: FnOnce() + Send + 'static,
{
    #[inline]
    fn execute(self) {
        self()
    }
}

/// Object-safe adapter over [`Task`].
trait ErasedTask: Send {
    fn execute_boxed(self: Box<Self>);
}

impl<T: Task> ErasedTask for T {
    #[inline]
    fn execute_boxed(self: Box<Self>) {
        (*self).execute()
    }
}

/// Owned, type-erased task.
///
/// A handle lives in exactly one place at a time: a lane, or the hand of the
/// worker that dequeued it. Dropping a handle without calling
/// [`execute`](TaskHandle::execute) discards the work.
pub(crate) struct TaskHandle {
    inner: Box<dyn ErasedTask>,
}

impl TaskHandle {
    pub(crate) fn new<T: Task>(task: T) -> Self {
        Self {
            inner: Box::new(task),
        }
    }

    /// Run the wrapped task, consuming the handle.
    pub(crate) fn execute(self) {
        self.inner.execute_boxed()
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle").finish_non_exhaustive()
    }
}
