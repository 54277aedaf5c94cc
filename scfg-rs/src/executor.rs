//! A fixed pool of worker threads, used to decode sentences in parallel.

use std::collections::VecDeque;
use std::fmt;
use std::panic;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::thread;

type Job = Box<dyn FnOnce() + Send>;

/// A handle to the worker pool.  Handles are cheap to clone and share the
/// same workers.
#[derive(Clone)]
pub struct Executor {
    concurrency: usize,
    mutex: Arc<Mutex<VecDeque<Job>>>,
    work_cv: Arc<Condvar>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let g = self.mutex.lock().unwrap();
        write!(f, "Executor(concurrency={}, queued={})", self.concurrency, g.len())
    }
}

impl Executor {
    /// Starts `concurrency` workers.  With a concurrency of 0 or 1 no thread
    /// is started, and tasks run synchronously in [`Executor::exec`].
    #[must_use]
    pub fn new(concurrency: usize) -> Executor {
        let mutex: Arc<Mutex<VecDeque<Job>>> = Arc::default();
        let cv: Arc<Condvar> = Arc::default();

        if concurrency > 1 {
            for _ in 0..concurrency {
                let mutex = mutex.clone();
                let cv = cv.clone();
                thread::spawn(move || loop {
                    let task = {
                        let mut mutexg = mutex.lock().unwrap();
                        loop {
                            match mutexg.pop_front() {
                                Some(task) => break task,
                                None => mutexg = cv.wait(mutexg).unwrap(),
                            }
                        }
                    };
                    task();
                });
            }
        }

        Executor {
            concurrency,
            mutex,
            work_cv: cv,
        }
    }

    /// Number of workers.
    #[must_use]
    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    fn queue_work(&self, f: Job) {
        if self.concurrency <= 1 {
            f();
            return;
        }
        let mut wq = self.mutex.lock().unwrap();
        wq.push_back(f);
        self.work_cv.notify_one();
    }

    /// Queues a task, returning a promise for its result.  A panic in the
    /// task is carried over to [`Promise::wait`].
    pub fn exec<TASK, RV>(&self, task: TASK) -> Promise<RV>
    where
        TASK: FnOnce() -> RV + Send + 'static,
        RV: Send + 'static,
    {
        let parts: Arc<(Mutex<Option<thread::Result<RV>>>, Condvar)> = Arc::default();

        let partsc = parts.clone();
        self.queue_work(Box::new(move || {
            let result = panic::catch_unwind(panic::AssertUnwindSafe(task));
            let mut g = partsc.0.lock().unwrap();
            *g = Some(result);
            partsc.1.notify_one();
        }));

        Promise { inner: parts }
    }
}

/// The pending result of a task queued on an [`Executor`].
pub struct Promise<T> {
    inner: Arc<(Mutex<Option<thread::Result<T>>>, Condvar)>,
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Promise")
    }
}

impl<T> Promise<T> {
    /// Blocks until the task is done and returns its result, resuming its
    /// panic if it panicked.
    pub fn wait(self) -> T {
        let mut g = self.inner.0.lock().unwrap();
        loop {
            match g.take() {
                Some(Ok(value)) => return value,
                Some(Err(payload)) => panic::resume_unwind(payload),
                None => g = self.inner.1.wait(g).unwrap(),
            }
        }
    }
}
