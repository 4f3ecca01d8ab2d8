use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

pub type Task = Box<dyn FnOnce() + Send + 'static>;
pub type RepeatingTask = Box<dyn FnMut() + Send + 'static>;

/// Anything touching a live inventory must run on the main context.
pub trait Scheduler: Send + Sync {
    /// Run on the calling thread, right now.
    fn run_now(&self, task: Task) {
        task();
    }

    fn run_on_main(&self, task: Task);

    fn run_async(&self, task: Task);

    fn run_periodically(&self, period: Duration, task: RepeatingTask) -> PeriodicHandle;

    fn is_main_context(&self) -> bool;
}

/// Cancels its periodic task when cancelled or dropped.
#[derive(Debug)]
pub struct PeriodicHandle {
    cancelled: Arc<AtomicBool>,
}

impl PeriodicHandle {
    fn new() -> (Self, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(false));
        (
            PeriodicHandle {
                cancelled: flag.clone(),
            },
            flag,
        )
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for PeriodicHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Synchronous scheduler: every task runs immediately on the caller.
/// Periodic tasks only run when `tick_periodic` is called.
#[derive(Default)]
pub struct InlineScheduler {
    periodic: Mutex<Vec<(Arc<AtomicBool>, RepeatingTask)>>,
}

impl InlineScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Run every live periodic task once; returns how many ran.
    pub fn tick_periodic(&self) -> usize {
        let mut tasks = std::mem::take(&mut *self.periodic.lock());
        tasks.retain(|(cancelled, _)| !cancelled.load(Ordering::SeqCst));
        for (_, task) in tasks.iter_mut() {
            task();
        }
        let ran = tasks.len();
        self.periodic.lock().extend(tasks);
        ran
    }
}

impl Scheduler for InlineScheduler {
    fn run_on_main(&self, task: Task) {
        task();
    }

    fn run_async(&self, task: Task) {
        task();
    }

    fn run_periodically(&self, _period: Duration, task: RepeatingTask) -> PeriodicHandle {
        let (handle, flag) = PeriodicHandle::new();
        self.periodic.lock().push((flag, task));
        handle
    }

    fn is_main_context(&self) -> bool {
        true
    }
}

/// Queue-backed scheduler. The thread that creates it is the main context
/// and must call `run_pending` regularly (once per tick).
pub struct MainThreadScheduler {
    main_thread: ThreadId,
    tx: Sender<Task>,
    rx: Receiver<Task>,
}

impl MainThreadScheduler {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        Arc::new(MainThreadScheduler {
            main_thread: thread::current().id(),
            tx,
            rx,
        })
    }

    /// Drain queued main-context tasks, including ones queued while draining.
    pub fn run_pending(&self) -> usize {
        if !self.is_main_context() {
            log::warn!("run_pending called off the main context; ignoring");
            return 0;
        }
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Block up to `timeout` for the first task, then drain.
    pub fn run_pending_timeout(&self, timeout: Duration) -> usize {
        if !self.is_main_context() {
            log::warn!("run_pending_timeout called off the main context; ignoring");
            return 0;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(task) => {
                task();
                1 + self.run_pending()
            }
            Err(_) => 0,
        }
    }
}

impl Scheduler for MainThreadScheduler {
    fn run_on_main(&self, task: Task) {
        if self.tx.send(task).is_err() {
            log::error!("main-context queue is closed; task dropped");
        }
    }

    fn run_async(&self, task: Task) {
        if let Err(e) = thread::Builder::new()
            .name("invmenu-async".to_string())
            .spawn(task)
        {
            log::error!("failed to spawn async task: {}", e);
        }
    }

    fn run_periodically(&self, period: Duration, mut task: RepeatingTask) -> PeriodicHandle {
        let (handle, cancelled) = PeriodicHandle::new();
        let step = period.min(Duration::from_millis(100));

        let spawned = thread::Builder::new()
            .name("invmenu-periodic".to_string())
            .spawn(move || {
                let mut next = Instant::now() + period;
                while !cancelled.load(Ordering::SeqCst) {
                    thread::sleep(step);
                    if Instant::now() >= next && !cancelled.load(Ordering::SeqCst) {
                        task();
                        next = Instant::now() + period;
                    }
                }
            });

        if let Err(e) = spawned {
            log::error!("failed to spawn periodic task: {}", e);
            handle.cancel();
        }
        handle
    }

    fn is_main_context(&self) -> bool {
        thread::current().id() == self.main_thread
    }
}
