//! Dispatchers
//!
//! A dispatcher runs "this unit of work, somewhere, soon". The kernel only
//! ever hands it mailbox drains, and a drain of a given actor is never
//! scheduled twice at once (the mailbox flag guarantees that), so a
//! dispatcher is free to run work items concurrently.
//!
//! Implementations:
//! - [`ThreadPoolDispatcher`]: fixed pool of named worker threads
//!   (one worker for pinned dispatchers)
//! - [`TokioDispatcher`]: drains on a tokio runtime's blocking pool
//! - [`ManualDispatcher`]: queued work run explicitly by the caller, for
//!   deterministic tests

use crate::error::{KernelError, Result};
use crossbeam_channel::{unbounded, Sender};
use kernel_config::defaults::dispatcher::DEFAULT_DISPATCHER_ID;
use kernel_config::{DispatcherKind, DispatcherSettings, KernelSettings};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

/// Unit of work handed to a dispatcher
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Execution substrate for mailbox drains
pub trait Dispatcher: Send + Sync {
    /// Identifier referenced from `Props::with_dispatcher`
    fn id(&self) -> &str;

    /// Run `work` eventually
    fn schedule(&self, work: Work);

    /// User messages a mailbox may process per activation
    fn throughput(&self) -> usize;

    /// Stop accepting work; already queued work may still run
    fn shutdown(&self) {}
}

enum Job {
    Run(Work),
    Stop,
}

/// Fixed pool of worker threads fed from one unbounded channel
pub struct ThreadPoolDispatcher {
    id: String,
    throughput: usize,
    sender: Sender<Job>,
    threads: usize,
    stopped: AtomicBool,
}

impl ThreadPoolDispatcher {
    pub fn new(id: impl Into<String>, threads: usize, throughput: usize) -> Result<Self> {
        let id = id.into();
        if threads == 0 {
            return Err(KernelError::dispatcher(&id, "thread count must be at least one"));
        }
        let (sender, receiver) = unbounded::<Job>();

        for index in 0..threads {
            let receiver = receiver.clone();
            let worker_id = id.clone();
            thread::Builder::new()
                .name(format!("{}-{}", id, index))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        match job {
                            Job::Run(work) => {
                                // Cells catch user panics themselves; this keeps
                                // the worker alive if kernel code ever panics
                                if let Err(payload) = catch_unwind(AssertUnwindSafe(work)) {
                                    error!(
                                        dispatcher = %worker_id,
                                        panic = ?payload.downcast_ref::<&str>(),
                                        "Dispatcher work item panicked"
                                    );
                                }
                            }
                            Job::Stop => break,
                        }
                    }
                    debug!(dispatcher = %worker_id, worker = index, "Dispatcher worker exiting");
                })
                .map_err(|e| KernelError::dispatcher(&id, format!("failed to spawn worker: {}", e)))?;
        }

        info!(dispatcher = %id, threads, throughput, "Thread pool dispatcher started");
        Ok(Self {
            id,
            throughput: throughput.max(1),
            sender,
            threads,
            stopped: AtomicBool::new(false),
        })
    }

    /// Dispatcher backed by one dedicated thread
    pub fn single_thread(id: impl Into<String>, throughput: usize) -> Result<Self> {
        Self::new(id, 1, throughput)
    }

    pub fn from_settings(id: impl Into<String>, settings: &DispatcherSettings) -> Result<Self> {
        match settings.kind {
            DispatcherKind::Pinned => Self::single_thread(id, settings.throughput),
            DispatcherKind::ThreadPool => Self::new(id, settings.threads, settings.throughput),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }
}

impl Dispatcher for ThreadPoolDispatcher {
    fn id(&self) -> &str {
        &self.id
    }

    fn schedule(&self, work: Work) {
        if self.stopped.load(Ordering::SeqCst) {
            warn!(dispatcher = %self.id, "Work scheduled after shutdown was dropped");
            return;
        }
        if self.sender.send(Job::Run(work)).is_err() {
            warn!(dispatcher = %self.id, "Dispatcher channel closed, work dropped");
        }
    }

    fn throughput(&self) -> usize {
        self.throughput
    }

    fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        // Workers may be the caller, so no join; each exits on its Stop
        for _ in 0..self.threads {
            let _ = self.sender.send(Job::Stop);
        }
        info!(dispatcher = %self.id, "Thread pool dispatcher shutting down");
    }
}

/// Runs drains on a tokio runtime's blocking thread pool
pub struct TokioDispatcher {
    id: String,
    throughput: usize,
    handle: tokio::runtime::Handle,
}

impl TokioDispatcher {
    pub fn new(id: impl Into<String>, handle: tokio::runtime::Handle, throughput: usize) -> Self {
        Self {
            id: id.into(),
            throughput: throughput.max(1),
            handle,
        }
    }

    /// Use the runtime the caller is running on
    pub fn current(id: impl Into<String>, throughput: usize) -> Result<Self> {
        let id = id.into();
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| KernelError::dispatcher(&id, e.to_string()))?;
        Ok(Self::new(id, handle, throughput))
    }
}

impl Dispatcher for TokioDispatcher {
    fn id(&self) -> &str {
        &self.id
    }

    fn schedule(&self, work: Work) {
        // Drains are synchronous and may block in user code
        drop(self.handle.spawn_blocking(work));
    }

    fn throughput(&self) -> usize {
        self.throughput
    }
}

/// Work queue driven explicitly by the caller
///
/// Nothing runs until [`run_next`](ManualDispatcher::run_next) or
/// [`run_until_idle`](ManualDispatcher::run_until_idle) is called, which makes
/// interleavings in tests reproducible.
pub struct ManualDispatcher {
    id: String,
    throughput: usize,
    queue: Mutex<VecDeque<Work>>,
}

impl ManualDispatcher {
    pub fn new(id: impl Into<String>, throughput: usize) -> Self {
        Self {
            id: id.into(),
            throughput: throughput.max(1),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Run the oldest queued work item; false if none was queued
    pub fn run_next(&self) -> bool {
        // The lock is released before the work runs so it can schedule more
        let work = self.queue.lock().pop_front();
        match work {
            Some(work) => {
                work();
                true
            }
            None => false,
        }
    }

    /// Run work until the queue stays empty; returns the number of items run
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

impl Dispatcher for ManualDispatcher {
    fn id(&self) -> &str {
        &self.id
    }

    fn schedule(&self, work: Work) {
        self.queue.lock().push_back(work);
    }

    fn throughput(&self) -> usize {
        self.throughput
    }
}

/// Dispatchers known to one actor system
pub struct Dispatchers {
    default: Arc<dyn Dispatcher>,
    named: HashMap<String, Arc<dyn Dispatcher>>,
}

impl Dispatchers {
    pub fn new(default: Arc<dyn Dispatcher>) -> Self {
        Self {
            default,
            named: HashMap::new(),
        }
    }

    /// Start the thread pools described by `settings`
    ///
    /// `default_override` replaces the configured default dispatcher, and
    /// entries of `extra` replace configured dispatchers with the same id.
    pub fn from_settings(
        settings: &KernelSettings,
        default_override: Option<Arc<dyn Dispatcher>>,
        extra: HashMap<String, Arc<dyn Dispatcher>>,
    ) -> Result<Self> {
        let default: Arc<dyn Dispatcher> = match default_override {
            Some(dispatcher) => dispatcher,
            None => Arc::new(ThreadPoolDispatcher::from_settings(
                DEFAULT_DISPATCHER_ID,
                &settings.default_dispatcher,
            )?),
        };
        let mut dispatchers = Self::new(default);

        for (id, dispatcher_settings) in &settings.dispatchers {
            if extra.contains_key(id) {
                continue;
            }
            let dispatcher = ThreadPoolDispatcher::from_settings(id.clone(), dispatcher_settings)?;
            dispatchers.register(id.clone(), Arc::new(dispatcher));
        }
        for (id, dispatcher) in extra {
            dispatchers.register(id, dispatcher);
        }
        Ok(dispatchers)
    }

    pub fn register(&mut self, id: impl Into<String>, dispatcher: Arc<dyn Dispatcher>) {
        self.named.insert(id.into(), dispatcher);
    }

    pub fn default_dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.default
    }

    /// Resolve a `Props` dispatcher id; `None` means the default
    pub fn lookup(&self, id: Option<&str>) -> Result<Arc<dyn Dispatcher>> {
        match id {
            None => Ok(Arc::clone(&self.default)),
            Some(id) if id == DEFAULT_DISPATCHER_ID => Ok(Arc::clone(&self.default)),
            Some(id) => self
                .named
                .get(id)
                .cloned()
                .ok_or_else(|| KernelError::unknown_dispatcher(id)),
        }
    }

    pub fn shutdown_all(&self) {
        self.default.shutdown();
        for dispatcher in self.named.values() {
            dispatcher.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_manual_dispatcher_runs_in_order() {
        let dispatcher = Arc::new(ManualDispatcher::new("manual", 5));
        let log = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let log = log.clone();
            dispatcher.schedule(Box::new(move || log.lock().push(n)));
        }
        assert_eq!(dispatcher.pending(), 3);
        assert!(log.lock().is_empty());

        assert!(dispatcher.run_next());
        assert_eq!(*log.lock(), vec![0]);
        assert_eq!(dispatcher.run_until_idle(), 2);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
        assert!(!dispatcher.run_next());
    }

    #[test]
    fn test_manual_dispatcher_work_can_reschedule() {
        let dispatcher = Arc::new(ManualDispatcher::new("manual", 1));
        let counter = Arc::new(AtomicUsize::new(0));

        let inner_dispatcher = dispatcher.clone();
        let inner_counter = counter.clone();
        dispatcher.schedule(Box::new(move || {
            inner_counter.fetch_add(1, Ordering::SeqCst);
            let counter = inner_counter.clone();
            inner_dispatcher.schedule(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }));

        assert_eq!(dispatcher.run_until_idle(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_thread_pool_runs_work_and_survives_panics() {
        let dispatcher = ThreadPoolDispatcher::new("pool", 2, 10).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();

        dispatcher.schedule(Box::new(|| panic!("kernel bug")));
        for n in 0..10 {
            let tx = tx.clone();
            dispatcher.schedule(Box::new(move || tx.send(n).unwrap()));
        }

        let mut received: Vec<i32> = (0..10)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        received.sort_unstable();
        assert_eq!(received, (0..10).collect::<Vec<_>>());
        dispatcher.shutdown();
    }

    #[test]
    fn test_zero_threads_rejected() {
        let err = ThreadPoolDispatcher::new("empty", 0, 10).err().unwrap();
        assert_eq!(err.category(), "dispatcher");
    }

    #[test]
    fn test_registry_lookup() {
        let mut settings = KernelSettings::default();
        settings.default_dispatcher.threads = 1;
        settings
            .dispatchers
            .insert("pinned".to_string(), DispatcherSettings::pinned(3));

        let mut extra: HashMap<String, Arc<dyn Dispatcher>> = HashMap::new();
        extra.insert("manual".to_string(), Arc::new(ManualDispatcher::new("manual", 7)));

        let dispatchers = Dispatchers::from_settings(&settings, None, extra).unwrap();
        assert_eq!(dispatchers.lookup(None).unwrap().id(), DEFAULT_DISPATCHER_ID);
        assert_eq!(
            dispatchers.lookup(Some(DEFAULT_DISPATCHER_ID)).unwrap().id(),
            DEFAULT_DISPATCHER_ID
        );
        assert_eq!(dispatchers.lookup(Some("pinned")).unwrap().throughput(), 3);
        assert_eq!(dispatchers.lookup(Some("manual")).unwrap().throughput(), 7);
        assert_eq!(
            dispatchers.lookup(Some("missing")).err(),
            Some(KernelError::unknown_dispatcher("missing"))
        );
        dispatchers.shutdown_all();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tokio_dispatcher_runs_work() {
        let dispatcher = TokioDispatcher::current("tokio", 10).unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        dispatcher.schedule(Box::new(move || {
            let _ = tx.send(42);
        }));
        assert_eq!(rx.await.unwrap(), 42);
    }
}
