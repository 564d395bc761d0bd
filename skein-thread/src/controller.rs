use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use skein_interpret::{Interpreter, PackageConfig};

use crate::codec::{self, Portable, TaskBody};
use crate::config::ThreadConfig;
use crate::error::ThreadError;
use crate::handle::{TaskRecord, ThreadHandle};
use crate::worker;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Spawns tasks onto OS threads.
#[derive(Clone, Debug)]
pub struct Controller {
    config: Arc<ThreadConfig>,
    package: PackageConfig,
}

impl Controller {
    pub fn new(config: impl Into<Arc<ThreadConfig>>) -> Self {
        Self {
            config: config.into(),
            package: PackageConfig::default(),
        }
    }

    /// Module-search strings handed to every worker this controller spawns.
    pub fn with_package(mut self, package: PackageConfig) -> Self {
        self.package = package;
        self
    }

    /// A controller whose workers inherit `interp`'s current `package` strings.
    pub fn inheriting(config: impl Into<Arc<ThreadConfig>>, interp: &Interpreter) -> Self {
        Self::new(config).with_package(interp.package_config())
    }

    pub fn config(&self) -> &Arc<ThreadConfig> {
        &self.config
    }

    pub fn package(&self) -> &PackageConfig {
        &self.package
    }

    /// Encode `task` and `args` and start a worker thread running them.
    ///
    /// Returns as soon as the thread exists. Values that cannot be encoded
    /// fail here, before any thread is created.
    pub fn spawn(&self, task: TaskBody, args: Vec<Portable>) -> Result<ThreadHandle, ThreadError> {
        let mut tuple = Vec::with_capacity(args.len() + 1);
        tuple.push(Portable::Task(task));
        tuple.extend(args);
        let input = codec::encode(&tuple)?;

        let id = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
        let record = Arc::new(TaskRecord::new(
            id,
            input,
            self.package.clone(),
            Arc::clone(&self.config),
        ));

        let mut builder = thread::Builder::new().name(format!("{}-{id}", self.config.name_prefix));
        if let Some(size) = self.config.stack_size {
            builder = builder.stack_size(size);
        }
        let worker_record = Arc::clone(&record);
        let join = builder.spawn(move || worker::run(worker_record)).map_err(|e| {
            tracing::warn!(task = id, error = %e, "failed to create worker thread");
            ThreadError::Resource(e)
        })?;

        tracing::debug!(task = id, "spawned worker thread");
        Ok(ThreadHandle::new(record, join, self.config.drop_policy))
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(ThreadConfig::default())
    }
}

/// Hint the OS scheduler to run another thread.
pub fn yield_now() {
    thread::yield_now();
}
