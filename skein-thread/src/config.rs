use serde::{Deserialize, Serialize};

/// What happens to a handle that is dropped without `join` or `detach`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPolicy {
    /// Block until the worker finishes and log a failed outcome.
    #[default]
    Join,
    /// Let the worker run on unobserved.
    Detach,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThreadConfig {
    /// Stack size for worker threads; `None` keeps the platform default.
    pub stack_size: Option<usize>,
    pub name_prefix: String,
    pub drop_policy: DropPolicy,
    /// Capacity for `queue.new()` called without an argument.
    pub queue_capacity: usize,
    /// Call depth limit of each worker interpreter.
    pub max_call_depth: usize,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            stack_size: Some(8 * 1024 * 1024),
            name_prefix: "skein-worker".to_string(),
            drop_policy: DropPolicy::Join,
            queue_capacity: 1,
            max_call_depth: 200,
        }
    }
}
