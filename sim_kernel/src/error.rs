//! Simulated kernel errors

use core_types::TaskId;
use nsproxy::NsError;
use thiserror::Error;

/// Errors returned by [`crate::SimulatedKernel`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Task has exited: {0}")]
    TaskExited(TaskId),

    #[error("Task is still running: {0}")]
    TaskRunning(TaskId),

    #[error(transparent)]
    Namespace(#[from] NsError),
}

/// Errors loading a [`crate::KernelConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
