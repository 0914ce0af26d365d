use std::fmt;

use thiserror::Error;

use crate::api::ApiError;

/// User-initiated mutation, named the way it is reported back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    Add,
    Update,
    Delete,
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add task",
            Self::Update => "update task",
            Self::Delete => "delete task",
        })
    }
}

/// Why a task mutation did not happen. The presentation decides how to show it.
#[derive(Debug, Error)]
pub enum TaskActionError {
    #[error("Task title is required")]
    EmptyTitle,
    #[error("No task is waiting for delete confirmation")]
    NothingToDelete,
    #[error("Nothing is being edited")]
    NotEditing,
    #[error("That action is already in progress")]
    Busy,
    #[error("Failed to {action}: {source}")]
    Request {
        action: TaskAction,
        #[source]
        source: ApiError,
    },
}

impl TaskActionError {
    pub(crate) fn request(action: TaskAction, source: ApiError) -> Self {
        log::warn!("Failed to {}: {}", action, source);
        Self::Request { action, source }
    }

    pub fn action(&self) -> Option<TaskAction> {
        match self {
            Self::Request { action, .. } => Some(*action),
            _ => None,
        }
    }

    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Request { source, .. } => Some(source),
            _ => None,
        }
    }
}
