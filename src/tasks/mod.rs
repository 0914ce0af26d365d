pub mod controller;
pub mod debounce;
pub mod error;

pub use controller::{ListSettings, ListView, TaskListController};
pub use error::{TaskAction, TaskActionError};
