//! In-memory backend for session and controller tests.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use reqwest::StatusCode;

use crate::api::{ApiError, TaskApi};
use crate::core::query::{StatusFilter, TaskPage, TaskQuery};
use crate::core::task::{AuthGrant, NewTask, SignIn, SignUp, Task, TaskId, TaskPatch, User};
use crate::session::store::{CredentialStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    SignIn(String),
    SignUp(String),
    CurrentUser,
    List(TaskQuery),
    Create(NewTask),
    Update(TaskId, TaskPatch),
    Delete(TaskId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Op {
    SignIn,
    SignUp,
    CurrentUser,
    List,
    Create,
    Update,
    Delete,
}

#[derive(Default)]
struct Backend {
    user: Option<User>,
    password: String,
    /// Newest first, the order the server lists them in.
    tasks: Vec<Task>,
    failing: HashSet<Op>,
    calls: Vec<Call>,
    next_id: u32,
}

#[derive(Default)]
pub(crate) struct FakeApi {
    inner: Mutex<Backend>,
}

pub(crate) fn user(email: &str) -> User {
    User {
        id: Some(format!("id-{}", email)),
        name: None,
        email: email.to_string(),
    }
}

pub(crate) fn task(id: &str, title: &str) -> Task {
    Task {
        id: TaskId::new(id),
        title: title.to_string(),
        description: String::new(),
        is_completed: false,
    }
}

impl FakeApi {
    pub(crate) fn signed_in(email: &str) -> Self {
        let api = Self::default();
        api.backend().user = Some(user(email));
        api
    }

    /// Seeds `count` tasks titled "Task 1".."Task N", with "Task N" listed first.
    pub(crate) fn with_tasks(self, count: u32) -> Self {
        {
            let mut backend = self.backend();
            for n in 1..=count {
                backend.tasks.insert(0, task(&format!("t{}", n), &format!("Task {}", n)));
            }
            backend.next_id = count;
        }
        self
    }

    /// Account the fake accepts at `/auth/login`.
    pub(crate) fn with_password(self, password: &str) -> Self {
        self.backend().password = password.to_string();
        self
    }

    fn backend(&self) -> std::sync::MutexGuard<'_, Backend> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn fail(&self, op: Op) {
        self.backend().failing.insert(op);
    }

    pub(crate) fn recover(&self, op: Op) {
        self.backend().failing.remove(&op);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.backend().calls.clone()
    }

    pub(crate) fn list_calls(&self) -> Vec<TaskQuery> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::List(query) => Some(query),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn clear_calls(&self) {
        self.backend().calls.clear();
    }

    fn record(&self, call: Call, op: Op) -> Result<std::sync::MutexGuard<'_, Backend>, ApiError> {
        let mut backend = self.backend();
        backend.calls.push(call);
        if backend.failing.contains(&op) {
            return Err(ApiError::from_status(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server Error".to_string(),
            ));
        }
        Ok(backend)
    }
}

fn not_found() -> ApiError {
    ApiError::from_status(StatusCode::NOT_FOUND, "Task not found".to_string())
}

fn grant(user: &User) -> AuthGrant {
    AuthGrant {
        token: format!("token-for-{}", user.email),
        user: user.clone(),
    }
}

impl TaskApi for FakeApi {
    async fn sign_in(&self, credentials: &SignIn) -> Result<AuthGrant, ApiError> {
        let backend = self.record(Call::SignIn(credentials.email.clone()), Op::SignIn)?;
        match &backend.user {
            Some(user) if user.email == credentials.email && backend.password == credentials.password => {
                Ok(grant(user))
            }
            _ => Err(ApiError::from_status(
                StatusCode::UNAUTHORIZED,
                "Invalid email or password".to_string(),
            )),
        }
    }

    async fn sign_up(&self, account: &SignUp) -> Result<AuthGrant, ApiError> {
        let mut backend = self.record(Call::SignUp(account.email.clone()), Op::SignUp)?;
        if backend.user.as_ref().is_some_and(|u| u.email == account.email) {
            return Err(ApiError::from_status(
                StatusCode::BAD_REQUEST,
                "User already exists".to_string(),
            ));
        }
        let created = User {
            id: Some(format!("id-{}", account.email)),
            name: Some(account.name.clone()),
            email: account.email.clone(),
        };
        backend.user = Some(created.clone());
        backend.password = account.password.clone();
        Ok(grant(&created))
    }

    async fn current_user(&self) -> Result<User, ApiError> {
        let backend = self.record(Call::CurrentUser, Op::CurrentUser)?;
        backend.user.clone().ok_or_else(|| {
            ApiError::from_status(StatusCode::UNAUTHORIZED, "Token is not valid".to_string())
        })
    }

    async fn list_tasks(&self, query: &TaskQuery) -> Result<TaskPage, ApiError> {
        let backend = self.record(Call::List(query.clone()), Op::List)?;
        let needle = query.search.to_lowercase();
        let matching: Vec<&Task> = backend
            .tasks
            .iter()
            .filter(|t| {
                needle.is_empty()
                    || t.title.to_lowercase().contains(&needle)
                    || t.description.to_lowercase().contains(&needle)
            })
            .filter(|t| match query.filter {
                StatusFilter::All => true,
                StatusFilter::Pending => !t.is_completed,
                StatusFilter::Completed => t.is_completed,
            })
            .collect();

        let limit = query.limit.max(1) as usize;
        let total = matching.len();
        let skip = (query.page.max(1) as usize - 1) * limit;
        Ok(TaskPage {
            tasks: matching.into_iter().skip(skip).take(limit).cloned().collect(),
            total_pages: total.div_ceil(limit) as u32,
            total_tasks: total as u64,
        })
    }

    async fn create_task(&self, new: &NewTask) -> Result<Task, ApiError> {
        let mut backend = self.record(Call::Create(new.clone()), Op::Create)?;
        backend.next_id += 1;
        let created = Task {
            id: TaskId::new(format!("t{}", backend.next_id)),
            title: new.title.clone(),
            description: new.description.clone(),
            is_completed: false,
        };
        backend.tasks.insert(0, created.clone());
        Ok(created)
    }

    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, ApiError> {
        let mut backend = self.record(Call::Update(id.clone(), patch.clone()), Op::Update)?;
        let task = backend
            .tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(not_found)?;
        if let Some(title) = &patch.title {
            task.title = title.clone();
        }
        if let Some(description) = &patch.description {
            task.description = description.clone();
        }
        if let Some(done) = patch.is_completed {
            task.is_completed = done;
        }
        Ok(task.clone())
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), ApiError> {
        let mut backend = self.record(Call::Delete(id.clone()), Op::Delete)?;
        let before = backend.tasks.len();
        backend.tasks.retain(|t| &t.id != id);
        if backend.tasks.len() == before {
            return Err(not_found());
        }
        Ok(())
    }
}

/// Store whose reads always fail, as a locked keyring would.
#[derive(Debug, Clone, Default)]
pub(crate) struct BrokenStore;

impl CredentialStore for BrokenStore {
    async fn load(&self) -> Result<Option<String>, StoreError> {
        Err(StoreError::Keyring("keyring is locked".to_string()))
    }

    async fn save(&self, _token: &str) -> Result<(), StoreError> {
        Err(StoreError::Keyring("keyring is locked".to_string()))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
