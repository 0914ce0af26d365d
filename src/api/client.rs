use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use super::error::{ApiError, error_message};
use crate::core::query::{TaskPage, TaskQuery};
use crate::core::task::{AuthGrant, NewTask, SignIn, SignUp, Task, TaskId, TaskPatch, User};

/// The backend surface the rest of the crate talks to.
pub trait TaskApi: Send + Sync + 'static {
    /// `POST /auth/login`
    fn sign_in(
        &self,
        credentials: &SignIn,
    ) -> impl Future<Output = Result<AuthGrant, ApiError>> + Send;

    /// `POST /auth/register`
    fn sign_up(
        &self,
        account: &SignUp,
    ) -> impl Future<Output = Result<AuthGrant, ApiError>> + Send;

    /// `GET /auth/me`
    fn current_user(&self) -> impl Future<Output = Result<User, ApiError>> + Send;

    /// `GET /tasks?search=&filter=&page=&limit=`
    fn list_tasks(
        &self,
        query: &TaskQuery,
    ) -> impl Future<Output = Result<TaskPage, ApiError>> + Send;

    /// `POST /tasks`
    fn create_task(&self, task: &NewTask) -> impl Future<Output = Result<Task, ApiError>> + Send;

    /// `PUT /tasks/:id`
    fn update_task(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> impl Future<Output = Result<Task, ApiError>> + Send;

    /// `DELETE /tasks/:id`
    fn delete_task(&self, id: &TaskId) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// Bearer token shared between the session and the HTTP client.
#[derive(Debug, Clone, Default)]
pub struct Credential(Arc<RwLock<Option<String>>>);

impl Credential {
    pub fn set(&self, token: Option<String>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn token(&self) -> Option<String> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_present(&self) -> bool {
        self.0.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: Url,
    credential: Credential,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: &str, credential: Credential) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        let http = Client::builder()
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url,
            credential,
            http,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Request without the bearer token, for the credential exchange endpoints.
    fn anonymous(&self, method: Method, url: Url) -> RequestBuilder {
        log::debug!("{} {}", method, url);
        self.http.request(method, url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let req = self.anonymous(method, url);
        match self.credential.token() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = error_message(status, &body);
        log::warn!("API error {}: {}", status, message);
        Err(ApiError::from_status(status, message))
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let resp = self.send(req).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

impl TaskApi for ApiClient {
    async fn sign_in(&self, credentials: &SignIn) -> Result<AuthGrant, ApiError> {
        let url = self.endpoint(&["auth", "login"])?;
        self.send_json(self.anonymous(Method::POST, url).json(credentials))
            .await
    }

    async fn sign_up(&self, account: &SignUp) -> Result<AuthGrant, ApiError> {
        let url = self.endpoint(&["auth", "register"])?;
        self.send_json(self.anonymous(Method::POST, url).json(account))
            .await
    }

    async fn current_user(&self) -> Result<User, ApiError> {
        let url = self.endpoint(&["auth", "me"])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    async fn list_tasks(&self, query: &TaskQuery) -> Result<TaskPage, ApiError> {
        let url = self.endpoint(&["tasks"])?;
        let req = self.request(Method::GET, url).query(&query.to_params());
        let page: TaskPage = self.send_json(req).await?;
        log::debug!(
            "Fetched page {} of {} ({} tasks, {} total)",
            query.page,
            page.total_pages,
            page.tasks.len(),
            page.total_tasks
        );
        Ok(page)
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, ApiError> {
        let url = self.endpoint(&["tasks"])?;
        self.send_json(self.request(Method::POST, url).json(task))
            .await
    }

    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, ApiError> {
        let url = self.endpoint(&["tasks", id.as_str()])?;
        self.send_json(self.request(Method::PUT, url).json(patch))
            .await
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), ApiError> {
        let url = self.endpoint(&["tasks", id.as_str()])?;
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }
}
