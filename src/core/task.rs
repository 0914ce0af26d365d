use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-assigned task identifier. Opaque to the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "isCompleted", default)]
    pub is_completed: bool,
}

impl Task {
    pub fn status_label(&self) -> &'static str {
        if self.is_completed { "completed" } else { "pending" }
    }
}

/// Body of `POST /tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTask {
    pub title: String,
    pub description: String,
}

impl NewTask {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Partial body of `PUT /tasks/:id`. Absent fields are left untouched by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "isCompleted", skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
}

impl TaskPatch {
    pub fn completion(is_completed: bool) -> Self {
        Self {
            is_completed: Some(is_completed),
            ..Self::default()
        }
    }

    pub fn content(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: Some(description.into()),
            is_completed: None,
        }
    }
}

/// Profile returned by `GET /auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

/// Body of `POST /auth/login`.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SignIn {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for SignIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignIn")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body of `POST /auth/register`.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SignUp {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for SignUp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignUp")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Bearer token plus profile, as returned by sign-in and sign-up.
///
/// Accepts `{ "token", "user": {..} }` as well as the profile fields inlined next to
/// `token`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "GrantBody")]
pub struct AuthGrant {
    pub token: String,
    pub user: User,
}

impl fmt::Debug for AuthGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGrant")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GrantBody {
    Nested {
        token: String,
        user: User,
    },
    Flat {
        token: String,
        #[serde(flatten)]
        user: User,
    },
}

impl From<GrantBody> for AuthGrant {
    fn from(body: GrantBody) -> Self {
        match body {
            GrantBody::Nested { token, user } | GrantBody::Flat { token, user } => {
                Self { token, user }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_reads_nested_and_inline_profiles() {
        let nested: AuthGrant = serde_json::from_str(
            r#"{ "token": "jwt", "user": { "_id": "u1", "name": "Ada", "email": "ada@example.com" } }"#,
        )
        .unwrap();
        let inline: AuthGrant = serde_json::from_str(
            r#"{ "_id": "u1", "name": "Ada", "email": "ada@example.com", "token": "jwt" }"#,
        )
        .unwrap();
        assert_eq!(nested, inline);
        assert_eq!(nested.user.display_name(), "Ada");
        assert_eq!(nested.token, "jwt");
    }

    #[test]
    fn credentials_never_show_password() {
        let sign_in = SignIn {
            email: "ada@example.com".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{:?}", sign_in).contains("hunter2"));
        let grant = AuthGrant {
            token: "jwt-secret".into(),
            user: User {
                id: None,
                name: None,
                email: "ada@example.com".into(),
            },
        };
        assert!(!format!("{:?}", grant).contains("jwt-secret"));
    }

    #[test]
    fn task_reads_backend_shape() {
        let json = r#"{
            "_id": "65f0c0ffee",
            "title": "Write report",
            "description": "Quarterly numbers",
            "isCompleted": true,
            "user": "abc",
            "createdAt": "2024-03-12T10:00:00.000Z"
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.id, TaskId::new("65f0c0ffee"));
        assert_eq!(task.title, "Write report");
        assert!(task.is_completed);
        assert_eq!(task.status_label(), "completed");
    }

    #[test]
    fn task_without_description_defaults_to_empty() {
        let task: Task = serde_json::from_str(r#"{"_id":"1","title":"t"}"#).unwrap();
        assert_eq!(task.description, "");
        assert!(!task.is_completed);
    }

    #[test]
    fn completion_patch_only_sends_flag() {
        let body = serde_json::to_value(TaskPatch::completion(true)).unwrap();
        assert_eq!(body, serde_json::json!({ "isCompleted": true }));
    }

    #[test]
    fn content_patch_omits_completion() {
        let body = serde_json::to_value(TaskPatch::content("a", "b")).unwrap();
        assert_eq!(body, serde_json::json!({ "title": "a", "description": "b" }));
    }

    #[test]
    fn user_display_name_falls_back_to_email() {
        let user: User = serde_json::from_str(r#"{"email":"me@example.com"}"#).unwrap();
        assert_eq!(user.display_name(), "me@example.com");
    }
}
