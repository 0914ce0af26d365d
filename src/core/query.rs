use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::task::Task;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Completed,
}

impl StatusFilter {
    /// Value of the `filter` query parameter. `All` is sent as an empty string.
    pub fn as_query(&self) -> &'static str {
        match self {
            Self::All => "",
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::All => "all",
            Self::Pending => "pending",
            Self::Completed => "completed",
        })
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "pending" => Ok(Self::Pending),
            "completed" | "done" => Ok(Self::Completed),
            other => Err(format!("unknown status filter '{}'", other)),
        }
    }
}

/// Parameters of one `GET /tasks` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    pub search: String,
    pub filter: StatusFilter,
    /// 1-based.
    pub page: u32,
    pub limit: u32,
}

impl Default for TaskQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            filter: StatusFilter::All,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl TaskQuery {
    pub fn to_params(&self) -> [(&'static str, String); 4] {
        [
            ("search", self.search.clone()),
            ("filter", self.filter.as_query().to_string()),
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskPage {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(rename = "totalPages", default = "one")]
    pub total_pages: u32,
    #[serde(rename = "totalTasks", default)]
    pub total_tasks: u64,
}

fn one() -> u32 {
    1
}

impl Default for TaskPage {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            total_pages: 1,
            total_tasks: 0,
        }
    }
}

impl TaskPage {
    /// Last navigable page. An empty result still has page 1.
    pub fn last_page(&self) -> u32 {
        self.total_pages.max(1)
    }

    pub fn find(&self, id: &super::task::TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_query_values() {
        assert_eq!(StatusFilter::All.as_query(), "");
        assert_eq!(StatusFilter::Pending.as_query(), "pending");
        assert_eq!(StatusFilter::Completed.as_query(), "completed");
    }

    #[test]
    fn filter_parses_cli_spellings() {
        assert_eq!("All".parse::<StatusFilter>(), Ok(StatusFilter::All));
        assert_eq!("".parse::<StatusFilter>(), Ok(StatusFilter::All));
        assert_eq!("done".parse::<StatusFilter>(), Ok(StatusFilter::Completed));
        assert!("archived".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn query_params_in_wire_order() {
        let query = TaskQuery {
            search: "milk".into(),
            filter: StatusFilter::Pending,
            page: 2,
            limit: 10,
        };
        let params = query.to_params();
        assert_eq!(params[0], ("search", "milk".to_string()));
        assert_eq!(params[1], ("filter", "pending".to_string()));
        assert_eq!(params[2], ("page", "2".to_string()));
        assert_eq!(params[3], ("limit", "10".to_string()));
    }

    #[test]
    fn page_reads_backend_shape() {
        let json = r#"{"tasks":[{"_id":"a","title":"A","description":"","isCompleted":false}],"totalPages":3,"totalTasks":21}"#;
        let page: TaskPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.tasks.len(), 1);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_tasks, 21);
    }

    #[test]
    fn zero_total_pages_still_has_one_page() {
        let page: TaskPage = serde_json::from_str(r#"{"tasks":[],"totalPages":0,"totalTasks":0}"#).unwrap();
        assert_eq!(page.last_page(), 1);
    }
}
