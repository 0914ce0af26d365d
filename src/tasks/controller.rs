use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

use super::debounce::{DEFAULT_SEARCH_DEBOUNCE, Debounced, Debouncer};
use super::error::{TaskAction, TaskActionError};
use crate::api::{ApiError, TaskApi};
use crate::config::TaskdeckConfig;
use crate::core::pagination::{self, DEFAULT_PAGE_SIBLINGS, PageItem, RangeSummary};
use crate::core::query::{DEFAULT_PAGE_SIZE, StatusFilter, TaskPage, TaskQuery};
use crate::core::task::{NewTask, Task, TaskId, TaskPatch, User};

/// Settled search text coming out of the debouncer.
pub type SearchUpdates = Debounced<String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSettings {
    pub page_size: u32,
    pub search_debounce: Duration,
    pub page_siblings: u32,
}

impl Default for ListSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            search_debounce: DEFAULT_SEARCH_DEBOUNCE,
            page_siblings: DEFAULT_PAGE_SIBLINGS,
        }
    }
}

impl From<&TaskdeckConfig> for ListSettings {
    fn from(config: &TaskdeckConfig) -> Self {
        Self {
            page_size: config.page_size.max(1),
            search_debounce: Duration::from_millis(config.search_debounce_ms),
            page_siblings: config.page_siblings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDraft {
    pub id: TaskId,
    pub title: String,
    pub description: String,
}

/// Handle for the area of an open action menu. Presses outside it close the menu.
/// Once that menu closes the handle no longer does anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuRegion {
    pub task_id: TaskId,
    token: u64,
}

/// Identifies one list fetch. Only the newest ticket's result is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTicket {
    seq: u64,
    pub query: TaskQuery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    /// Fetch failed; the previous page is still shown.
    Failed,
    /// A newer fetch was started before this one resolved.
    Stale,
}

#[derive(Debug, Default)]
struct ListState {
    search: String,
    query: TaskQuery,
    page: TaskPage,
    loading: bool,
    refresh_seq: u64,
    new_title: String,
    new_description: String,
    adding: bool,
    editing: Option<EditDraft>,
    saving_edit: bool,
    toggling: HashSet<TaskId>,
    deleting: HashSet<TaskId>,
    open_menu: Option<MenuRegion>,
    menu_seq: u64,
    pending_delete: Option<Task>,
}

impl ListState {
    fn replace_task(&mut self, id: &TaskId, updated: Task) {
        for task in self.page.tasks.iter_mut().filter(|t| &t.id == id) {
            *task = updated.clone();
        }
    }
}

/// Query state, cached page and mutation flows behind the task list.
///
/// Cloning gives another handle to the same list.
pub struct TaskListController<A> {
    api: Arc<A>,
    session: watch::Receiver<Option<User>>,
    settings: ListSettings,
    state: Arc<Mutex<ListState>>,
    search: Arc<Mutex<Debouncer<String>>>,
}

impl<A> Clone for TaskListController<A> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            session: self.session.clone(),
            settings: self.settings.clone(),
            state: self.state.clone(),
            search: self.search.clone(),
        }
    }
}

impl<A: TaskApi> TaskListController<A> {
    /// Feed the returned updates to [`Self::apply_search`], or hand them to
    /// [`Self::pump_search`].
    pub fn new(
        api: Arc<A>,
        session: watch::Receiver<Option<User>>,
        settings: ListSettings,
    ) -> (Self, SearchUpdates) {
        let (debouncer, updates) = Debouncer::new(settings.search_debounce);
        let state = ListState {
            query: TaskQuery {
                limit: settings.page_size,
                ..TaskQuery::default()
            },
            ..ListState::default()
        };
        let controller = Self {
            api,
            session,
            settings,
            state: Arc::new(Mutex::new(state)),
            search: Arc::new(Mutex::new(debouncer)),
        };
        (controller, updates)
    }

    fn state(&self) -> MutexGuard<'_, ListState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn debouncer(&self) -> MutexGuard<'_, Debouncer<String>> {
        self.search.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn settings(&self) -> &ListSettings {
        &self.settings
    }

    pub fn is_session_active(&self) -> bool {
        self.session.borrow().is_some()
    }

    pub fn view(&self) -> ListView {
        let s = self.state();
        ListView {
            search: s.search.clone(),
            query: s.query.clone(),
            page: s.page.clone(),
            loading: s.loading,
            new_title: s.new_title.clone(),
            new_description: s.new_description.clone(),
            adding: s.adding,
            editing: s.editing.clone(),
            saving_edit: s.saving_edit,
            toggling: s.toggling.clone(),
            deleting: s.deleting.clone(),
            open_menu: s.open_menu.as_ref().map(|m| m.task_id.clone()),
            pending_delete: s.pending_delete.clone(),
            page_siblings: self.settings.page_siblings,
        }
    }

    // Fetching

    pub fn begin_refresh(&self) -> RefreshTicket {
        let mut s = self.state();
        s.refresh_seq += 1;
        s.loading = true;
        RefreshTicket {
            seq: s.refresh_seq,
            query: s.query.clone(),
        }
    }

    /// Apply a fetch result if `ticket` is still the newest one issued.
    pub fn complete_refresh(
        &self,
        ticket: RefreshTicket,
        result: Result<TaskPage, ApiError>,
    ) -> RefreshOutcome {
        let mut s = self.state();
        if ticket.seq != s.refresh_seq {
            log::debug!(
                "Discarding stale task list for page {} (fetch {} superseded by {})",
                ticket.query.page,
                ticket.seq,
                s.refresh_seq
            );
            return RefreshOutcome::Stale;
        }
        s.loading = false;
        if ticket.query != s.query {
            log::debug!("Discarding task list fetched for a query that has since changed");
            return RefreshOutcome::Stale;
        }
        match result {
            Ok(page) => {
                s.page = page;
                RefreshOutcome::Applied
            }
            Err(e) => {
                log::error!("Failed to fetch tasks: {}", e);
                RefreshOutcome::Failed
            }
        }
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        let ticket = self.begin_refresh();
        let result = self.api.list_tasks(&ticket.query).await;
        self.complete_refresh(ticket, result)
    }

    /// Refresh, but only while someone is signed in.
    async fn trigger(&self) -> Option<RefreshOutcome> {
        if !self.is_session_active() {
            log::debug!("No active session, skipping task fetch");
            return None;
        }
        Some(self.refresh().await)
    }

    /// Track the session: fetch when a user signs in, drop everything when they sign
    /// out or a different user takes over. Returns when the session is dropped.
    pub async fn follow_session(&self) {
        let mut session = self.session.clone();
        let mut current: Option<(Option<String>, String)> = None;
        loop {
            let identity = session
                .borrow_and_update()
                .as_ref()
                .map(|user| (user.id.clone(), user.email.clone()));
            match identity {
                Some(identity) => {
                    if current.as_ref().is_some_and(|previous| previous != &identity) {
                        log::info!("Signed-in user changed, clearing task list");
                        self.reset();
                    }
                    current = Some(identity);
                    self.refresh().await;
                }
                None => {
                    current = None;
                    self.reset();
                }
            }
            if session.changed().await.is_err() {
                break;
            }
        }
    }

    fn reset(&self) {
        let mut s = self.state();
        // Keep counters moving so in-flight fetches and old menu regions stay stale.
        let refresh_seq = s.refresh_seq + 1;
        let menu_seq = s.menu_seq;
        *s = ListState {
            query: TaskQuery {
                limit: self.settings.page_size,
                ..TaskQuery::default()
            },
            refresh_seq,
            menu_seq,
            ..ListState::default()
        };
        self.debouncer().cancel();
    }

    // Query parameters

    /// Record a keystroke in the search box. Nothing is fetched until the text settles.
    pub fn set_search(&self, raw: impl Into<String>) {
        let raw = raw.into();
        self.state().search = raw.clone();
        self.debouncer().push(raw);
    }

    /// Apply settled search text. A change resets to page 1 and fetches once.
    pub async fn apply_search(&self, text: String) -> Option<RefreshOutcome> {
        {
            let mut s = self.state();
            if s.query.search == text {
                return None;
            }
            log::debug!("Search changed to {:?}", text);
            s.query.search = text;
            s.query.page = 1;
        }
        self.trigger().await
    }

    /// Feed settled search text into the list for as long as the controller lives.
    pub async fn pump_search(&self, mut updates: SearchUpdates) {
        while let Some(text) = updates.next().await {
            self.apply_search(text).await;
        }
    }

    pub async fn set_filter(&self, filter: StatusFilter) -> Option<RefreshOutcome> {
        {
            let mut s = self.state();
            if s.query.filter == filter {
                return None;
            }
            log::debug!("Filter changed to {}", filter);
            s.query.filter = filter;
            s.query.page = 1;
        }
        self.trigger().await
    }

    /// Jump to a page, clamped to the pages the last fetch reported.
    pub async fn go_to_page(&self, page: u32) -> Option<RefreshOutcome> {
        {
            let mut s = self.state();
            let page = pagination::clamp_page(page, s.page.last_page());
            if s.query.page == page {
                return None;
            }
            s.query.page = page;
        }
        self.trigger().await
    }

    pub async fn previous_page(&self) -> Option<RefreshOutcome> {
        let target = pagination::previous_page(self.state().query.page);
        self.go_to_page(target).await
    }

    pub async fn next_page(&self) -> Option<RefreshOutcome> {
        let target = {
            let s = self.state();
            pagination::next_page(s.query.page, s.page.last_page())
        };
        self.go_to_page(target).await
    }

    // Creating

    pub fn set_new_task(&self, title: impl Into<String>, description: impl Into<String>) {
        let mut s = self.state();
        s.new_title = title.into();
        s.new_description = description.into();
    }

    /// Submit the new-task form.
    pub async fn submit_new_task(&self) -> Result<Task, TaskActionError> {
        let (title, description) = {
            let s = self.state();
            (s.new_title.clone(), s.new_description.clone())
        };
        self.create(&title, &description).await
    }

    /// Create a task and put the server's copy at the top of the current page.
    /// Totals are left as they are until the next fetch.
    pub async fn create(&self, title: &str, description: &str) -> Result<Task, TaskActionError> {
        if title.trim().is_empty() {
            return Err(TaskActionError::EmptyTitle);
        }
        {
            let mut s = self.state();
            if s.adding {
                return Err(TaskActionError::Busy);
            }
            s.adding = true;
        }

        let result = self.api.create_task(&NewTask::new(title, description)).await;

        let mut s = self.state();
        s.adding = false;
        match result {
            Ok(task) => {
                log::info!("Created task {}", task.id);
                s.page.tasks.insert(0, task.clone());
                s.new_title.clear();
                s.new_description.clear();
                Ok(task)
            }
            Err(e) => Err(TaskActionError::request(TaskAction::Add, e)),
        }
    }

    // Updating

    /// Flip completion of one task. Only that task's row is marked busy.
    pub async fn toggle_completion(&self, task: &Task) -> Result<Task, TaskActionError> {
        {
            let mut s = self.state();
            if !s.toggling.insert(task.id.clone()) {
                return Err(TaskActionError::Busy);
            }
            s.open_menu = None;
        }

        let patch = TaskPatch::completion(!task.is_completed);
        let result = self.api.update_task(&task.id, &patch).await;

        let mut s = self.state();
        s.toggling.remove(&task.id);
        match result {
            Ok(updated) => {
                log::debug!("Task {} is now {}", task.id, updated.status_label());
                s.replace_task(&task.id, updated.clone());
                Ok(updated)
            }
            Err(e) => Err(TaskActionError::request(TaskAction::Update, e)),
        }
    }

    pub fn begin_edit(&self, task: &Task) {
        let mut s = self.state();
        s.editing = Some(EditDraft {
            id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
        });
        s.open_menu = None;
    }

    pub fn update_edit(&self, title: impl Into<String>, description: impl Into<String>) {
        if let Some(draft) = self.state().editing.as_mut() {
            draft.title = title.into();
            draft.description = description.into();
        }
    }

    /// Leave edit mode. Refused while a save is in flight.
    pub fn cancel_edit(&self) -> bool {
        let mut s = self.state();
        if s.saving_edit {
            return false;
        }
        s.editing = None;
        true
    }

    /// Save the edit draft.
    pub async fn save_edit_draft(&self) -> Result<Task, TaskActionError> {
        let draft = self
            .state()
            .editing
            .clone()
            .ok_or(TaskActionError::NotEditing)?;
        self.save_edit(&draft.id, &draft.title, &draft.description)
            .await
    }

    /// Send edited fields. On failure edit mode stays open so the user can retry.
    pub async fn save_edit(
        &self,
        id: &TaskId,
        title: &str,
        description: &str,
    ) -> Result<Task, TaskActionError> {
        if title.trim().is_empty() {
            return Err(TaskActionError::EmptyTitle);
        }
        {
            let mut s = self.state();
            if s.saving_edit {
                return Err(TaskActionError::Busy);
            }
            s.saving_edit = true;
        }

        let result = self
            .api
            .update_task(id, &TaskPatch::content(title, description))
            .await;

        let mut s = self.state();
        s.saving_edit = false;
        match result {
            Ok(updated) => {
                log::info!("Updated task {}", id);
                s.replace_task(id, updated.clone());
                if s.editing.as_ref().is_some_and(|d| &d.id == id) {
                    s.editing = None;
                }
                Ok(updated)
            }
            Err(e) => Err(TaskActionError::request(TaskAction::Update, e)),
        }
    }

    // Deleting

    pub fn request_delete(&self, task: &Task) {
        let mut s = self.state();
        s.pending_delete = Some(task.clone());
        s.open_menu = None;
    }

    pub fn cancel_delete(&self) {
        self.state().pending_delete = None;
    }

    /// Delete the task awaiting confirmation.
    ///
    /// If that empties a page past the first, the list steps back one page and
    /// fetches it.
    pub async fn confirm_delete(&self) -> Result<TaskId, TaskActionError> {
        let task = {
            let mut s = self.state();
            let task = s
                .pending_delete
                .clone()
                .ok_or(TaskActionError::NothingToDelete)?;
            if !s.deleting.insert(task.id.clone()) {
                return Err(TaskActionError::Busy);
            }
            task
        };

        let result = self.api.delete_task(&task.id).await;

        let step_back = {
            let mut s = self.state();
            s.deleting.remove(&task.id);
            if s.pending_delete.as_ref().is_some_and(|t| t.id == task.id) {
                s.pending_delete = None;
            }
            if let Err(e) = result {
                return Err(TaskActionError::request(TaskAction::Delete, e));
            }
            log::info!("Deleted task {}", task.id);
            s.page.tasks.retain(|t| t.id != task.id);
            if s.page.tasks.is_empty() && s.query.page > 1 {
                s.query.page -= 1;
                true
            } else {
                false
            }
        };

        if step_back {
            self.trigger().await;
        }
        Ok(task.id)
    }

    // Action menu

    /// Open the action menu for `id`, closing any other. Toggling the open one closes it.
    pub fn toggle_menu(&self, id: &TaskId) -> Option<MenuRegion> {
        let mut s = self.state();
        if s.open_menu.as_ref().is_some_and(|m| &m.task_id == id) {
            s.open_menu = None;
            return None;
        }
        s.menu_seq += 1;
        let region = MenuRegion {
            task_id: id.clone(),
            token: s.menu_seq,
        };
        s.open_menu = Some(region.clone());
        Some(region)
    }

    /// Report a pointer press while `region` is registered.
    /// Returns true if the press closed the menu.
    pub fn dismiss_menu(&self, region: &MenuRegion, inside: bool) -> bool {
        if inside {
            return false;
        }
        let mut s = self.state();
        if s.open_menu.as_ref() == Some(region) {
            s.open_menu = None;
            true
        } else {
            false
        }
    }

    pub fn is_registered(&self, region: &MenuRegion) -> bool {
        self.state().open_menu.as_ref() == Some(region)
    }

    pub fn close_menu(&self) {
        self.state().open_menu = None;
    }
}

/// Which controls of one row are usable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowState {
    pub toggling: bool,
    pub deleting: bool,
    pub editing: bool,
    pub menu_open: bool,
}

impl RowState {
    pub fn can_open_menu(&self) -> bool {
        !self.toggling && !self.deleting
    }

    pub fn can_toggle(&self) -> bool {
        !self.toggling
    }

    pub fn can_edit(&self) -> bool {
        !self.toggling && !self.deleting
    }

    pub fn can_delete(&self) -> bool {
        !self.deleting
    }
}

/// Snapshot of everything the presentation renders.
#[derive(Debug, Clone)]
pub struct ListView {
    /// Raw search box contents, possibly not yet applied.
    pub search: String,
    pub query: TaskQuery,
    pub page: TaskPage,
    pub loading: bool,
    pub new_title: String,
    pub new_description: String,
    pub adding: bool,
    pub editing: Option<EditDraft>,
    pub saving_edit: bool,
    pub toggling: HashSet<TaskId>,
    pub deleting: HashSet<TaskId>,
    pub open_menu: Option<TaskId>,
    pub pending_delete: Option<Task>,
    page_siblings: u32,
}

impl ListView {
    pub fn tasks(&self) -> &[Task] {
        &self.page.tasks
    }

    pub fn has_previous(&self) -> bool {
        self.query.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.query.page < self.page.last_page()
    }

    pub fn show_pagination(&self) -> bool {
        self.page.total_pages > 1
    }

    pub fn page_buttons(&self) -> Vec<PageItem> {
        pagination::page_buttons(self.page.total_pages, self.query.page, self.page_siblings)
    }

    pub fn range(&self) -> RangeSummary {
        RangeSummary::new(
            self.query.page,
            self.query.limit,
            self.page.tasks.len(),
            self.page.total_tasks,
        )
    }

    pub fn row_state(&self, id: &TaskId) -> RowState {
        RowState {
            toggling: self.toggling.contains(id),
            deleting: self.deleting.contains(id),
            editing: self.editing.as_ref().is_some_and(|d| &d.id == id),
            menu_open: self.open_menu.as_ref() == Some(id),
        }
    }
}
