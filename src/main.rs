use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use taskdeck::api::{ApiClient, Credential};
use taskdeck::config::{CredentialBackend, TaskdeckConfig};
use taskdeck::core::pagination::PageItem;
use taskdeck::core::query::StatusFilter;
use taskdeck::core::task::{SignIn, SignUp, Task, TaskId};
use taskdeck::session::Session;
use taskdeck::session::keyring::KeyringStore;
use taskdeck::session::store::{ConfiguredStore, FileStore};
use taskdeck::tasks::controller::{ListView, RefreshOutcome, SearchUpdates};
use taskdeck::tasks::{ListSettings, TaskListController};

type AppSession = Session<ConfiguredStore, ApiClient>;
type AppList = TaskListController<ApiClient>;

#[derive(Parser)]
#[command(name = "taskdeck", version, about = "Manage your tasks from the terminal")]
struct Cli {
    /// Log at debug level to the journal.
    #[arg(long, global = true)]
    debug: bool,
    /// Config file to use instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with email and password, or store an API token.
    Login {
        #[arg(long, conflicts_with = "token", required_unless_present = "token")]
        email: Option<String>,
        /// Use an existing token instead of a password.
        #[arg(long)]
        token: Option<String>,
    },
    /// Create an account and sign in to it.
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Forget the stored token.
    Logout,
    /// Show who the stored token belongs to.
    Whoami,
    /// List one page of tasks.
    List(ListArgs),
    /// Create a task.
    Add {
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Toggle completion of a task on the selected page.
    Done {
        id: String,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Change the title or description of a task on the selected page.
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Delete a task on the selected page.
    Rm {
        id: String,
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Search interactively: each input line is a search edit, `:help` lists commands.
    Watch(ListArgs),
}

#[derive(Args, Clone)]
struct ListArgs {
    #[arg(short, long, default_value = "")]
    search: String,
    #[arg(short, long, default_value = "all")]
    filter: StatusFilter,
    #[arg(short, long, default_value_t = 1)]
    page: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(TaskdeckConfig::default_path);
    let config = TaskdeckConfig::load(&config_path)?.with_env_overrides();

    init_logging(config.debug_logging || cli.debug);

    let credential = Credential::default();
    let api = Arc::new(ApiClient::new(&config.api_base_url, credential.clone())?);
    let store = match config.credential_backend {
        CredentialBackend::Keyring => ConfiguredStore::Keyring(KeyringStore::new(&config.api_base_url)),
        CredentialBackend::File => ConfiguredStore::File(FileStore::new(FileStore::default_path())),
    };
    let session = Session::new(store, api.clone(), credential);

    match cli.command {
        Command::Login { email: Some(email), .. } => {
            let password = prompt_password("Password: ").await?;
            let user = session.sign_in(&SignIn { email, password }).await?;
            println!("Signed in as {}", user.display_name());
        }
        Command::Login { token, .. } => {
            let token = token.unwrap_or_default();
            match session.login_with_token(token.trim()).await? {
                Some(user) => println!("Signed in as {}", user.display_name()),
                None => return Err("The server rejected that token".into()),
            }
        }
        Command::Signup { name, email } => {
            let password = prompt_password("Password: ").await?;
            if password.is_empty() {
                return Err("Password cannot be empty".into());
            }
            if prompt_password("Confirm password: ").await? != password {
                return Err("Passwords do not match".into());
            }
            let user = session.sign_up(&SignUp { name, email, password }).await?;
            println!("Account created, signed in as {}", user.display_name());
        }
        Command::Logout => {
            session.logout().await?;
            println!("Signed out");
        }
        command => {
            let Some(user) = session.initialize().await else {
                return Err("Not signed in. Run `taskdeck login --email <EMAIL>` first".into());
            };
            run_signed_in(command, &api, &session, &config, &user.email).await?;
        }
    }

    Ok(())
}

/// Journal logging: taskdeck at info (or debug), everything else at warn.
/// View with `journalctl --user -t taskdeck -f`.
fn init_logging(debug: bool) {
    struct FilteredJournal {
        inner: systemd_journal_logger::JournalLog,
    }

    impl log::Log for FilteredJournal {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            if metadata.target().starts_with("taskdeck") {
                let max = if taskdeck::debug_logging() { log::LevelFilter::Debug } else { log::LevelFilter::Info };
                metadata.level() <= max
            } else {
                metadata.level() <= log::LevelFilter::Warn
            }
        }
        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                self.inner.log(record);
            }
        }
        fn flush(&self) {
            self.inner.flush();
        }
    }

    taskdeck::set_debug_logging(debug);

    let journal = match systemd_journal_logger::JournalLog::new() {
        Ok(journal) => journal.with_syslog_identifier("taskdeck".to_string()),
        // No journald (container, non-Linux): run without a logger.
        Err(_) => return,
    };
    if log::set_boxed_logger(Box::new(FilteredJournal { inner: journal })).is_ok() {
        // Global max must be Debug so debug logs can pass through when toggled
        log::set_max_level(log::LevelFilter::Debug);
    }
}

async fn run_signed_in(
    command: Command,
    api: &Arc<ApiClient>,
    session: &AppSession,
    config: &TaskdeckConfig,
    email: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (list, updates) = TaskListController::new(api.clone(), session.subscribe(), ListSettings::from(config));

    match command {
        Command::Whoami => {
            println!("{}", email);
        }
        Command::List(args) => {
            open_page(&list, &args).await?;
            print_view(&list.view());
        }
        Command::Add { title, description } => {
            list.set_new_task(title, description);
            let task = list.submit_new_task().await?;
            println!("Added {}  {}", task.id, task.title);
        }
        Command::Done { id, list: args } => {
            open_page(&list, &args).await?;
            let task = find_task(&list, &id)?;
            let updated = list.toggle_completion(&task).await?;
            println!("{} is now {}", updated.title, updated.status_label());
        }
        Command::Edit { id, title, description, list: args } => {
            open_page(&list, &args).await?;
            let task = find_task(&list, &id)?;
            list.begin_edit(&task);
            list.update_edit(
                title.unwrap_or_else(|| task.title.clone()),
                description.unwrap_or_else(|| task.description.clone()),
            );
            let updated = list.save_edit_draft().await?;
            println!("Updated {}  {}", updated.id, updated.title);
        }
        Command::Rm { id, yes, list: args } => {
            open_page(&list, &args).await?;
            let task = find_task(&list, &id)?;
            list.request_delete(&task);
            if !yes && !confirm(&format!("Delete \"{}\"? This cannot be undone. [y/N] ", task.title)).await? {
                list.cancel_delete();
                println!("Kept {}", task.title);
                return Ok(());
            }
            list.confirm_delete().await?;
            println!("Deleted {}", task.title);
        }
        Command::Watch(args) => {
            open_page(&list, &args).await?;
            print_view(&list.view());
            watch(&list, updates).await?;
        }
        Command::Login { .. } | Command::Signup { .. } | Command::Logout => {}
    }

    Ok(())
}

/// Bring the list to the page the arguments describe.
async fn open_page(list: &AppList, args: &ListArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut outcome = list.apply_search(args.search.clone()).await;
    if let Some(filtered) = list.set_filter(args.filter).await {
        outcome = Some(filtered);
    }
    let outcome = match outcome {
        Some(outcome) => outcome,
        None => list.refresh().await,
    };
    if outcome == RefreshOutcome::Failed {
        return Err("Could not load tasks".into());
    }
    if args.page > 1 && list.go_to_page(args.page).await == Some(RefreshOutcome::Failed) {
        return Err("Could not load tasks".into());
    }
    Ok(())
}

fn find_task(list: &AppList, id: &str) -> Result<Task, Box<dyn std::error::Error>> {
    let view = list.view();
    view.page
        .find(&TaskId::new(id))
        .cloned()
        .ok_or_else(|| format!("No task {} on page {} of this listing", id, view.query.page).into())
}

async fn prompt_password(prompt: &'static str) -> Result<String, Box<dyn std::error::Error>> {
    let password = tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt)).await??;
    Ok(password)
}

async fn confirm(prompt: &str) -> std::io::Result<bool> {
    print!("{}", prompt);
    std::io::Write::flush(&mut std::io::stdout())?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

async fn watch(list: &AppList, mut updates: SearchUpdates) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let input = line.trim_end();
                match input.split_once(' ').unwrap_or((input, "")) {
                    (":q" | ":quit", _) => break,
                    (":n" | ":next", _) => {
                        list.next_page().await;
                        print_view(&list.view());
                    }
                    (":p" | ":prev", _) => {
                        list.previous_page().await;
                        print_view(&list.view());
                    }
                    (":f" | ":filter", value) => match value.parse::<StatusFilter>() {
                        Ok(filter) => {
                            list.set_filter(filter).await;
                            print_view(&list.view());
                        }
                        Err(e) => eprintln!("{}", e),
                    },
                    (":help", _) => {
                        println!("Type to search. :next, :prev, :filter all|pending|completed, :quit");
                    }
                    _ => list.set_search(input),
                }
            }
            Some(text) = updates.next() => {
                if list.apply_search(text).await.is_some() {
                    print_view(&list.view());
                }
            }
        }
    }
    Ok(())
}

fn print_view(view: &ListView) {
    if view.tasks().is_empty() {
        println!("No tasks found.");
    }
    for task in view.tasks() {
        let mark = if task.is_completed { 'x' } else { ' ' };
        println!("[{}] {}  {}", mark, task.id, task.title);
        if !task.description.is_empty() {
            println!("      {}", task.description);
        }
    }

    if view.show_pagination() {
        let range = view.range();
        println!();
        println!("Showing {} to {} of {} tasks", range.first, range.last, range.total);
        let buttons: Vec<String> = view
            .page_buttons()
            .into_iter()
            .map(|item| match item {
                PageItem::Page(n) if n == view.query.page => format!("[{}]", n),
                PageItem::Page(n) => n.to_string(),
                PageItem::Ellipsis => "...".to_string(),
            })
            .collect();
        println!("{}", buttons.join(" "));
    }
}
