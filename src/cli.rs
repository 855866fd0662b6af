//! Terminal client — line commands over a locally persisted todo list.
//!
//! `TodoBoard` binds the store, the current view and the backup advisor to
//! one key-value store. `run_session` drives it from any line reader, so the
//! whole client can be exercised without a terminal.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tracing::{info, warn};

use crate::error::{CommandError, Error, StorageError, TodoError};
use crate::storage::KeyValueStore;
use crate::todos::backup::{BackupAdvisor, BackupDecision, BackupPrompt, BackupReminder};
use crate::todos::model::{NewTodo, Todo, TodoId, TodoPatch};
use crate::todos::query::{DateFilter, StatusFilter, TodoQuery, available_years};
use crate::todos::store::{IdStrategy, KvPersistence, TodoStore};
use crate::todos::transfer::{backup_file_name, export_document, import_document};

const HELP: &str = "\
Commands:
  add <title> [@YYYY-MM-DD]   add a todo, optionally dated
  toggle <id>                 mark done / not done
  edit <id> <title>           change the title
  rm <id>                     delete a todo
  clear                       delete everything
  clear-done                  delete completed todos
  filter <all|completed|pending>
  date <all|today|week|month|year|next-year>
  custom <month|-> [year|-]   filter by month and/or year
  list                        show the current view
  years                       years that have todos
  stats                       totals
  export [dir]                write a JSON backup
  import <file>               replace the list with a backup
  hide                        remember to remind about backups next start
  quit
";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add {
        title: String,
        date: Option<NaiveDate>,
    },
    Toggle(TodoId),
    Edit {
        id: TodoId,
        title: String,
    },
    Remove(TodoId),
    ClearAll,
    ClearCompleted,
    Filter(StatusFilter),
    Date(DateFilter),
    Years,
    Stats,
    List,
    Export(Option<PathBuf>),
    Import(PathBuf),
    Hide,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match verb.to_ascii_lowercase().as_str() {
            "add" => parse_add(rest),
            "toggle" | "done" => Ok(Self::Toggle(TodoId::parse(required(rest, "toggle <id>")?))),
            "edit" => {
                let (id, title) = rest
                    .split_once(char::is_whitespace)
                    .ok_or(CommandError::Usage("edit <id> <title>"))?;
                Ok(Self::Edit {
                    id: TodoId::parse(id),
                    title: title.trim().to_string(),
                })
            }
            "rm" | "delete" => Ok(Self::Remove(TodoId::parse(required(rest, "rm <id>")?))),
            "clear" => Ok(Self::ClearAll),
            "clear-done" => Ok(Self::ClearCompleted),
            "filter" => Ok(Self::Filter(
                required(rest, "filter <all|completed|pending>")?.parse()?,
            )),
            "date" => Ok(Self::Date(
                required(rest, "date <all|today|week|month|year|next-year>")?.parse()?,
            )),
            "custom" => parse_custom(rest),
            "years" => Ok(Self::Years),
            "stats" => Ok(Self::Stats),
            "list" | "ls" => Ok(Self::List),
            "export" => Ok(Self::Export((!rest.is_empty()).then(|| PathBuf::from(rest)))),
            "import" => Ok(Self::Import(PathBuf::from(required(rest, "import <file>")?))),
            "hide" => Ok(Self::Hide),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn required<'a>(rest: &'a str, usage: &'static str) -> Result<&'a str, CommandError> {
    if rest.is_empty() {
        Err(CommandError::Usage(usage))
    } else {
        Ok(rest)
    }
}

fn parse_add(rest: &str) -> Result<Command, CommandError> {
    const USAGE: &str = "add <title> [@YYYY-MM-DD]";
    let rest = required(rest, USAGE)?;
    if rest.starts_with('@') {
        return Err(CommandError::Usage(USAGE));
    }
    match rest.rsplit_once(char::is_whitespace) {
        Some((title, tail)) if tail.starts_with('@') => {
            let raw = &tail[1..];
            let date = raw
                .parse::<NaiveDate>()
                .map_err(|_| CommandError::InvalidDate(raw.to_string()))?;
            Ok(Command::Add {
                title: title.trim().to_string(),
                date: Some(date),
            })
        }
        _ => Ok(Command::Add {
            title: rest.to_string(),
            date: None,
        }),
    }
}

fn parse_custom(rest: &str) -> Result<Command, CommandError> {
    let mut parts = required(rest, "custom <month|-> [year|-]")?.split_whitespace();
    let month = parse_slot::<u32>(parts.next())?;
    let year = parse_slot::<i32>(parts.next())?;
    Ok(Command::Date(DateFilter::custom(month, year)?))
}

/// `-` or a missing slot means "not constrained".
fn parse_slot<T: FromStr>(raw: Option<&str>) -> Result<Option<T>, CommandError> {
    match raw {
        None | Some("-") => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| CommandError::InvalidNumber(s.to_string())),
    }
}

/// Locally persisted todo list plus its current view and backup state.
pub struct TodoBoard<S> {
    store: TodoStore,
    advisor: BackupAdvisor<S>,
    view: TodoQuery,
}

impl<S: KeyValueStore + Clone + 'static> TodoBoard<S> {
    /// Load the list saved in `kv`. New ids are time-plus-random tokens.
    pub fn open(kv: S) -> Result<Self, StorageError> {
        let store = TodoStore::open(KvPersistence::new(kv.clone()), IdStrategy::Token)?;
        Ok(Self {
            store,
            advisor: BackupAdvisor::new(kv),
            view: TodoQuery::default(),
        })
    }

    pub fn store(&self) -> &TodoStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TodoStore {
        &mut self.store
    }

    pub fn advisor(&self) -> &BackupAdvisor<S> {
        &self.advisor
    }

    pub fn view(&self) -> TodoQuery {
        self.view
    }

    pub fn set_status(&mut self, status: StatusFilter) {
        self.view.status = status;
    }

    /// Picking a bucket drops any custom month/year selection.
    pub fn set_date(&mut self, date: DateFilter) {
        self.view.date = date;
    }

    /// Add a todo. A chosen date becomes midnight UTC of that day.
    pub fn add(&mut self, title: &str, date: Option<NaiveDate>) -> Result<Todo, TodoError> {
        let mut new = NewTodo::new(title);
        if let Some(date) = date {
            new = new.with_created_at(date.and_time(NaiveTime::MIN).and_utc());
        }
        self.store.create(new)
    }

    pub fn visible<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<&Todo> {
        self.view.apply(self.store.list(), now)
    }

    /// Write a backup file into `dir` and stamp today's backup.
    pub async fn export_to<Tz>(&self, dir: &Path, now: &DateTime<Tz>) -> Result<PathBuf, Error>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let today = now.date_naive();
        let count = self.store.len();
        let path = dir.join(backup_file_name(now, count));
        let doc = export_document(self.store.list()).map_err(StorageError::from)?;

        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, doc).await?;
        self.advisor.record_export(today)?;

        info!(path = %path.display(), count, "Todos exported");
        Ok(path)
    }

    /// Replace the list with a backup file. Rejected files change nothing.
    pub async fn import_from(&mut self, path: &Path) -> Result<usize, Error> {
        let raw = tokio::fs::read_to_string(path).await?;
        let todos = import_document(&raw)?;
        let count = self.store.replace_all(todos)?;
        info!(path = %path.display(), count, "Todos imported");
        Ok(count)
    }
}

/// Drive a board from `input` until `quit` or end of input.
///
/// Asks about a missed backup on start and about today's backup on exit.
pub async fn run_session<S, R, W>(
    board: &mut TodoBoard<S>,
    input: R,
    out: &mut W,
    export_dir: &Path,
) -> Result<(), Error>
where
    S: KeyValueStore + Clone + 'static,
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let mut lines = input.lines();

    let decision = {
        let mut prompt = LinePrompt {
            lines: &mut lines,
            out: &mut *out,
        };
        let today = Local::now().date_naive();
        board
            .advisor()
            .on_load(&mut prompt, board.store().len(), today)
            .await?
    };
    if decision == BackupDecision::ExportRequested {
        export_and_report(board, out, export_dir).await?;
    }

    say(out, "> ").await?;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if !line.is_empty() {
            let outcome = match line.parse::<Command>() {
                Ok(Command::Quit) => break,
                Ok(command) => execute(board, command, &mut lines, out, export_dir).await,
                Err(e) => Err(Error::from(e)),
            };
            if let Err(e) = outcome {
                warn!(error = %e, "Command failed");
                say(out, &format!("error: {e}\n")).await?;
            }
        }
        say(out, "> ").await?;
    }

    let decision = {
        let mut prompt = LinePrompt {
            lines: &mut lines,
            out: &mut *out,
        };
        let today = Local::now().date_naive();
        board
            .advisor()
            .on_close(&mut prompt, board.store().len(), today)
            .await?
    };
    if decision == BackupDecision::ExportRequested {
        export_and_report(board, out, export_dir).await?;
    }
    Ok(())
}

async fn execute<S, R, W>(
    board: &mut TodoBoard<S>,
    command: Command,
    lines: &mut Lines<R>,
    out: &mut W,
    export_dir: &Path,
) -> Result<(), Error>
where
    S: KeyValueStore + Clone + 'static,
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    match command {
        Command::Add { title, date } => {
            let todo = board.add(&title, date)?;
            say(out, &format!("added {}\n", todo.id)).await?;
        }
        Command::Toggle(id) => {
            let todo = board.store_mut().toggle(&id)?;
            let state = if todo.completed { "done" } else { "reopened" };
            say(out, &format!("{state}: {}\n", todo.title)).await?;
        }
        Command::Edit { id, title } => {
            let todo = board.store_mut().update(&id, TodoPatch::title(title))?;
            say(out, &format!("updated: {}\n", todo.title)).await?;
        }
        Command::Remove(id) => {
            let title = board.store().get(&id)?.title.clone();
            if ask(lines, out, &format!("Delete \"{title}\"?")).await? {
                board.store_mut().delete(&id)?;
                say(out, "deleted\n").await?;
            }
        }
        Command::ClearAll => {
            let total = board.store().len();
            if total == 0 {
                say(out, "No todos to delete\n").await?;
            } else if ask(lines, out, &format!("Delete all {total} todo(s)?")).await? {
                let removed = board.store_mut().clear_all()?;
                say(out, &format!("{removed} todo(s) deleted\n")).await?;
            }
        }
        Command::ClearCompleted => {
            let completed = board.store().stats().completed;
            if completed == 0 {
                say(out, "No completed todos\n").await?;
            } else if ask(lines, out, &format!("Delete {completed} completed todo(s)?")).await? {
                let removed = board.store_mut().clear_completed()?;
                say(out, &format!("{removed} completed todo(s) deleted\n")).await?;
            }
        }
        Command::Filter(status) => {
            board.set_status(status);
            render(board, out).await?;
        }
        Command::Date(date) => {
            board.set_date(date);
            render(board, out).await?;
        }
        Command::Years => {
            let years = available_years(board.store().list(), &Local::now());
            let years: Vec<String> = years.iter().map(i32::to_string).collect();
            say(out, &format!("{}\n", years.join(" "))).await?;
        }
        Command::Stats => {
            let stats = board.store().stats();
            say(
                out,
                &format!(
                    "total {}, completed {}, pending {}\n",
                    stats.total, stats.completed, stats.pending
                ),
            )
            .await?;
        }
        Command::List => render(board, out).await?,
        Command::Export(dir) => {
            let dir = dir.unwrap_or_else(|| export_dir.to_path_buf());
            export_and_report(board, out, &dir).await?;
        }
        Command::Import(path) => {
            let count = board.import_from(&path).await?;
            say(out, &format!("imported {count} todo(s)\n")).await?;
        }
        Command::Hide => {
            let today = Local::now().date_naive();
            if board.advisor().on_hidden(board.store().len(), today)? {
                say(out, "no backup today; you will be reminded next start\n").await?;
            }
        }
        Command::Help => say(out, HELP).await?,
        Command::Quit => {}
    }
    Ok(())
}

async fn render<S, W>(board: &TodoBoard<S>, out: &mut W) -> Result<(), Error>
where
    S: KeyValueStore + Clone + 'static,
    W: AsyncWrite + Unpin + Send,
{
    let visible = board.visible(&Local::now());
    if visible.is_empty() {
        say(out, "No todos to show\n").await?;
        return Ok(());
    }
    let mut text = String::new();
    for todo in visible {
        let mark = if todo.completed { 'x' } else { ' ' };
        let date = todo.created_at.with_timezone(&Local).format("%Y-%m-%d");
        text.push_str(&format!("[{mark}] {:<20} {}  ({date})\n", todo.id, todo.title));
    }
    say(out, &text).await?;
    Ok(())
}

async fn export_and_report<S, W>(
    board: &TodoBoard<S>,
    out: &mut W,
    dir: &Path,
) -> Result<(), Error>
where
    S: KeyValueStore + Clone + 'static,
    W: AsyncWrite + Unpin + Send,
{
    let path = board.export_to(dir, &Local::now()).await?;
    say(
        out,
        &format!(
            "exported {} todo(s) to {}; backup done for today\n",
            board.store().len(),
            path.display()
        ),
    )
    .await?;
    Ok(())
}

/// Yes/no question on the session's own input.
struct LinePrompt<'a, R, W> {
    lines: &'a mut Lines<R>,
    out: &'a mut W,
}

#[async_trait]
impl<'a, R, W> BackupPrompt for LinePrompt<'a, R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn confirm_backup(&mut self, reminder: &BackupReminder) -> bool {
        match ask(&mut *self.lines, &mut *self.out, &reminder.message()).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "Could not read backup answer");
                false
            }
        }
    }
}

async fn ask<R, W>(lines: &mut Lines<R>, out: &mut W, question: &str) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    say(out, &format!("{question} [y/N] ")).await?;
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

async fn say<W: AsyncWrite + Unpin>(out: &mut W, text: &str) -> std::io::Result<()> {
    out.write_all(text.as_bytes()).await?;
    out.flush().await
}
