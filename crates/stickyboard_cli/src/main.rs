//! `stickyboard` command line entry point.
//!
//! # Responsibility
//! - Map subcommands onto `Board` operations for one local identity.
//! - Render results for humans or as JSON.

mod output;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use log::{info, warn};
use output::OutputMode;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use stickyboard_core::{
    init_logging_from_config, Board, BoardConfig, Caller, CategoryId, ImagePatch, NewNote,
    NoteId, NotePatch, UserId,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "stickyboard: multi-user sticky-note board", long_about = None)]
struct Cli {
    /// TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file; overrides `db_path` from the config.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Act as this user. Omit to act anonymously.
    #[arg(long, global = true)]
    user: Option<String>,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }

    fn caller(&self) -> anyhow::Result<Caller> {
        match self.user.as_deref() {
            Some(value) => Ok(Caller::user(UserId::new(value)?)),
            None => Ok(Caller::Anonymous),
        }
    }

    fn load_config(&self) -> anyhow::Result<BoardConfig> {
        let mut config = match &self.config {
            Some(path) => BoardConfig::load(path)?,
            None => BoardConfig::default(),
        };
        if let Some(db) = &self.db {
            config.db_path = db.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Seed the default categories for the user.
    Init,
    /// List categories in display order.
    Categories,
    /// List notes in storage order.
    Notes,
    /// Show notes grouped by lane.
    Board {
        /// Only show this lane (id or name).
        #[arg(long)]
        category: Option<String>,
    },
    /// Create a note, appended to its lane unless `--order` is given.
    Add {
        content: String,
        /// Target lane (id or name); defaults to the first lane.
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        order: Option<i64>,
    },
    /// Change a note's content, lane or order.
    Edit {
        note: NoteId,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        order: Option<i64>,
    },
    /// Move a note to the end of another lane.
    Mv { note: NoteId, category: String },
    /// Move a note to a position inside its lane.
    Reorder { note: NoteId, index: usize },
    /// Delete a note.
    Rm { note: NoteId },
    /// Upload an image file and attach it to a note.
    Attach {
        note: NoteId,
        file: PathBuf,
        /// Defaults to a type guessed from the file extension.
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Remove a note's image reference.
    Detach { note: NoteId },
    /// Issue a single-use upload target.
    UploadTarget,
}

impl Commands {
    /// Stable name used in `event=cli_command` log lines.
    fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Categories => "categories",
            Self::Notes => "notes",
            Self::Board { .. } => "board",
            Self::Add { .. } => "add",
            Self::Edit { .. } => "edit",
            Self::Mv { .. } => "mv",
            Self::Reorder { .. } => "reorder",
            Self::Rm { .. } => "rm",
            Self::Attach { .. } => "attach",
            Self::Detach { .. } => "detach",
            Self::UploadTarget => "upload-target",
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    if let Err(err) = init_logging_from_config(&config.logging) {
        eprintln!("warning: logging disabled: {err}");
    }

    let board = Board::open(&config)
        .with_context(|| format!("failed to open board at {}", config.db_path.display()))?;
    let caller = cli.caller()?;

    let started_at = Instant::now();
    let result = run(&cli, &board, &caller, cli.output_mode());
    match &result {
        Ok(()) => info!(
            "event=cli_command module=cli status=ok command={} duration_ms={}",
            cli.command.name(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => warn!(
            "event=cli_command module=cli status=error command={} duration_ms={} error={}",
            cli.command.name(),
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

fn run(cli: &Cli, board: &Board, caller: &Caller, mode: OutputMode) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Init => {
            let seeded = board.ensure_default_categories(caller)?;
            let categories = board.list_categories(caller)?;
            if mode.is_json() {
                let value = serde_json::json!({ "seeded": seeded, "categories": categories });
                return output::render(mode, &value, |_, _| Ok(()));
            }
            if !seeded {
                println!("already initialized");
            }
            output::render(mode, &categories, |value, w| output::categories(w, value))
        }
        Commands::Categories => {
            let categories = board.list_categories(caller)?;
            output::render(mode, &categories, |value, w| output::categories(w, value))
        }
        Commands::Notes => {
            let views = board.list_notes(caller)?;
            output::render(mode, &views, |value, w| output::note_views(w, value))
        }
        Commands::Board { category } => {
            let filter = category
                .as_deref()
                .map(|value| resolve_category(board, caller, value))
                .transpose()?;
            let snapshot = board.board(caller, filter)?;
            output::render(mode, &snapshot, |value, w| output::board(w, value))
        }
        Commands::Add {
            content,
            category,
            order,
        } => {
            let category_id = match category.as_deref() {
                Some(value) => resolve_category(board, caller, value)?,
                None => {
                    board
                        .default_lane(caller, None)?
                        .ok_or_else(|| anyhow!("no categories; run `stickyboard init` first"))?
                        .id
                }
            };
            let mut new_note = NewNote::new(category_id, content.as_str());
            new_note.order = *order;
            let note = board.create_note(caller, &new_note)?;
            output::render(mode, &note, |value, w| output::note(w, value))
        }
        Commands::Edit {
            note,
            content,
            category,
            order,
        } => {
            let patch = NotePatch {
                content: content.clone(),
                image: ImagePatch::Keep,
                category_id: category
                    .as_deref()
                    .map(|value| resolve_category(board, caller, value))
                    .transpose()?,
                order: *order,
            };
            if patch.is_empty() {
                bail!("nothing to change; pass --content, --category or --order");
            }
            let note = board.update_note(caller, *note, &patch)?;
            output::render(mode, &note, |value, w| output::note(w, value))
        }
        Commands::Mv { note, category } => {
            let target = resolve_category(board, caller, category)?;
            let note = board.move_note(caller, *note, target)?;
            output::render(mode, &note, |value, w| output::note(w, value))
        }
        Commands::Reorder { note, index } => {
            let lane = board.reorder_within_lane(caller, *note, *index)?;
            output::render(mode, &lane, |value, w| {
                value.iter().try_for_each(|note| output::note(w, note))
            })
        }
        Commands::Rm { note } => {
            let removed = board.remove_note(caller, *note)?;
            output::render(mode, &removed, |value, w| {
                writeln!(w, "removed {}", value.id)
            })
        }
        Commands::Attach {
            note,
            file,
            content_type,
        } => {
            let content_type = match content_type {
                Some(value) => value.clone(),
                None => guess_content_type(file)?.to_string(),
            };
            let bytes = fs::read(file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let note = board.attach_image(caller, *note, &content_type, &bytes)?;
            output::render(mode, &note, |value, w| output::note(w, value))
        }
        Commands::Detach { note } => {
            let note = board.detach_image(caller, *note)?;
            output::render(mode, &note, |value, w| output::note(w, value))
        }
        Commands::UploadTarget => {
            let target = board.generate_upload_target(caller)?;
            output::render(mode, &target, |value, w| output::upload_target(w, value))
        }
    }
}

/// Accepts a category id or a case-insensitive category name.
fn resolve_category(board: &Board, caller: &Caller, value: &str) -> anyhow::Result<CategoryId> {
    let categories = board.list_categories(caller)?;
    if let Ok(id) = value.parse::<CategoryId>() {
        if categories.iter().any(|category| category.id == id) {
            return Ok(id);
        }
    }
    categories
        .iter()
        .find(|category| category.name.eq_ignore_ascii_case(value.trim()))
        .map(|category| category.id)
        .ok_or_else(|| anyhow!("unknown category `{value}`"))
}

fn guess_content_type(path: &Path) -> anyhow::Result<&'static str> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => Ok("image/png"),
        Some("jpg" | "jpeg") => Ok("image/jpeg"),
        _ => bail!(
            "cannot infer content type of {}; pass --content-type",
            path.display()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_parses_after_subcommand() {
        let cli = Cli::parse_from(["stickyboard", "notes", "--json"]);
        assert!(cli.output_mode().is_json());
    }

    #[test]
    fn user_flag_builds_authenticated_caller() {
        let cli = Cli::parse_from(["stickyboard", "--user", "alice", "categories"]);
        assert!(cli.caller().unwrap().is_authenticated());

        let anonymous = Cli::parse_from(["stickyboard", "categories"]);
        assert_eq!(anonymous.caller().unwrap(), Caller::Anonymous);
    }

    #[test]
    fn add_parses_optional_lane_and_order() {
        let cli = Cli::parse_from([
            "stickyboard",
            "add",
            "buy milk",
            "--category",
            "In Progress",
            "--order",
            "3",
        ]);
        match cli.command {
            Commands::Add {
                content,
                category,
                order,
            } => {
                assert_eq!(content, "buy milk");
                assert_eq!(category.as_deref(), Some("In Progress"));
                assert_eq!(order, Some(3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn command_names_match_subcommands() {
        let cli = Cli::parse_from(["stickyboard", "upload-target"]);
        assert_eq!(cli.command.name(), "upload-target");

        let cli = Cli::parse_from(["stickyboard", "board", "--category", "To Do"]);
        assert_eq!(cli.command.name(), "board");
    }

    #[test]
    fn content_type_is_guessed_from_extension() {
        assert_eq!(guess_content_type(Path::new("a.PNG")).unwrap(), "image/png");
        assert_eq!(guess_content_type(Path::new("a.jpeg")).unwrap(), "image/jpeg");
        assert!(guess_content_type(Path::new("a.gif")).is_err());
    }

    #[test]
    fn categories_resolve_by_id_or_name() {
        let board = Board::in_memory(std::sync::Arc::new(
            stickyboard_core::MemoryBlobStore::new(),
        ))
        .unwrap();
        let caller = Caller::user(UserId::new("alice").unwrap());
        board.ensure_default_categories(&caller).unwrap();
        let categories = board.list_categories(&caller).unwrap();

        assert_eq!(
            resolve_category(&board, &caller, "completed").unwrap(),
            categories[2].id
        );
        assert_eq!(
            resolve_category(&board, &caller, &categories[1].id.to_string()).unwrap(),
            categories[1].id
        );
        assert!(resolve_category(&board, &caller, "Backlog").is_err());
    }
}
