//! Command-line entry point for the block journal.
//!
//! # Responsibility
//! - Build a `JournalConfig` from flags, falling back to `JOURNAL_*`
//!   environment variables.
//! - Expose a handful of read/write commands for local inspection.
//!
//! Writes (`add`, `link`) require a database file; an in-memory store would
//! be discarded on exit.

use clap::{Args, Parser, Subcommand};
use journal_core::config::{DB_PATH_ENV, LOG_DIR_ENV, LOG_LEVEL_ENV};
use journal_core::{
    core_version, ConfigError, DotRenderer, GraphRenderer, GraphvizRenderer, Journal,
    JournalConfig, MaxDistance, SearchQuery,
};
use log::{error, info};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "journal_cli")]
#[command(author, version, about = "Inspect and edit a block journal")]
#[command(propagate_version = true)]
struct Cli {
    /// SQLite database file; in-memory when unset
    #[arg(long, global = true, env = DB_PATH_ENV)]
    db: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true, env = LOG_LEVEL_ENV)]
    log_level: Option<String>,

    /// Absolute directory for rolling log files
    #[arg(long, global = true, env = LOG_DIR_ENV)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the core library version
    Version,

    /// Create a block and print its id
    Add {
        /// Block type label, e.g. note or task
        #[arg(long = "type", default_value = "note")]
        kind: String,

        /// Use this id instead of a generated one
        #[arg(long)]
        id: Option<String>,

        /// Block content; words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        content: Vec<String>,
    },

    /// Link a child block under a parent
    Link { parent: String, child: String },

    /// Full-text search over block content
    Search {
        /// Restrict hits to one block type
        #[arg(long = "type")]
        kind: Option<String>,

        #[arg(long, default_value_t = 20)]
        limit: u32,

        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Print the graph as Graphviz DOT
    Dot(ExportArgs),

    /// Render the graph to SVG with Graphviz `dot`
    Svg {
        #[command(flatten)]
        export: ExportArgs,

        /// Graphviz executable
        #[arg(long, default_value = "dot")]
        program: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Hop limit from the start blocks; unbounded when unset
    #[arg(long)]
    depth: Option<u32>,

    /// Follow links only, not `[[name]]` references
    #[arg(long)]
    no_references: bool,

    /// Start block ids; every block when empty
    start_ids: Vec<String>,
}

impl ExportArgs {
    fn max_distance(&self) -> MaxDistance {
        self.depth.map_or(MaxDistance::Unbounded, MaxDistance::Hops)
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error");
            eprintln!("journal_cli: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Command::Version = cli.command {
        println!("journal_core version={}", core_version());
        return Ok(());
    }

    let config = config_from(&cli)?;
    if matches!(cli.command, Command::Add { .. } | Command::Link { .. }) && config.db_path.is_none()
    {
        return Err(format!("this command writes blocks; pass --db or set {DB_PATH_ENV}").into());
    }
    config.init_logging()?;
    let conn = config.open_db()?;
    let journal = Journal::try_new(&conn)?;

    match cli.command {
        Command::Version => {}
        Command::Add { kind, id, content } => {
            let id = journal.create_block(&content.join(" "), &kind, id.as_deref())?;
            info!("event=cli_command module=cli status=ok command=add block_id={id}");
            println!("{id}");
        }
        Command::Link { parent, child } => {
            if !journal.link_blocks(&parent, &child)? {
                return Err(format!("cannot link `{child}` under `{parent}`").into());
            }
            info!("event=cli_command module=cli status=ok command=link");
        }
        Command::Search { kind, limit, text } => {
            let mut query = SearchQuery::new(text.join(" "));
            query.kind = kind;
            query.limit = limit;
            for block in journal.search_blocks(&query)? {
                println!("{}\t{}\t{}", block.id, block.kind, block.content);
            }
        }
        Command::Dot(export) => print!("{}", render(&journal, &export, &DotRenderer)?),
        Command::Svg { export, program } => {
            let renderer = GraphvizRenderer {
                program,
                ..GraphvizRenderer::default()
            };
            print!("{}", render(&journal, &export, &renderer)?);
        }
    }
    Ok(())
}

/// Flags win over environment values; clap already folds `JOURNAL_*` into
/// the flags, so the lookup only consults the parsed arguments.
fn config_from(cli: &Cli) -> Result<JournalConfig, ConfigError> {
    JournalConfig::from_lookup(|name| match name {
        DB_PATH_ENV => cli.db.as_ref().map(|path| path.display().to_string()),
        LOG_LEVEL_ENV => cli.log_level.clone(),
        LOG_DIR_ENV => cli.log_dir.as_ref().map(|path| path.display().to_string()),
        _ => None,
    })
}

/// Renders the neighbourhood of the start ids, or of every block when none
/// are given.
fn render(
    journal: &Journal<'_>,
    export: &ExportArgs,
    renderer: &dyn GraphRenderer,
) -> Result<String, Box<dyn Error>> {
    let starts: Vec<String> = if export.start_ids.is_empty() {
        journal
            .list_blocks(&Default::default())?
            .into_iter()
            .map(|block| block.id)
            .collect()
    } else {
        export.start_ids.clone()
    };
    Ok(journal.get_graph_svg(
        &starts,
        export.max_distance(),
        !export.no_references,
        renderer,
    )?)
}

#[cfg(test)]
mod tests {
    use super::{config_from, run, Cli, Command};
    use clap::{CommandFactory, Parser};
    use journal_core::{open_db, Journal, MaxDistance};

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn add_parses_type_id_and_content() {
        let cli = Cli::try_parse_from([
            "journal_cli",
            "add",
            "--type",
            "task",
            "--id",
            "inbox",
            "buy",
            "milk",
        ])
        .unwrap();

        match cli.command {
            Command::Add { kind, id, content } => {
                assert_eq!(kind, "task");
                assert_eq!(id.as_deref(), Some("inbox"));
                assert_eq!(content, vec!["buy", "milk"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn export_flags_map_to_traversal_options() {
        let cli =
            Cli::try_parse_from(["journal_cli", "dot", "--depth", "2", "--no-references", "root"])
                .unwrap();

        match cli.command {
            Command::Dot(export) => {
                assert_eq!(export.max_distance(), MaxDistance::Hops(2));
                assert!(export.no_references);
                assert_eq!(export.start_ids, vec!["root"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn link_requires_both_ids() {
        assert!(Cli::try_parse_from(["journal_cli", "link", "parent"]).is_err());
    }

    #[test]
    fn flags_feed_journal_config() {
        let cli = Cli::try_parse_from([
            "journal_cli",
            "--db",
            "/tmp/journal.sqlite3",
            "--log-level",
            "WARN",
            "version",
        ])
        .unwrap();

        let config = config_from(&cli).unwrap();
        assert_eq!(
            config.db_path.as_deref(),
            Some(std::path::Path::new("/tmp/journal.sqlite3"))
        );
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn writes_without_database_file_are_refused() {
        let cli = Cli {
            db: None,
            log_level: None,
            log_dir: None,
            command: Command::Add {
                kind: "note".to_string(),
                id: None,
                content: vec!["lost".to_string()],
            },
        };

        let err = run(cli).unwrap_err();
        assert!(err.to_string().contains("--db"));
    }

    #[test]
    fn add_and_link_persist_to_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("journal.sqlite3");
        let with_db = |command: Command| Cli {
            db: Some(db.clone()),
            log_level: None,
            log_dir: None,
            command,
        };

        for id in ["parent", "child"] {
            run(with_db(Command::Add {
                kind: "note".to_string(),
                id: Some(id.to_string()),
                content: vec![id.to_string()],
            }))
            .unwrap();
        }
        run(with_db(Command::Link {
            parent: "parent".to_string(),
            child: "child".to_string(),
        }))
        .unwrap();

        let conn = open_db(&db).unwrap();
        let journal = Journal::try_new(&conn).unwrap();
        let parent = journal.get_parent("child").unwrap().unwrap();
        assert_eq!(parent.id, "parent");
    }
}
