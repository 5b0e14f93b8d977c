//! tasklift: import markdown checklists into GitHub issues, milestones and
//! project boards.
//!
//! Section headings become milestones, checklist leaves become issues or
//! draft board items, and inline `[...]` annotations carry assignment,
//! labels, estimate points and custom board fields. Each invocation is one
//! fresh import: no diffing, no idempotence.

pub mod annotate;
pub mod github;
pub mod import;
pub mod markup;
pub mod schema;
pub mod tracker;
pub mod walk;

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};

use crate::github::GitHubClient;
use crate::import::{run_import, ImportTarget};
use crate::markup::CmarkConverter;

#[derive(Parser)]
#[clap(
    name = "tasklift",
    version,
    about = "Import markdown checklists as issues, milestones and project-board items"
)]
pub struct Cli {
    /// Raise log verbosity (repeat for more detail)
    #[clap(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create one issue per checklist leaf; section headings become milestones
    Issues {
        /// Repository owner (user or organisation)
        #[clap(long)]
        owner: String,
        /// Repository name
        #[clap(long)]
        repo: String,
        /// Project board node id; when set, issues are also placed on the board
        #[clap(long)]
        board: Option<String>,
        /// Markdown document to import; reads standard input when omitted
        #[clap(long)]
        input: Option<PathBuf>,
    },
    /// Create draft board items without repository issues
    Drafts {
        /// Project board node id
        #[clap(long)]
        board: String,
        /// Board field that receives each item's section heading
        #[clap(long = "milestone-field")]
        milestone_field: Option<String>,
        /// Markdown document to import; reads standard input when omitted
        #[clap(long)]
        input: Option<PathBuf>,
    },
}

/// Extracted async CLI logic entrypoint, shared by `main()` and tests.
pub async fn run(cli: Cli) -> Result<()> {
    let (input, target) = match cli.command {
        Commands::Issues {
            owner,
            repo,
            board,
            input,
        } => (input, ImportTarget::Issues { owner, repo, board }),
        Commands::Drafts {
            board,
            milestone_field,
            input,
        } => (
            input,
            ImportTarget::Drafts {
                board,
                milestone_field,
            },
        ),
    };

    let document = read_input(input.as_deref())?;
    let tracker = GitHubClient::new_from_env().context("failed to construct GitHub client")?;
    let converter = CmarkConverter::new();

    println!("Import starting...");
    let report = run_import(&converter, &tracker, &target, &document).await?;
    println!("Import complete.\nReport:");
    println!("{report:#?}");
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("failed to read document {}", path.display())),
        None => {
            let mut buffer = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buffer)
                .context("failed to read document from standard input")?;
            Ok(buffer)
        }
    }
}
