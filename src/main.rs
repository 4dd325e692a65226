#![deny(clippy::mod_module_files)]
use std::{io::Write, path::PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use gitpub::config::GitpubConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(name = "gitpub")]
#[command(version, about = "Publish documents from a git repository to blogs and wikis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage remotes
    Remote {
        #[command(subcommand)]
        command: RemoteCommands,
    },
    /// Check out the tracking branch of a remote
    Checkout {
        remote: String,
        /// Local branch the tracking branch follows
        branch: Option<String>,
    },
    /// Map documents for publishing on the current remote
    Add {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Adapter attribute for the documents, as key=value
        #[arg(long = "docarg", value_parser = parse_docarg)]
        docargs: Vec<(String, String)>,
    },
    /// Unmap documents; the next push deletes them from the remote
    Rm {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Rename mapped documents without republishing them
    Mv {
        /// Sources followed by the destination
        #[arg(num_args = 2.., required = true)]
        paths: Vec<PathBuf>,
    },
    /// Commit document map changes on the current tracking branch
    Commit {
        #[arg(short, long)]
        message: String,
    },
    /// Import changes from a remote
    Fetch {
        remote: Option<String>,
        branch: Option<String>,
    },
    /// Publish document changes to a remote
    Push {
        remote: Option<String>,
        branch: Option<String>,
    },
    /// Merge a local branch into the current tracking branch
    Merge {
        /// Defaults to the branch the tracking branch follows
        branch: Option<String>,
        /// Only refresh content hashes from the working tree
        #[arg(long)]
        update_only: bool,
    },
    /// Show what the next push would send
    Status {
        remote: Option<String>,
        branch: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RemoteCommands {
    /// List remotes with tracking branches
    List,
    /// Add a remote, e.g. `gitpub remote add docs wiki:/srv/wiki`
    Add {
        name: String,
        spec: String,
        /// Local branch to track (defaults to the current branch)
        #[arg(long)]
        branch: Option<String>,
        /// Fetch existing remote documents after adding
        #[arg(long)]
        fetch: bool,
    },
}

fn parse_docarg(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got {:?}", arg)),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gitpub=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = GitpubConfig::load()?;
    let ctx = Context::discover(config)?;

    let stdout = std::io::stdout();
    let mut output = stdout.lock();
    run(&ctx, cli.command, &mut output)?;
    output.flush()?;
    Ok(())
}

fn run<W: Write>(ctx: &Context, command: Commands, output: &mut W) -> Result<()> {
    match command {
        Commands::Remote { command } => match command {
            RemoteCommands::List => commands::remote::list(ctx, output),
            RemoteCommands::Add {
                name,
                spec,
                branch,
                fetch,
            } => commands::remote::add(ctx, &name, &spec, branch.as_deref(), fetch, output),
        },
        Commands::Checkout { remote, branch } => {
            commands::checkout::handle(ctx, &remote, branch.as_deref(), output)
        }
        Commands::Add { paths, docargs } => commands::stage::add(ctx, &paths, &docargs, output),
        Commands::Rm { paths } => commands::stage::rm(ctx, &paths, output),
        Commands::Mv { mut paths } => {
            let dest = paths
                .pop()
                .ok_or_else(|| anyhow::anyhow!("mv needs a destination"))?;
            commands::stage::mv(ctx, &paths, &dest, output)
        }
        Commands::Commit { message } => commands::commit::handle(ctx, &message, output),
        Commands::Fetch { remote, branch } => {
            commands::sync::fetch(ctx, remote.as_deref(), branch.as_deref(), output)
        }
        Commands::Push { remote, branch } => {
            commands::sync::push(ctx, remote.as_deref(), branch.as_deref(), output)
        }
        Commands::Merge {
            branch,
            update_only,
        } => commands::sync::merge(ctx, branch.as_deref(), update_only, output),
        Commands::Status {
            remote,
            branch,
            json,
        } => commands::status::handle(ctx, remote.as_deref(), branch.as_deref(), json, output),
    }
}
