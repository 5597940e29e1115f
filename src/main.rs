//! sprig CLI - content-addressed version control command line interface

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use sprig::object::{decode_changeset, decode_treenode};
use sprig::ops::{
    commit, diff, export, export_path, fsck, log, ls_tree, ls_tree_recursive, resolve_changeset,
    CommitOptions, ExportOptions,
};
use sprig::{get_leaves, Hash, ObjectStore, Repo, WorkingCopy};

#[derive(Parser)]
#[command(name = "sprig")]
#[command(about = "content-addressed version control for directory trees")]
#[command(version)]
struct Cli {
    /// repository path
    #[arg(short, long, env = "SPRIG_REPO", default_value = ".sprig")]
    repo: PathBuf,

    /// working directory tracked by the repository
    #[arg(short = 'C', long, default_value = ".")]
    work_tree: PathBuf,

    /// log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// initialize a new repository
    Init,

    /// show working-copy changes against the leaf
    Status,

    /// commit changes in the working copy
    Commit {
        /// commit message
        #[arg(short, long)]
        message: String,

        /// author, defaults to the configured one
        #[arg(long)]
        author: Option<String>,

        /// stage every added, modified and deleted path
        #[arg(short = 'A', long)]
        addremove: bool,

        /// commit even when nothing changed
        #[arg(long)]
        allow_empty: bool,

        /// paths to add (files, symlinks or whole directories)
        paths: Vec<PathBuf>,
    },

    /// remove tracked paths and commit the removal
    Rm {
        /// paths to remove
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// commit message
        #[arg(short, long)]
        message: String,
    },

    /// rename a path, keeping its stable ids, and commit the move
    Mv {
        from: PathBuf,
        to: PathBuf,

        /// commit message
        #[arg(short, long)]
        message: String,
    },

    /// write a changeset's tree into a directory
    Export {
        /// destination directory
        target: PathBuf,

        /// changeset, defaults to the single leaf
        #[arg(short = 'c', long)]
        changeset: Option<String>,

        /// export one file or symlink instead of the whole tree
        #[arg(long)]
        path: Option<String>,

        /// write into a non-empty target
        #[arg(short, long)]
        force: bool,
    },

    /// show history
    Log {
        /// changeset, defaults to the single leaf
        #[arg(short = 'c', long)]
        changeset: Option<String>,

        /// maximum number of changesets to show
        #[arg(short = 'n', long)]
        max_count: Option<usize>,
    },

    /// list tree contents
    LsTree {
        /// path within tree
        path: Option<String>,

        /// changeset, defaults to the single leaf
        #[arg(short = 'c', long)]
        changeset: Option<String>,

        /// list recursively
        #[arg(short, long)]
        recursive: bool,
    },

    /// show differences between two changesets
    Diff {
        from: String,

        /// defaults to the single leaf
        to: Option<String>,
    },

    /// list leaf changesets
    Leaves,

    /// show contents of an object
    CatObject {
        /// object hash
        object: String,

        /// print stored bytes without decoding
        #[arg(long)]
        raw: bool,
    },

    /// verify repository integrity
    Fsck,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: Cli) -> sprig::Result<()> {
    match cli.command {
        Commands::Init => {
            let repo = Repo::init(&cli.repo)?;
            println!("initialized sprig repository at {}", repo.path().display());
        }

        Commands::Status => {
            let repo = Repo::open(&cli.repo)?;
            let wc = WorkingCopy::new(&repo, &cli.work_tree)?;
            for entry in wc.status()? {
                println!("{}", entry);
            }
        }

        Commands::Commit {
            message,
            author,
            addremove,
            allow_empty,
            paths,
        } => {
            let repo = Repo::open(&cli.repo)?;
            let mut wc = WorkingCopy::new(&repo, &cli.work_tree)?;
            if addremove {
                wc.scan_and_addremove()?;
            }
            for path in &paths {
                wc.stage_add(path)?;
            }

            let options = CommitOptions {
                message,
                author,
                allow_empty,
            };
            let hash = commit(&mut wc, &options)?;
            println!("{}", hash);
        }

        Commands::Rm { paths, message } => {
            let repo = Repo::open(&cli.repo)?;
            let mut wc = WorkingCopy::new(&repo, &cli.work_tree)?;
            for path in &paths {
                wc.stage_remove(path)?;
            }
            let hash = commit(&mut wc, &CommitOptions::new(message))?;
            println!("{}", hash);
        }

        Commands::Mv { from, to, message } => {
            let repo = Repo::open(&cli.repo)?;
            let mut wc = WorkingCopy::new(&repo, &cli.work_tree)?;
            wc.stage_move(&from, &to)?;
            let hash = commit(&mut wc, &CommitOptions::new(message))?;
            println!("{}", hash);
        }

        Commands::Export {
            target,
            changeset,
            path,
            force,
        } => {
            let repo = Repo::open(&cli.repo)?;
            let hash = resolve_changeset(&repo, changeset.as_deref())?;

            match path {
                Some(path) => {
                    export_path(&repo, &hash, &path, &target)?;
                    println!("exported {} to {}", path, target.display());
                }
                None => {
                    let stats = export(&repo, &hash, &target, &ExportOptions { force })?;
                    println!(
                        "exported {} to {}: {} files, {} symlinks, {} directories, {} bytes",
                        hash.short(),
                        target.display(),
                        stats.files,
                        stats.symlinks,
                        stats.directories,
                        stats.bytes
                    );
                }
            }
        }

        Commands::Log {
            changeset,
            max_count,
        } => {
            let repo = Repo::open(&cli.repo)?;
            let start = resolve_changeset(&repo, changeset.as_deref())?;

            for entry in log(&repo, &start, max_count)? {
                println!("{}", entry);
            }
        }

        Commands::LsTree {
            path,
            changeset,
            recursive,
        } => {
            let repo = Repo::open(&cli.repo)?;
            let hash = resolve_changeset(&repo, changeset.as_deref())?;

            let entries = if recursive {
                ls_tree_recursive(&repo, &hash)?
            } else {
                ls_tree(&repo, &hash, path.as_deref())?
            };

            for entry in entries {
                println!("{}", entry);
            }
        }

        Commands::Diff { from, to } => {
            let repo = Repo::open(&cli.repo)?;
            let from = resolve_changeset(&repo, Some(&from))?;
            let to = resolve_changeset(&repo, to.as_deref())?;

            for change in diff(&repo, &from, &to)? {
                println!("{}", change);
            }
        }

        Commands::Leaves => {
            let repo = Repo::open(&cli.repo)?;
            for leaf in get_leaves(&repo)? {
                println!("{}", leaf);
            }
        }

        Commands::CatObject { object, raw } => {
            let repo = Repo::open(&cli.repo)?;
            let hash = Hash::from_hex(&object)?;
            let bytes = repo.store().get(&hash)?;

            if raw {
                return write_stdout(&bytes);
            }
            if let Ok(changeset) = decode_changeset(&bytes) {
                println!("root {}", changeset.root);
                for parent in &changeset.parents {
                    println!("parent {}", parent);
                }
                println!("author {}", changeset.author);
                println!("timestamp {}", changeset.timestamp);
                for (key, value) in &changeset.metadata {
                    println!("meta {} {}", key, value);
                }
                println!();
                println!("{}", changeset.message);
            } else if let Ok(node) = decode_treenode(&bytes) {
                for entry in node.entries() {
                    println!(
                        "{:<9} {} {} {}",
                        entry.entry_type.type_name(),
                        entry.hid,
                        entry.gid,
                        entry.name
                    );
                }
            } else {
                write_stdout(&bytes)?;
            }
        }

        Commands::Fsck => {
            let repo = Repo::open(&cli.repo)?;
            let report = fsck(&repo)?;

            println!("objects checked: {}", report.objects_checked);

            if !report.corrupt_objects.is_empty() {
                println!("\ncorrupt objects:");
                for obj in &report.corrupt_objects {
                    let kind = obj
                        .object_type
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "object".to_string());
                    println!("  {} {}: {}", kind, obj.hash, obj.message);
                }
            }

            if !report.missing_objects.is_empty() {
                println!("\nmissing objects:");
                for obj in &report.missing_objects {
                    println!(
                        "  {} {} (referenced by {})",
                        obj.object_type, obj.hash, obj.referenced_by
                    );
                }
            }

            if !report.dangling_objects.is_empty() {
                println!("\ndangling objects: {}", report.dangling_objects.len());
            }

            if report.is_ok() {
                println!("\nrepository is healthy");
            } else {
                println!("\nrepository has issues");
                return Err(sprig::Error::CorruptObjectMessage(
                    "repository integrity check failed".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn write_stdout(bytes: &[u8]) -> sprig::Result<()> {
    io::stdout().write_all(bytes).map_err(|e| sprig::Error::Io {
        path: "stdout".into(),
        source: e,
    })
}
