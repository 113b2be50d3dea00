use anyhow::Result;
use clap::{Parser, Subcommand};
use panic_sites::commands::{
    find_panic_paths_command, import_binary_command, import_snapshot_command, init_logging,
    init_project_command, list_runs_command, list_tags_command, project_info_command,
};

/// Recover Rust panic locations from binaries without debug info.
///
/// This CLI is a thin wrapper around `panic-sites-core` (exposed in code as
/// `panic_sites_core`). All substantive logic lives in the library so it can be
/// tested thoroughly and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "panic-sites",
    version,
    about = "Recover Rust panic locations and tag the code that raises them",
    long_about = None
)]
struct Cli {
    /// Log filter used when `RUST_LOG` is not set (e.g. `info`, `debug`, `panic_sites=debug`).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a new project at the given root.
    ///
    /// This will:
    /// - Create a `.panic-sites` metadata directory.
    /// - Write a `.panic-sites/project.json` config file.
    /// - Create an empty analysis database.
    InitProject {
        /// Project root directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Optional project name. If omitted, the name is derived from the root directory.
        #[arg(long)]
        name: Option<String>,
    },

    /// Show basic information about an existing project.
    ProjectInfo {
        /// Project root directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Load a binary's target metadata and section bytes (ELF, PE or Mach-O).
    ImportBinary {
        /// Project root directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Path to the binary.
        #[arg(long)]
        path: String,

        /// Skip SHA-256 computation (stores no hash).
        #[arg(long, default_value_t = false)]
        skip_hash: bool,
    },

    /// Import analysis state (string views, types, code references) from JSON or YAML.
    ImportSnapshot {
        /// Project root directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Path to the snapshot file (`.json`, `.yaml` or `.yml`).
        #[arg(long)]
        path: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Recover panic-location records and tag every instruction referencing them.
    FindPanicPaths {
        /// Project root directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Add tags even when an identical tag already exists.
        #[arg(long, default_value_t = false)]
        no_dedup: bool,
    },

    /// List tags attached to addresses in the analysis database.
    ListTags {
        /// Project root directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Only show tags whose tag type contains this text (e.g. a source path).
        #[arg(long)]
        tag_type: Option<String>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List recorded pipeline runs.
    ListRuns {
        /// Project root directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Command::InitProject { root, name } => init_project_command(&root, name)?,
        Command::ProjectInfo { root, json } => project_info_command(&root, json)?,
        Command::ImportBinary { root, path, skip_hash } => {
            import_binary_command(&root, &path, skip_hash)?
        }
        Command::ImportSnapshot { root, path, json } => {
            import_snapshot_command(&root, &path, json)?
        }
        Command::FindPanicPaths { root, json, no_dedup } => {
            find_panic_paths_command(&root, json, no_dedup)?
        }
        Command::ListTags { root, tag_type, json } => {
            list_tags_command(&root, tag_type.as_deref(), json)?
        }
        Command::ListRuns { root, json } => list_runs_command(&root, json)?,
    }

    Ok(())
}
