use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "filefusion")]
#[command(about = "Organize files into folders chosen by JSON rule documents")]
#[command(version)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Base directory (default: ~/.filefusion)
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Walk source directories and relocate every file by the given rules
    Organize {
        /// Source directories followed by the destination directory
        #[arg(required = true, num_args = 2.., value_name = "SOURCE... DEST")]
        inputs: Vec<PathBuf>,

        /// Rule document identifiers, merged in order (later wins)
        #[arg(short, long, required = true, num_args = 1.., value_name = "ID")]
        method: Vec<String>,

        /// Move files instead of copying them
        #[arg(long = "move")]
        move_files: bool,

        /// Copy files (overrides relocate.mode = "move")
        #[arg(long, conflicts_with = "move_files")]
        copy: bool,

        /// Dry run (report destinations, touch nothing)
        #[arg(short, long)]
        dry_run: bool,

        /// Worker threads per source root (0 = one per CPU)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Additional names to skip (glob, e.g. --exclude='*.part')
        #[arg(long, value_name = "GLOB")]
        exclude: Vec<String>,
    },

    /// Manage rule documents
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum RulesAction {
    /// List rule documents in the rules directory
    List,

    /// Show the merged rule table
    Show {
        /// Rule document identifiers
        #[arg(required = true)]
        ids: Vec<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compile rule documents and report problems
    Check {
        /// Rule document identifiers (default: every document)
        ids: Vec<String>,
    },

    /// Copy a JSON rule document into the rules directory
    Import {
        /// Identifier to store the document under
        id: String,

        /// JSON file to import
        file: PathBuf,
    },

    /// Remove a rule document
    Remove {
        /// Rule document identifier
        id: String,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g., walk.exclude)
        key: String,
    },

    /// Set a config value
    Set {
        /// Config key (e.g., relocate.mode)
        key: String,

        /// Value to set (e.g., "move", ".git,node_modules" or "[.git, node_modules]")
        value: String,
    },

    /// List all config values
    List,

    /// Show config file path
    Path,

    /// Initialize config file with defaults
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_organize() {
        let cli = Cli::try_parse_from([
            "filefusion",
            "organize",
            "inbox",
            "downloads",
            "sorted",
            "-m",
            "media",
            "docs",
            "--move",
            "--jobs",
            "4",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Organize {
                inputs,
                method,
                move_files,
                jobs,
                ..
            }) => {
                assert_eq!(inputs.len(), 3);
                assert_eq!(inputs[2], PathBuf::from("sorted"));
                assert_eq!(method, vec!["media", "docs"]);
                assert!(move_files);
                assert_eq!(jobs, Some(4));
            }
            _ => panic!("expected organize"),
        }
    }

    #[test]
    fn test_organize_requires_method_and_destination() {
        assert!(Cli::try_parse_from(["filefusion", "organize", "inbox", "sorted"]).is_err());
        assert!(Cli::try_parse_from(["filefusion", "organize", "inbox", "-m", "media"]).is_err());
    }

    #[test]
    fn test_move_conflicts_with_copy() {
        let result = Cli::try_parse_from([
            "filefusion",
            "organize",
            "a",
            "b",
            "-m",
            "x",
            "--move",
            "--copy",
        ]);
        assert!(result.is_err());
    }
}
