//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum, ValueHint};

use crate::domain::LineageKey;

/// Phylogenetic tree of taxa with data files pinned to its nodes
#[derive(Parser, Debug)]
#[command(name = "taxlink")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug level, repeat for more (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Home directory holding the .data store (overrides TAXLINK_HOME)
    #[arg(long, global = true, value_hint = ValueHint::DirPath)]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch lineages for taxon ids and merge them into the tree
    Insert {
        /// Taxon ids
        #[arg(required = true)]
        ids: Vec<String>,
        /// Fail on lineage conflicts instead of keeping existing ancestry
        #[arg(long)]
        strict: bool,
    },

    /// Pin a data file to a taxon, inserting its lineage when needed
    Add {
        /// Data file
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Taxon id
        #[arg(short = 'i', long = "taxon-id", conflicts_with = "name", required_unless_present = "name")]
        taxon_id: Option<String>,
        /// Scientific name, resolved through the taxonomy
        #[arg(short, long)]
        name: Option<String>,
        /// Tags as key=value, repeatable
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// Link method: s(ymlink), l (hardlink), c(opy), m(ove)
        #[arg(short = 'm', long = "method")]
        method: Option<String>,
        /// Fail on lineage conflicts instead of keeping existing ancestry
        #[arg(long)]
        strict: bool,
    },

    /// Print the tree
    Tree {
        /// Depth-indented names instead of box drawing
        #[arg(long)]
        flat: bool,
    },

    /// Print the root-first lineage of a taxon in the tree
    Lineage {
        /// Taxon id
        id: String,
        /// Label each entry by id or by name
        #[arg(long, value_enum, default_value_t = LineageBy::Name)]
        by: LineageBy,
    },

    /// Show home, tree and store status
    Info,

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Print the global config file location
    Path,
    /// Create the global config file from a template
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineageBy {
    Id,
    Name,
}

impl From<LineageBy> for LineageKey {
    fn from(by: LineageBy) -> Self {
        match by {
            LineageBy::Id => LineageKey::Id,
            LineageBy::Name => LineageKey::Name,
        }
    }
}
