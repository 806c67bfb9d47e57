use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum FolderArgs {
    /// Create a folder
    Add {
        /// Folder name
        name: String,

        /// Free-form description
        #[clap(short, long)]
        description: Option<String>,

        /// Display color hint
        #[clap(long)]
        color: Option<String>,

        /// Parent folder id
        #[clap(short, long)]
        parent: Option<String>,
    },
    /// List folders. Without --parent, lists root folders.
    List {
        /// List children of this folder instead
        #[clap(short, long)]
        parent: Option<String>,
    },
    /// Update folder fields
    Update {
        /// Folder id
        id: String,

        /// New name
        #[clap(short, long)]
        name: Option<String>,

        /// New description
        #[clap(short, long)]
        description: Option<String>,

        /// New display color
        #[clap(long)]
        color: Option<String>,
    },
    /// Re-parent a folder. Without --parent, moves it to the root.
    Move {
        /// Folder id
        id: String,

        /// New parent folder id
        #[clap(short, long)]
        parent: Option<String>,
    },
    /// Print the chain of ancestors, root first
    Path {
        /// Folder id
        id: String,
    },
    /// Delete a folder. Entries keep their folder id; a dangling
    /// reference is tolerated.
    Delete {
        /// Folder id
        id: String,

        /// Auto confirm
        #[clap(short, long, default_value = "false")]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an entry
    Add {
        /// Entry title
        title: String,

        /// Entry body; read from stdin when omitted
        #[clap(short, long)]
        content: Option<String>,

        /// Folder id to file the entry under
        #[clap(short, long)]
        folder: Option<String>,
    },
    /// List all entries, newest first
    List {},
    /// Print one entry
    Show {
        /// Entry id
        id: String,
    },
    /// Update entry fields
    Update {
        /// Entry id
        id: String,

        /// New title
        #[clap(short, long)]
        title: Option<String>,

        /// New body
        #[clap(short, long)]
        content: Option<String>,

        /// Move into this folder
        #[clap(short, long)]
        folder: Option<String>,

        /// Clear the folder assignment
        #[clap(long, default_value = "false")]
        no_folder: bool,
    },
    /// Delete an entry
    Delete {
        /// Entry id
        id: String,

        /// Auto confirm
        #[clap(short, long, default_value = "false")]
        yes: bool,
    },
    /// Search entries by meaning
    Search {
        /// Natural-language query
        query: String,

        /// Maximum number of results (defaults to the configured limit)
        #[clap(short = 'k', long)]
        limit: Option<usize>,
    },
    /// Rebuild the semantic index over all entries
    Reindex {},
    /// Verify the backing store; with --fresh, create a new one and
    /// migrate locally-held records into it
    Init {
        /// Provision a brand-new backing store
        #[clap(long, default_value = "false")]
        fresh: bool,
    },
    /// Show backend and index status
    Status {},
    /// Manage folders
    Folder {
        #[clap(subcommand)]
        action: FolderArgs,
    },
}
