use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "revtrack", bin_name = "revtrack", version)]
#[command(
    about = "Revision history for hand-edited text documents",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Tracked folder (defaults to the nearest folder with a .revtrack directory)
    #[arg(short, long, global = true, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output (debug logging on stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start tracking one document, or every candidate in the folder
    Init {
        /// Document to track
        file: Option<PathBuf>,
    },

    /// Watch the folder and record every save until interrupted
    Watch,

    /// Reconcile records with the documents on disk
    Sync,

    /// Report issues, and correct the fixable ones
    #[command(alias = "doctor")]
    Fix {
        /// Correct every auto-fixable issue
        #[arg(short = 'y', long)]
        yes: bool,

        /// Create missing records and snapshots, then sync
        #[arg(long)]
        repair: bool,

        /// Delete records whose document is gone
        #[arg(long)]
        remove_orphans: bool,

        /// Stop tracking a document
        #[arg(long, value_name = "FILE")]
        untrack: Option<PathBuf>,
    },

    /// Close pending saves with a revision bump
    Bump {
        /// Document to bump (all when omitted)
        file: Option<PathBuf>,

        /// Bump the major version instead
        #[arg(long)]
        major: bool,
    },

    /// Move history into archive side files
    Archive {
        /// Document to archive unconditionally (all past the threshold when omitted)
        file: Option<PathBuf>,
    },

    /// Show a document's history
    #[command(alias = "log")]
    Track {
        file: PathBuf,

        /// Show only the newest N entries
        #[arg(short, long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Compute and store per-document statistics
    Compact {
        /// Document to summarize (all when omitted)
        file: Option<PathBuf>,
    },

    /// Show tracked documents, pending saves and the watcher
    Status,

    /// List running watchers on this machine
    Watchers,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fix_flags() {
        let cli = Cli::parse_from(["revtrack", "fix", "-y", "--untrack", "a.txt"]);
        match cli.command {
            Commands::Fix {
                yes,
                repair,
                remove_orphans,
                untrack,
            } => {
                assert!(yes);
                assert!(!repair);
                assert!(!remove_orphans);
                assert_eq!(untrack, Some(PathBuf::from("a.txt")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["revtrack", "bump", "a.txt", "--major", "--json", "-d", "/x"]);
        assert!(cli.json);
        assert_eq!(cli.dir, Some(PathBuf::from("/x")));
        match cli.command {
            Commands::Bump { file, major } => {
                assert_eq!(file, Some(PathBuf::from("a.txt")));
                assert!(major);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn track_limit() {
        let cli = Cli::parse_from(["revtrack", "track", "a.txt", "--limit", "3"]);
        match cli.command {
            Commands::Track { file, limit } => {
                assert_eq!(file, PathBuf::from("a.txt"));
                assert_eq!(limit, Some(3));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
