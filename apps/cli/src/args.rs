//! Command-line arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "leafsync")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(arg_required_else_help = true)]
#[command(about = "Flattens JSON documents into a path-addressed state tree")]
pub struct Cli {
    /// Configuration file (TOML, JSON or YAML). Overridden by `LEAFSYNC__*` variables.
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Less log output (-q warn, -qq error, -qqq off).
    #[arg(short, long, global = true, action = clap::ArgAction::Count, conflicts_with = "verbose")]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Synchronize a JSON document into an in-memory store and print the resulting tree
    Sync(SyncArgs),
    /// Validate an attribute catalog and list the names it defines
    Catalog {
        /// Catalog file. Defaults to `catalog` from the configuration.
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct SyncArgs {
    /// JSON document to flatten. Use `-` for stdin.
    pub input: PathBuf,

    /// Path of the device container the document is written under.
    #[arg(short, long)]
    pub parent: Option<String>,

    /// Label containers with their `name` property.
    #[arg(long)]
    pub replace_name: bool,

    /// Address child objects by their `id` property.
    #[arg(long)]
    pub replace_id: bool,

    /// Write the liveness leaf before flattening.
    #[arg(long)]
    pub online: bool,

    /// Null leaves matching this glob that were not refreshed by the document.
    #[arg(long, value_name = "PATTERN")]
    pub sweep: Option<String>,

    /// Record the running version in the warn ledger.
    #[arg(long)]
    pub announce: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn sync_flags_parse() {
        let cli = Cli::parse_from([
            "leafsync", "-vv", "sync", "data.json", "--parent", "device1", "--replace-id", "--sweep", "device1.*",
        ]);
        assert_eq!(cli.verbose, 2);
        let Command::Sync(args) = cli.command else { panic!("expected sync") };
        assert_eq!(args.input, PathBuf::from("data.json"));
        assert_eq!(args.parent.as_deref(), Some("device1"));
        assert!(args.replace_id && !args.replace_name);
        assert_eq!(args.sweep.as_deref(), Some("device1.*"));
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        assert!(Cli::try_parse_from(["leafsync", "-q", "-v", "catalog"]).is_err());
    }
}
