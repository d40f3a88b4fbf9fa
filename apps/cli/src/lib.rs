//! # Leafsync CLI
//!
//! Runs the synchronization engine over a JSON document against the in-memory store.
//!
//! ```no_run
//! use leafsync_cli::{AppConfig, SyncArgs, commands};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let args = SyncArgs { input: "status.json".into(), parent: Some("device1".into()), ..SyncArgs::default() };
//! let tree = commands::sync(&AppConfig::default(), &args).await?;
//! println!("{tree:#}");
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod commands;
pub mod settings;

pub use crate::args::{Cli, Command, SyncArgs};
pub use crate::settings::{AppConfig, SettingsError, load_config};
