//! Configuration for the `dvc` command-line tool.
//!
//! The CLI reads an optional YAML file (by default `.dvc.yml` in the
//! working directory) for settings that would otherwise be repeated on
//! every invocation: the default shard count and id layout, and the log
//! level.
//!
//! # Quick start
//!
//! ```no_run
//! use dvc_config::DvcConfig;
//!
//! let config = DvcConfig::load_or_default(None).unwrap();
//! println!("sharding over {} shards", config.sharding.shards);
//! ```

mod config;
mod error;

pub use config::{DEFAULT_CONFIG_FILE, DvcConfig, IdLayout, LoggingConfig, ShardingConfig};
pub use error::{ConfigError, Result};
