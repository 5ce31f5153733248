use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{Args, Parser, Subcommand};
use dvc_config::{DvcConfig, IdLayout, ShardingConfig};
use dvc_core::{
    IntShardId, Permission, ShardId, ShardIdentifier, Sharder, ShortShardId, UserPermissions,
    next_version,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Layouts accepted when generating ids.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliIdLayout {
    Long,
    Short,
}

impl From<CliIdLayout> for IdLayout {
    fn from(layout: CliIdLayout) -> Self {
        match layout {
            CliIdLayout::Long => Self::Long,
            CliIdLayout::Short => Self::Short,
        }
    }
}

/// Layouts accepted when decoding ids.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliParseLayout {
    Long,
    Short,
    Int,
}

#[derive(Debug, Parser)]
#[command(name = "dvc")]
#[command(about = "Database change-version helper: version bumps, shard ids and permission codes")]
struct Cli {
    /// Print the dvc version and exit.
    #[arg(short = 'v', long = "version")]
    print_version: bool,
    /// Path to a YAML config file (default: ./.dvc.yml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter (e.g. debug, dvc_core=trace). Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the version that follows INPUT for the requested transition.
    Version(VersionArgs),
    /// Generate and decode shard ids.
    Shard(ShardArgs),
    /// Build, decode and check permission codes.
    Perm(PermArgs),
}

#[derive(Debug, Args)]
struct VersionArgs {
    /// Current version, e.g. v1.2.3, 1.2.3-rc.1 or v1.8.58-5-g98e9b2b.
    input: String,
    /// One of major, minor, patch, alpha, beta, rc, release (default: inferred).
    kind: Option<String>,
}

#[derive(Debug, Args)]
struct ShardArgs {
    #[command(subcommand)]
    operation: ShardOperation,
}

#[derive(Debug, Subcommand)]
enum ShardOperation {
    /// Generate ids from a fresh sharder.
    New(ShardNewArgs),
    /// Decode an id into its fields.
    Parse(ShardParseArgs),
    /// Build an id in the (shard, type, local id) layout.
    Int(ShardIntArgs),
}

#[derive(Debug, Args)]
struct ShardNewArgs {
    /// Number of shards (default: from config).
    #[arg(long)]
    shards: Option<u32>,
    /// Number of ids to generate.
    #[arg(long, default_value_t = 1)]
    count: u32,
    /// Place ids on the shard derived from this numeric sub-id.
    #[arg(long, conflicts_with = "key")]
    sub_id: Option<u64>,
    /// Place ids on the shard derived from hashing this key.
    #[arg(long)]
    key: Option<String>,
    /// Id layout (default: from config).
    #[arg(long)]
    layout: Option<CliIdLayout>,
}

#[derive(Debug, Args)]
struct ShardParseArgs {
    /// Raw id value.
    #[arg(allow_hyphen_values = true)]
    id: i64,
    /// Layout the id was built with.
    #[arg(long, default_value = "long")]
    layout: CliParseLayout,
}

#[derive(Debug, Args)]
struct ShardIntArgs {
    /// Shard number (0-65535).
    shard: u16,
    /// Entity type (0-1023).
    entity_type: u16,
    /// Local id within the shard (below 2^36).
    local_id: u64,
}

#[derive(Debug, Args)]
struct PermArgs {
    #[command(subcommand)]
    operation: PermOperation,
}

#[derive(Debug, Subcommand)]
enum PermOperation {
    /// Print the code for a (section, group, permission) triple.
    Build(PermBuildArgs),
    /// Print the fields of a permission code as JSON.
    Decode(PermDecodeArgs),
    /// Print the granted-set JSON for one or more codes.
    Grant(PermGrantArgs),
    /// Print whether a granted set contains a code.
    Check(PermCheckArgs),
}

#[derive(Debug, Args)]
struct PermBuildArgs {
    section: u32,
    group: u32,
    permission: u32,
}

#[derive(Debug, Args)]
struct PermDecodeArgs {
    code: Permission,
}

#[derive(Debug, Args)]
struct PermGrantArgs {
    #[arg(required = true)]
    codes: Vec<Permission>,
}

#[derive(Debug, Args)]
struct PermCheckArgs {
    /// JSON file holding a granted set (`-` reads stdin).
    #[arg(long)]
    grants: PathBuf,
    code: Permission,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if err.kind() == ErrorKind::InvalidSubcommand => {
            let name = match err.get(ContextKind::InvalidSubcommand) {
                Some(ContextValue::String(name)) => name.clone(),
                _ => String::new(),
            };
            fail(&format!("Invalid command: {name}"))
        }
        Err(err) => err.exit(),
    };

    if cli.print_version {
        println!("dvc {PACKAGE_VERSION}");
        return;
    }

    let Some(command) = cli.command else {
        fail("No command specified");
    };

    let config = match DvcConfig::read_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => fail(&format!("Failed to load config: {err}")),
    };
    init_logging(cli.log_level.as_deref(), &config.logging.level);

    let result = match command {
        Command::Version(args) => run_version(args),
        Command::Shard(args) => run_shard(args, &config),
        Command::Perm(args) => run_perm(args),
    };

    if let Err(err) = result {
        fail(&err);
    }
}

fn fail(message: &str) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

fn init_logging(cli_level: Option<&str>, config_level: &str) {
    let filter = match cli_level {
        Some(level) => EnvFilter::try_new(level),
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(config_level)),
    }
    .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// version command
// ---------------------------------------------------------------------------

fn run_version(args: VersionArgs) -> Result<(), String> {
    let kind = args.kind.unwrap_or_default();
    let next = next_version(&args.input, &kind).map_err(|e| e.to_string())?;
    debug!(input = %args.input, kind = %kind, next = %next, "computed next version");
    println!("{next}");
    Ok(())
}

// ---------------------------------------------------------------------------
// shard commands
// ---------------------------------------------------------------------------

fn run_shard(args: ShardArgs, config: &DvcConfig) -> Result<(), String> {
    match args.operation {
        ShardOperation::New(args) => run_shard_new(args, config),
        ShardOperation::Parse(args) => run_shard_parse(args),
        ShardOperation::Int(args) => run_shard_int(args),
    }
}

fn run_shard_new(args: ShardNewArgs, config: &DvcConfig) -> Result<(), String> {
    let mut sharding = config.sharding.clone();
    if let Some(shards) = args.shards {
        sharding.shards = shards;
    }
    if let Some(layout) = args.layout {
        sharding.layout = layout.into();
    }
    sharding.validate().map_err(|e| e.to_string())?;

    let ShardingConfig { shards, layout } = sharding;
    let mut sharder = Sharder::new(shards).map_err(|e| e.to_string())?;
    info!(shards, ?layout, count = args.count, "generating shard ids");

    for _ in 0..args.count {
        let value = match layout {
            IdLayout::Long => {
                let id = match (&args.key, args.sub_id) {
                    (Some(key), _) => sharder.new_from_string(key),
                    (None, Some(sub_id)) => Ok(sharder.new_from_sub_id(sub_id)),
                    (None, None) => Ok(sharder.new_round_robin()),
                };
                id.map_err(|e| e.to_string())?.value()
            }
            IdLayout::Short => {
                let id = match (&args.key, args.sub_id) {
                    (Some(key), _) => sharder.new_short_from_string(key),
                    (None, Some(sub_id)) => sharder.new_short_from_sub_id(sub_id),
                    (None, None) => sharder.new_short_round_robin(),
                };
                id.map_err(|e| e.to_string())?.value()
            }
        };
        println!("{value}");
    }
    Ok(())
}

fn run_shard_parse(args: ShardParseArgs) -> Result<(), String> {
    let decoded = match args.layout {
        CliParseLayout::Long => describe_time_id("long", &ShardId::from_raw(args.id)),
        CliParseLayout::Short => {
            let id = ShortShardId::from_raw(args.id).map_err(|e| e.to_string())?;
            describe_time_id("short", &id)
        }
        CliParseLayout::Int => {
            let id = IntShardId::from_raw(args.id);
            serde_json::json!({
                "id": id.value(),
                "layout": "int",
                "shard": id.shard(),
                "type": id.entity_type(),
                "local_id": id.local_id(),
            })
        }
    };
    print_json(&decoded)
}

fn describe_time_id(layout: &str, id: &impl ShardIdentifier) -> serde_json::Value {
    serde_json::json!({
        "id": id.value(),
        "layout": layout,
        "timestamp": id.timestamp(),
        "shard": id.shard(),
        "sequence": id.sequence(),
        "created_at": id.created_at().to_rfc3339(),
    })
}

fn run_shard_int(args: ShardIntArgs) -> Result<(), String> {
    let id = IntShardId::new(args.shard, args.entity_type, args.local_id)
        .map_err(|e| e.to_string())?;
    println!("{id}");
    Ok(())
}

// ---------------------------------------------------------------------------
// perm commands
// ---------------------------------------------------------------------------

fn run_perm(args: PermArgs) -> Result<(), String> {
    match args.operation {
        PermOperation::Build(args) => {
            let permission = Permission::new(args.section, args.group, args.permission)
                .map_err(|e| e.to_string())?;
            println!("{permission}");
            Ok(())
        }
        PermOperation::Decode(args) => print_json(&serde_json::json!({
            "code": args.code.code(),
            "section": args.code.section(),
            "group": args.code.group(),
            "permission": args.code.perm(),
        })),
        PermOperation::Grant(args) => {
            let granted: UserPermissions = args.codes.into_iter().collect();
            let raw = serde_json::to_string(&granted)
                .map_err(|e| format!("Failed to serialize permissions: {e}"))?;
            println!("{raw}");
            Ok(())
        }
        PermOperation::Check(args) => {
            let granted = read_grants(&args.grants)?;
            println!("{}", granted.has(args.code));
            Ok(())
        }
    }
}

fn read_grants(path: &Path) -> Result<UserPermissions, String> {
    let raw = if path == Path::new("-") {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .map_err(|err| format!("Failed to read stdin: {err}"))?;
        raw
    } else {
        fs::read_to_string(path)
            .map_err(|err| format!("Failed to read '{}': {err}", path.display()))?
    };
    serde_json::from_str(&raw).map_err(|err| format!("Invalid permissions JSON: {err}"))
}

fn print_json(value: &serde_json::Value) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize output: {e}"))?;
    println!("{json}");
    Ok(())
}
