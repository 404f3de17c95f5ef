//! Clap derive structures for the `hassly` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// hassly -- Home Assistant from the command line
#[derive(Debug, Parser)]
#[command(
    name = "hassly",
    version,
    about = "Talk to Home Assistant over its WebSocket API",
    long_about = "A command-line client for Home Assistant.\n\n\
        Connects over the WebSocket API with a long-lived access token,\n\
        mirrors the device, entity, area and label registries, and streams\n\
        hub events as they happen.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Hub profile to use
    #[arg(long, short = 'p', env = "HASSLY_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Hub URL (overrides profile), e.g. http://homeassistant.local:8123
    #[arg(long, short = 'u', env = "HASSLY_URL", global = true)]
    pub url: Option<String>,

    /// Long-lived access token
    #[arg(long, env = "HASSLY_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HASSLY_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip TLS certificate verification
    #[arg(long, short = 'k', env = "HASSLY_INSECURE", global = true)]
    pub insecure: bool,

    /// Response timeout in seconds
    #[arg(long, env = "HASSLY_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream hub signals until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Show entity states
    #[command(alias = "st")]
    States(StatesArgs),

    /// Show a registry (devices, entities, areas, labels)
    #[command(alias = "reg")]
    Registry(RegistryArgs),

    /// Send a raw command and print its result
    Fetch(FetchArgs),

    /// Call a service
    Call(CallArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only show events of this type (e.g. state_changed)
    #[arg(long, short = 'e')]
    pub event_type: Option<String>,

    /// Only show state changes of this entity
    #[arg(long)]
    pub entity: Option<String>,

    /// Include heartbeat ping/pong signals
    #[arg(long)]
    pub heartbeat: bool,

    /// Exit after this many signals
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  STATES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct StatesArgs {
    /// Only show entities of this domain (e.g. light)
    #[arg(long, short = 'd')]
    pub domain: Option<String>,

    /// Only show entities on this device
    #[arg(long)]
    pub device: Option<String>,

    /// Only show entities in this area
    #[arg(long, short = 'a')]
    pub area: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  REGISTRY
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct RegistryArgs {
    /// Registry to show
    pub kind: RegistryKindArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RegistryKindArg {
    Devices,
    Entities,
    Areas,
    Labels,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  FETCH / CALL
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Command type, e.g. get_config or search/related
    pub command: String,

    /// JSON object merged into the request
    #[arg(long)]
    pub params: Option<String>,

    /// Use this request id instead of the next sequential one
    #[arg(long)]
    pub id: Option<u64>,
}

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Service domain, e.g. light
    pub domain: String,

    /// Service name, e.g. turn_on
    pub service: String,

    /// Target entity id
    #[arg(long, short = 'e')]
    pub entity: Option<String>,

    /// Service data as a JSON object
    #[arg(long)]
    pub data: Option<String>,

    /// Ask the hub for the service response
    #[arg(long)]
    pub response: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display current resolved configuration (tokens redacted)
    Show,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store an access token in the system keyring (read from stdin)
    SetToken {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
