//! Clap derive structures for the `sunprobe` CLI.
//!
//! Kept free of workspace types so `build.rs` can include it for man pages.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// sunprobe -- read live production data from solar monitoring portals
#[derive(Debug, Parser)]
#[command(
    name = "sunprobe",
    version,
    about = "Read live solar production data from monitoring portals",
    long_about = "Reads live and historical production data from solar monitoring\n\
        portals that offer no public API.\n\n\
        Reuses a browser session cookie, probes a list of candidate endpoints\n\
        and normalizes whatever numbers it finds into power, energy, voltage,\n\
        current and efficiency.",
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
    /// Portal profile to use
    #[arg(long, short = 'p', env = "SUNPROBE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Portal base URL (overrides profile)
    #[arg(long, env = "SUNPROBE_PORTAL", global = true)]
    pub portal: Option<String>,

    /// File holding the session cookie (overrides profile)
    #[arg(long, env = "SUNPROBE_COOKIE_FILE", global = true)]
    pub cookie_file: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SUNPROBE_OUTPUT",
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

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "SUNPROBE_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "SUNPROBE_TIMEOUT", global = true)]
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
    /// YAML
    Yaml,
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
    /// Acquire one measurement snapshot
    #[command(alias = "f")]
    Fetch(FetchArgs),

    /// Acquire repeatedly and redraw on every update
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Show historical production for a day, month, year or lifetime
    #[command(alias = "hist")]
    History(HistoryArgs),

    /// Sign in with username and password and store the session cookie
    Login(LoginArgs),

    /// Manage configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  FETCH / WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Candidate endpoint paths, in probe order (overrides profile)
    #[arg(long = "endpoint", short = 'e', value_name = "PATH")]
    pub endpoints: Vec<String>,

    /// Fall back to the best partial result when nothing meaningful is found
    #[arg(long)]
    pub degraded: bool,

    /// Also list values that matched no canonical field
    #[arg(long)]
    pub all_fields: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub fetch: FetchArgs,

    /// Update interval (e.g. "5m", "90s"; overrides profile)
    #[arg(long, short = 'i', value_name = "DURATION")]
    pub interval: Option<String>,

    /// Stop after this many updates
    #[arg(long, short = 'n', value_name = "N")]
    pub count: Option<u32>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  HISTORY
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Calendar period to show
    pub period: PeriodArg,

    /// Any date inside the period (YYYY-MM-DD, default today)
    #[arg(long, short = 'd')]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PeriodArg {
    /// 15-minute values for one day
    Day,
    /// Daily values for one month
    Month,
    /// Monthly values for one year
    Year,
    /// Yearly values for the last decade
    Total,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  LOGIN
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Account name (falls back to profile, then SUNPROBE_USERNAME, then a prompt)
    #[arg(long, short = 'u')]
    pub username: Option<String>,

    /// Where to keep the session cookie
    #[arg(long, default_value = "file")]
    pub store: CookieStore,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CookieStore {
    /// The profile's cookie file
    File,
    /// The system keyring
    Keyring,
    /// Print the cookie header to stdout
    Stdout,
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
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Print the config file location
    Path,

    /// Set a configuration value on the active profile
    Set {
        /// Config key (e.g. "portal", "endpoints", "update_interval_ms")
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store the portal password or a session cookie in the system keyring
    SetPassword {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,

        /// Store a session cookie instead of the password
        #[arg(long)]
        cookie: bool,
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
