//! CLI argument structures and parsing.

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use campus_session::{AccessType, DEFAULT_HISTORY_LIMIT, StorageKind};

/// Log verbosity level for CLI output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    /// Only show errors
    Error,
    /// Show warnings and errors (default)
    #[default]
    Warn,
    /// Show informational messages, warnings, and errors
    Info,
    /// Show debug messages and above
    Debug,
    /// Show all messages including trace-level details
    Trace,
}

impl LogLevel {
    /// Convert to tracing filter string.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Parse from string (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<LogLevel> {
        match s.to_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

/// Color output mode for CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ColorMode {
    /// Automatically detect if output is a terminal
    #[default]
    Auto,
    /// Always output with colors
    Always,
    /// Never output with colors
    Never,
}

/// Campus - register your devices and record campus access.
#[derive(Parser, Debug)]
#[command(name = "campus")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Backend base URL (overrides config.toml and CAMPUS_API_BASE_URL)
    #[arg(long = "api-url", global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Where the session token is kept: keyring, encrypted-file or memory
    #[arg(long = "storage", global = true, value_name = "BACKEND")]
    pub storage: Option<StorageKind>,

    /// Print machine-readable JSON instead of text
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Enable verbose output (same as --log-level debug)
    #[arg(long = "verbose", short = 'v', global = true)]
    pub verbose: bool,

    /// Set log verbosity level (error, warn, info, debug, trace)
    #[arg(
        long = "log-level",
        short = 'L',
        global = true,
        value_enum,
        default_value = "warn"
    )]
    pub log_level: LogLevel,

    /// Control color output: auto (default), always, or never
    #[arg(long = "color", global = true, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in with email and password
    #[command(display_order = 1)]
    Login(LoginArgs),

    /// Create an account and sign in
    #[command(display_order = 2)]
    Register(RegisterArgs),

    /// Sign out and remove the stored token
    #[command(display_order = 3)]
    Logout,

    /// Show the current session
    #[command(display_order = 4, visible_alias = "whoami")]
    Status,

    /// Show or edit your profile
    #[command(display_order = 10, subcommand)]
    Profile(ProfileCommand),

    /// Change or reset your password
    #[command(display_order = 11, subcommand)]
    Password(PasswordCommand),

    /// Manage registered devices
    #[command(display_order = 20, subcommand, visible_alias = "device")]
    Devices(DeviceCommand),

    /// Record an access from scanned QR codes
    #[command(display_order = 30)]
    Scan(ScanArgs),

    /// Show access history
    #[command(display_order = 31)]
    History(HistoryArgs),
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email
    pub email: String,

    /// Password (read from stdin when omitted)
    #[arg(long, env = "CAMPUS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Account email
    pub email: String,

    /// Full name as shown on your student card
    #[arg(long = "name")]
    pub full_name: String,

    /// Student identifier
    #[arg(long = "student-id")]
    pub student_id: String,

    /// Password (read from stdin when omitted)
    #[arg(long, env = "CAMPUS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Fetch the profile from the backend
    Show,
    /// Update profile fields
    Update {
        #[arg(long = "name")]
        full_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// URL of the profile photo
        #[arg(long = "photo")]
        profile_photo: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum PasswordCommand {
    /// Change the password of the signed-in account
    Change {
        #[arg(long, env = "CAMPUS_CURRENT_PASSWORD", hide_env_values = true)]
        current: String,
        #[arg(long = "new", env = "CAMPUS_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },
    /// Ask for a password reset email
    Reset {
        email: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum DeviceCommand {
    /// List your devices
    #[command(visible_alias = "ls")]
    List,
    /// Show one device
    Show { id: Uuid },
    /// Print the QR payload of a device
    Qr { id: Uuid },
    /// Register a new device
    Add {
        #[arg(long)]
        name: String,
        /// laptop, phone, tablet...
        #[arg(long = "type")]
        device_type: String,
        #[arg(long = "serial")]
        serial_number: String,
    },
    /// Edit a device
    Update {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "type")]
        device_type: Option<String>,
        #[arg(long = "serial")]
        serial_number: Option<String>,
    },
    /// Remove a device
    #[command(visible_alias = "rm")]
    Remove { id: Uuid },
    /// Access history of a device
    History {
        id: Uuid,
        #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: u32,
    },
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Scanned QR payloads; read one per line from stdin when omitted
    pub codes: Vec<String>,

    /// Record the access as entry or exit (defaults to config)
    #[arg(long = "type", value_name = "TYPE")]
    pub access_type: Option<AccessType>,

    /// Location recorded with the access
    #[arg(long)]
    pub location: Option<String>,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
    pub limit: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Warn);
    }

    #[test]
    fn test_log_level_from_str_loose() {
        assert_eq!(LogLevel::from_str_loose("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str_loose("TrAcE"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_str_loose("verbose"), None);
        assert_eq!(LogLevel::from_str_loose(""), None);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "campus",
            "devices",
            "list",
            "--api-url",
            "https://campus.example.edu/api",
            "--storage",
            "encrypted-file",
            "-v",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Devices(DeviceCommand::List)));
        assert_eq!(cli.api_url.as_deref(), Some("https://campus.example.edu/api"));
        assert_eq!(cli.storage, Some(StorageKind::EncryptedFile));
        assert!(cli.verbose);
    }

    #[test]
    fn test_scan_arguments() {
        let cli =
            Cli::try_parse_from(["campus", "scan", "DEVICE:a", "DEVICE:b", "--type", "exit"])
                .unwrap();
        let Commands::Scan(args) = cli.command else {
            panic!("expected scan");
        };
        assert_eq!(args.codes, vec!["DEVICE:a", "DEVICE:b"]);
        assert_eq!(args.access_type, Some(AccessType::Salida));
    }

    #[test]
    fn test_history_default_limit() {
        let cli = Cli::try_parse_from(["campus", "history"]).unwrap();
        let Commands::History(args) = cli.command else {
            panic!("expected history");
        };
        assert_eq!(args.limit, 100);
    }

    #[test]
    fn test_invalid_device_id_rejected() {
        assert!(Cli::try_parse_from(["campus", "devices", "show", "not-a-uuid"]).is_err());
    }

    #[test]
    fn test_unknown_storage_rejected() {
        assert!(Cli::try_parse_from(["campus", "--storage", "floppy", "status"]).is_err());
    }
}
