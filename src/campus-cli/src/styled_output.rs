//! Styled status lines for the CLI.
//!
//! Everything here writes to stderr so stdout stays clean for `--json`
//! output. Colors are dropped when stderr is not a terminal or `NO_COLOR`
//! is set.

use std::io::{IsTerminal, Write};

fn colors_disabled() -> bool {
    std::env::var("NO_COLOR")
        .map(|v| !v.is_empty() && v != "0" && v.to_lowercase() != "false")
        .unwrap_or(false)
}

fn use_colors() -> bool {
    !colors_disabled() && std::io::stderr().is_terminal()
}

mod palette {
    pub const SUCCESS: &str = "\x1b[38;2;0;245;212m";
    pub const ERROR: &str = "\x1b[38;2;255;107;107m";
    pub const WARNING: &str = "\x1b[38;2;255;200;87m";
    pub const INFO: &str = "\x1b[38;2;72;202;228m";
    pub const DIM: &str = "\x1b[38;2;130;154;177m";
    pub const RESET: &str = "\x1b[0m";
}

/// Message type for styled output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Success,
    Error,
    Warning,
    Info,
    /// Secondary information
    Dim,
}

impl MessageType {
    fn icon(&self) -> &'static str {
        match self {
            MessageType::Success => "[OK]",
            MessageType::Error => "[ERROR]",
            MessageType::Warning => "[WARN]",
            MessageType::Info => "[INFO]",
            MessageType::Dim => "-",
        }
    }

    fn color(&self) -> &'static str {
        match self {
            MessageType::Success => palette::SUCCESS,
            MessageType::Error => palette::ERROR,
            MessageType::Warning => palette::WARNING,
            MessageType::Info => palette::INFO,
            MessageType::Dim => palette::DIM,
        }
    }
}

fn format_styled_with(msg_type: MessageType, message: &str, colors: bool) -> String {
    if colors {
        format!(
            "{}{} {}{}",
            msg_type.color(),
            msg_type.icon(),
            message,
            palette::RESET
        )
    } else {
        format!("{} {}", msg_type.icon(), message)
    }
}

/// Format a message the way it would be printed.
pub fn format_styled(msg_type: MessageType, message: &str) -> String {
    format_styled_with(msg_type, message, use_colors())
}

fn print_styled(msg_type: MessageType, message: &str) {
    let line = format_styled(msg_type, message);
    let _ = writeln!(std::io::stderr(), "{line}");
}

pub fn print_success(message: &str) {
    print_styled(MessageType::Success, message);
}

pub fn print_error(message: &str) {
    print_styled(MessageType::Error, message);
}

pub fn print_warning(message: &str) {
    print_styled(MessageType::Warning, message);
}

pub fn print_info(message: &str) {
    print_styled(MessageType::Info, message);
}

pub fn print_dim(message: &str) {
    print_styled(MessageType::Dim, message);
}

/// Colored label for inline use, e.g. a session status.
pub fn styled_label(msg_type: MessageType, label: &str) -> String {
    if use_colors() {
        format!("{}{}{}", msg_type.color(), label, palette::RESET)
    } else {
        label.to_string()
    }
}
