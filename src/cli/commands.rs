use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Main CLI structure for the meeting-watcher application
/// Uses clap's derive macros for automatic CLI generation
#[derive(Parser)]
#[command(author = "Kaipo Chen")]
#[command(version)] // Automatically uses version from Cargo.toml
#[command(about = "Meeting Watcher - detect active Teams, WebEx and Zoom calls from network traffic")]
#[command(long_about = "Meeting Watcher captures IPv4 traffic on the host's interface, recognises the UDP media \
streams of known meeting platforms and reports when a meeting starts and ends. Each transition switches an \
on-air indicator and is appended to a session log. Capture needs elevated privileges (root, CAP_NET_RAW or \
Administrator).")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands for the meeting-watcher application
#[derive(Subcommand)]
pub enum Commands {
    /// Capture traffic and report meetings until interrupted
    #[command(about = "Watch network traffic for active meetings")]
    #[command(long_about = "Starts promiscuous capture on the local IPv4 interface and runs the meeting \
classifier. A status line is printed on every check interval; meeting starts and ends drive the indicator \
and are written to the session log. Press Ctrl+C to stop.\n\n\
Examples:\n  \
mw watch                              # Defaults, or ./meeting-watcher.toml if present\n  \
mw watch --config office.toml         # Custom signature table\n  \
mw watch --idle-timeout 60            # Wait a minute of silence before ending\n  \
mw watch --json                       # Machine-readable status lines")]
    Watch {
        /// Configuration file (TOML)
        #[arg(short, long, help = "Path to configuration file")]
        config: Option<PathBuf>,

        /// Silence after which a meeting is considered over
        #[arg(short = 't', long, help = "Idle timeout in seconds")]
        idle_timeout: Option<u64>,

        /// How often the meeting status is checked and printed
        #[arg(short, long, help = "Check interval in seconds")]
        interval: Option<u64>,

        /// Where started/ended lines are appended
        #[arg(short = 'l', long, help = "Session log file")]
        session_log: Option<PathBuf>,

        /// Emit status lines and events as JSON
        #[arg(long, help = "Print status as JSON lines")]
        json: bool,
    },

    /// Print the effective platform signature table in match order
    #[command(about = "Show platform signatures")]
    Signatures {
        #[arg(short, long, help = "Path to configuration file")]
        config: Option<PathBuf>,

        #[arg(long, help = "Print as JSON")]
        json: bool,
    },

    /// Show which local address and subnet capture would use
    #[command(about = "Show the local network context")]
    Local {
        #[arg(short, long, help = "Path to configuration file")]
        config: Option<PathBuf>,
    },

    /// Switch the indicator manually with the default color
    #[command(about = "Turn the on-air indicator on or off")]
    Sign {
        #[arg(value_enum)]
        state: SignState,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SignState {
    On,
    Off,
}
