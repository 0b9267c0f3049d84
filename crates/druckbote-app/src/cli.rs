// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line flags.

use std::path::PathBuf;

use clap::Parser;

/// Local print dispatcher: accepts print jobs over HTTP(S) or the console
/// and hands them to the host print subsystem.
#[derive(Debug, Parser)]
#[command(name = "druckbote", version, about)]
pub struct Cli {
    /// Run without the interactive console.
    #[arg(long)]
    pub silent: bool,

    /// Settings file (defaults to config.json in the data directory).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset, e.g. "debug" or "druckbote_print=trace".
    #[arg(long, value_name = "FILTER", default_value = "info")]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn flags_are_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["druckbote"]).unwrap();
        assert!(!cli.silent);
        assert!(cli.config.is_none());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn all_flags() {
        let cli = Cli::try_parse_from([
            "druckbote",
            "--silent",
            "--config",
            "/etc/druckbote.json",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert!(cli.silent);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/druckbote.json")));
        assert_eq!(cli.log_level, "debug");
    }
}
