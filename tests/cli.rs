// tests/cli.rs

use std::path::Path;

use clap::Parser;

use bakedag::cli::{CliArgs, Command};
use bakedag::config::{DEFAULT_CONFIG_FILE, DEFAULT_DATA_DIR};
use bakedag::logging::build_filter;
use bakedag::types::LogLevel;

#[test]
fn subcommands_and_global_flags_parse() {
    let args = CliArgs::parse_from(["bakedag", "--log-level", "debug", "init", "--config", "x.toml"]);
    assert_eq!(args.log_level, Some(LogLevel::Debug));
    assert_eq!(args.data_dir, Path::new(DEFAULT_DATA_DIR));
    assert!(matches!(args.command, Command::Init { config } if config == Path::new("x.toml")));

    let args = CliArgs::parse_from(["bakedag", "build", "--data-dir", "state"]);
    assert!(matches!(args.command, Command::Build));
    assert_eq!(args.data_dir, Path::new("state"));
    assert_eq!(args.log_level, None);

    let args = CliArgs::parse_from(["bakedag", "init"]);
    assert!(matches!(args.command, Command::Init { config } if config == Path::new(DEFAULT_CONFIG_FILE)));
}

#[test]
fn unknown_subcommand_is_rejected() {
    assert!(CliArgs::try_parse_from(["bakedag", "watch"]).is_err());
    assert!(CliArgs::try_parse_from(["bakedag"]).is_err());
}

#[test]
fn log_filter_prefers_flag_then_env_then_config() {
    let filter = build_filter(Some(LogLevel::Trace), Some("warn".into()), Some(LogLevel::Error))
        .expect("flag level");
    assert_eq!(filter.to_string(), "trace");

    let filter = build_filter(None, Some("bakedag::dag=debug".into()), Some(LogLevel::Error))
        .expect("env directive");
    assert_eq!(filter.to_string(), "bakedag::dag=debug");

    let filter = build_filter(None, Some("  ".into()), Some(LogLevel::Warn)).expect("config level");
    assert_eq!(filter.to_string(), "warn");

    let filter = build_filter(None, None, None).expect("default level");
    assert_eq!(filter.to_string(), "info");
}

#[test]
fn invalid_env_filter_is_an_error() {
    assert!(build_filter(None, Some("bakedag=loudest".into()), None).is_err());
}
