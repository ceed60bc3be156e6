// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

mod script;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use samplefs_core::{
    CollectingDiagnostics, Credentials, MountConfig, MountParams, Namespace, parse_mount_options,
};
use samplefs_logging::CliLoggingArgs;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::script::Session;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Inspect samplefs mount options and script operations against an in-memory namespace"
)]
struct Cli {
    #[command(flatten)]
    logging: CliLoggingArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a comma-separated mount option string and print the resulting configuration
    Options {
        /// Option string, e.g. "nocase,rsize=4096,iocharset=iso8859-1"
        options: String,
        /// Print the configuration and warnings as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mount a fresh namespace and run a script against it (use '-' for stdin)
    Run {
        /// Mount option string
        #[arg(long, default_value = "")]
        options: String,
        /// User id the script's nodes are created as
        #[arg(long, default_value_t = 0)]
        uid: u32,
        /// Group id the script's nodes are created as
        #[arg(long, default_value_t = 0)]
        gid: u32,
        /// Maximum number of live nodes
        #[arg(long)]
        max_nodes: Option<usize>,
        script: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.logging.init("samplefs-cli")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::Options { options, json } => describe_options(&options, json, &mut out)?,
        Command::Run {
            options,
            uid,
            gid,
            max_nodes,
            script,
        } => {
            let text = read_script(&script)?;
            let params = MountParams {
                max_nodes,
                ..Default::default()
            };
            let ns = Namespace::mount(&options, params)
                .map_err(|err| anyhow!("mount failed: {} (errno={})", err, err.errno()))?;
            let mut session = Session::new(ns, Credentials::new(uid, gid), out);
            session.run_script(&text)?;
        }
    }

    Ok(())
}

fn describe_options(options: &str, json: bool, out: &mut impl Write) -> Result<()> {
    let diagnostics = CollectingDiagnostics::new();
    let mut config = MountConfig::default();
    parse_mount_options(options, &mut config, &diagnostics);
    let warnings: Vec<String> = diagnostics.warnings().iter().map(ToString::to_string).collect();

    if json {
        let report = serde_json::json!({
            "config": config,
            "warnings": warnings,
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        writeln!(
            out,
            "case_insensitive={}\tiocharset={}\trsize={}\twsize={}",
            config.case_insensitive,
            config.code_table.name(),
            config.rsize,
            config.wsize
        )?;
        for warning in warnings {
            writeln!(out, "WARN {}", warning)?;
        }
    }
    Ok(())
}

fn read_script(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        fs::read_to_string(path).with_context(|| format!("failed to read script {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run_with_logging_flags() {
        let cli = Cli::try_parse_from([
            "samplefs",
            "--log-level",
            "debug",
            "run",
            "--options",
            "nocase",
            "--uid",
            "1000",
            "script.txt",
        ])
        .expect("parse");
        assert!(!cli.logging.is_empty());
        match cli.command {
            Command::Run {
                options, uid, gid, ..
            } => {
                assert_eq!(options, "nocase");
                assert_eq!(uid, 1000);
                assert_eq!(gid, 0);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_describe_options_plaintext() {
        let mut out = Vec::new();
        describe_options("rsize=0x1000,bogus,nocase", false, &mut out).expect("describe");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "case_insensitive=true\tiocharset=utf8\trsize=4096\twsize=0"
        );
        assert_eq!(lines[1], "WARN bad mount option bogus");
    }

    #[test]
    fn test_describe_options_json() {
        let mut out = Vec::new();
        describe_options("iocharset=iso8859-1,wsize=512", true, &mut out).expect("describe");
        let value: serde_json::Value = serde_json::from_slice(&out).expect("json");
        assert_eq!(value["config"]["code_table"], "iso8859-1");
        assert_eq!(value["config"]["wsize"], 512);
        assert_eq!(value["warnings"].as_array().map(Vec::len), Some(0));
    }

    #[test]
    fn test_read_script_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "mkdir /a").expect("write");
        writeln!(file, "stat /a").expect("write");
        let text = read_script(file.path()).expect("read");

        let ns = Namespace::mount("", MountParams::default()).expect("mount");
        let mut session = Session::new(ns, Credentials::ROOT, Vec::new());
        session.run_script(&text).expect("run");
        assert!(session.namespace().lookup_path("/a").is_ok());
        let output = String::from_utf8(session.into_output()).expect("utf8");
        assert!(output.contains("\tdirectory\tmode=0755\t"));
    }

    #[test]
    fn test_missing_script_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = read_script(&dir.path().join("absent.txt")).expect_err("missing");
        assert!(err.to_string().contains("failed to read script"));
    }
}
