// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slash command parsing.
//!
//! `/cd`, `/pwd`, `/agent`, `/interrupt`, `/search` and `/bootstrap` are
//! handled locally; anything else is routed to the external command runner.

use std::path::PathBuf;

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Cd(PathBuf),
    Pwd,
    Agent(String),
    Interrupt,
    Search(String),
    Bootstrap(BootstrapArgs),
    /// Unrecognized command, forwarded externally.
    External(String),
}

/// Arguments of `/bootstrap [flags] <repoPath|gitUrl> <goal…>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapArgs {
    /// `--soft`: run without the hard-sandbox requirement.
    pub soft: bool,
    /// `--no-install`: skip dependency installation.
    pub no_install: bool,
    /// `--no-network`: deny network inside the sandbox.
    pub no_network: bool,
    /// `--max-iterations=N`
    pub max_iterations: Option<u32>,
    /// `--model=M`
    pub model: Option<String>,
    /// Local path or git URL.
    pub target: String,
    pub goal: String,
}

/// Parse one slash-command line. Returns Err with a user-facing message
/// for malformed local commands.
pub fn parse_command(line: &str) -> Result<SlashCommand, String> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Err("not a slash command".to_string());
    };
    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let tail = parts.next().unwrap_or_default().trim();

    match name {
        "cd" => {
            if tail.is_empty() {
                return Err("usage: /cd <path>".to_string());
            }
            Ok(SlashCommand::Cd(PathBuf::from(tail)))
        }
        "pwd" => Ok(SlashCommand::Pwd),
        "agent" => {
            if tail.is_empty() {
                return Err("usage: /agent <id>".to_string());
            }
            Ok(SlashCommand::Agent(tail.to_string()))
        }
        "interrupt" => Ok(SlashCommand::Interrupt),
        "search" => {
            if tail.is_empty() {
                return Err("usage: /search <query>".to_string());
            }
            Ok(SlashCommand::Search(tail.to_string()))
        }
        "bootstrap" => parse_bootstrap(tail).map(SlashCommand::Bootstrap),
        _ => Ok(SlashCommand::External(line.to_string())),
    }
}

fn parse_bootstrap(tail: &str) -> Result<BootstrapArgs, String> {
    const USAGE: &str = "usage: /bootstrap [--soft] [--no-install] [--no-network] \
                         [--max-iterations=N] [--model=M] <repoPath|gitUrl> <goal…>";

    let mut args = BootstrapArgs {
        soft: false,
        no_install: false,
        no_network: false,
        max_iterations: None,
        model: None,
        target: String::new(),
        goal: String::new(),
    };

    let mut positional: Vec<&str> = Vec::new();
    for token in tail.split_whitespace() {
        if let Some(value) = token.strip_prefix("--max-iterations=") {
            let n: u32 = value
                .parse()
                .map_err(|_| format!("invalid --max-iterations: {:?}", value))?;
            args.max_iterations = Some(n);
        } else if let Some(value) = token.strip_prefix("--model=") {
            if value.is_empty() {
                return Err("invalid --model: empty".to_string());
            }
            args.model = Some(value.to_string());
        } else {
            match token {
                "--soft" => args.soft = true,
                "--no-install" => args.no_install = true,
                "--no-network" => args.no_network = true,
                _ if token.starts_with("--") => {
                    return Err(format!("unknown flag {:?}\n{}", token, USAGE))
                }
                _ => positional.push(token),
            }
        }
    }

    if positional.len() < 2 {
        return Err(USAGE.to_string());
    }
    args.target = positional[0].to_string();
    args.goal = positional[1..].join(" ");
    Ok(args)
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
