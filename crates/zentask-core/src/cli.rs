use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "zentask",
    version,
    about = "ZenTask: dated tasks, progress and calendar links from the terminal"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "zentaskrc")]
    pub zentaskrc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a task
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// YYYY-MM-DD, today, tomorrow, yesterday or a weekday name
        #[arg(short = 'd', long = "due")]
        due: Option<String>,

        /// low, medium or high
        #[arg(short = 'p', long = "priority")]
        priority: Option<String>,

        /// Print a calendar link and mark the task synced
        #[arg(short = 's', long = "sync")]
        sync: bool,
    },
    /// Show tasks grouped by due date
    List,
    /// Toggle completion
    #[command(alias = "toggle")]
    Done { id: String },
    /// Remove a task
    #[command(alias = "rm")]
    Delete { id: String },
    /// Print a calendar link for a pending task and mark it synced
    Sync { id: String },
    /// Completion rate and the last seven days
    Stats,
    /// Next pending tasks from today on
    Agenda {
        #[arg(short = 'n', long = "limit", default_value_t = 5)]
        limit: usize,
    },
    /// Print the embedded calendar URL
    Calendar,
    /// Fetch a motivational quote for the pending workload
    Motivate,
    /// Print the stored task collection as JSON
    Export,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.KEY=VALUE` / `rc.KEY:VALUE` overrides out of the
/// argument list before clap sees it. Only arguments ahead of the
/// subcommand (or `--`) are candidates; everything after belongs to it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    let commands = GlobalCli::command();
    let mut passthrough = false;

    for arg in iter {
        if passthrough {
            cleaned.push(arg);
            continue;
        }
        if arg == "--" || commands.find_subcommand(&arg).is_some() {
            passthrough = true;
            cleaned.push(arg);
            continue;
        }

        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::{Command, GlobalCli, preprocess_args};

    fn args(raw: &[&str]) -> Vec<OsString> {
        raw.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_overrides_are_extracted() {
        let pre = preprocess_args(&args(&["zentask", "rc.color=off", "rc.sync.auto:on", "list"]))
            .expect("preprocess");
        assert_eq!(pre.cleaned_args, args(&["zentask", "list"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.color".to_string(), "off".to_string()),
                ("rc.sync.auto".to_string(), "on".to_string()),
            ]
        );
    }

    #[test]
    fn arguments_after_the_subcommand_are_left_alone() {
        let raw = args(&["zentask", "rc.color=off", "add", "rc.local:", "fix", "boot", "rc.x=y"]);
        let pre = preprocess_args(&raw).expect("preprocess");
        assert_eq!(
            pre.cleaned_args,
            args(&["zentask", "add", "rc.local:", "fix", "boot", "rc.x=y"])
        );
        assert_eq!(pre.rc_overrides, vec![("rc.color".to_string(), "off".to_string())]);

        let cli = GlobalCli::parse_from(pre.cleaned_args);
        assert!(matches!(
            cli.command,
            Some(Command::Add { ref text, .. }) if text.join(" ") == "rc.local: fix boot rc.x=y"
        ));
    }

    #[test]
    fn aliases_and_separator_also_end_override_scanning() {
        let pre = preprocess_args(&args(&["zentask", "rm", "rc.a=b"])).expect("preprocess");
        assert!(pre.rc_overrides.is_empty());

        let pre = preprocess_args(&args(&["zentask", "--", "rc.a=b"])).expect("preprocess");
        assert!(pre.rc_overrides.is_empty());
    }

    #[test]
    fn parses_add_with_options() {
        let cli = GlobalCli::parse_from(args(&[
            "zentask", "-vv", "--rc", "color=off", "add", "Call", "mom", "--due", "tomorrow", "-p", "high", "--sync",
        ]));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.rc_overrides[0].key, "color");
        assert_eq!(
            cli.command,
            Some(Command::Add {
                text: vec!["Call".to_string(), "mom".to_string()],
                due: Some("tomorrow".to_string()),
                priority: Some("high".to_string()),
                sync: true,
            })
        );
    }

    #[test]
    fn toggle_alias_maps_to_done() {
        let cli = GlobalCli::parse_from(args(&["zentask", "toggle", "abc"]));
        assert_eq!(cli.command, Some(Command::Done { id: "abc".to_string() }));
    }

    #[test]
    fn command_is_optional() {
        let cli = GlobalCli::parse_from(args(&["zentask"]));
        assert_eq!(cli.command, None);
    }
}
