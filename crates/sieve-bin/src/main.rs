//! Chatsieve entrypoint: a headless harness around the filter pipeline.
//!
//! Reads chat lines from stdin (with `&x` shorthand for in-band format
//! codes), runs each through the configured filter chain and prints what
//! a renderer would receive. On EOF the per-channel histories are dumped
//! with their stack counts.

use anyhow::Result;
use clap::Parser;
use core_config::load_from;
use core_dispatch::{Deliver, Dispatcher, IncomingLine, ProcessOutcome};
use core_filters::{MatchProcessor, NullSoundPlayer, ProcessorRegistry, SoundPlayer};
use core_match::MatchSpan;
use core_style::{StyledText, convert_alternate_codes};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "chatsieve", version, about = "Chat line filter pipeline")]
struct Args {
    /// Optional configuration file path (overrides discovery of
    /// `chatsieve.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Skip the history dump on EOF.
    #[arg(long)]
    pub no_history: bool,
}

/// Prints delivered lines the way a chat hud would receive them.
struct StdoutConsumer;

impl Deliver for StdoutConsumer {
    fn deliver(&mut self, text: &StyledText) {
        println!("{text}");
    }
}

/// Demo processor available to `[filter.forward]` sections: logs matched
/// lines and consumes them.
struct LogProcessor;

impl MatchProcessor for LogProcessor {
    fn process(
        &self,
        text: &StyledText,
        _unfiltered: &StyledText,
        matches: Option<&[MatchSpan]>,
    ) -> Result<bool> {
        let count = matches.map_or(0, <[MatchSpan]>::len);
        info!(target: "processor", line = %text, matches = count, "consumed line");
        Ok(true)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = load_from(args.config.clone())?;

    let mut registry = ProcessorRegistry::new();
    registry.register("log", Arc::new(LogProcessor));

    let player: Arc<dyn SoundPlayer> = Arc::new(NullSoundPlayer);
    let mut dispatcher =
        Dispatcher::from_config(&config, &registry, &player, Box::new(StdoutConsumer));
    info!(target: "runtime", "startup");

    let stdin = io::stdin();
    let mut suppressed = 0u64;
    for (idx, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let text = StyledText::plain(convert_alternate_codes(&line));
        let incoming = IncomingLine::new(text, idx as u64);
        if dispatcher.process(incoming) == ProcessOutcome::Suppressed {
            suppressed += 1;
        }
    }

    if !args.no_history {
        dump_history(&dispatcher);
    }
    info!(target: "runtime", suppressed, "shutdown");
    Ok(())
}

fn dump_history(dispatcher: &Dispatcher) {
    let history = dispatcher.history();
    let mut channels: Vec<&str> = history.channels().collect();
    channels.sort_unstable();
    for channel in channels {
        println!("--- {channel} ---");
        for entry in history.entries(channel) {
            if entry.stacks > 1 {
                println!("[{}] {} (x{})", entry.seq, entry.content, entry.stacks);
            } else {
                println!("[{}] {}", entry.seq, entry.content);
            }
        }
    }
}
