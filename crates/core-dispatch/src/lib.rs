//! The assembled pipeline: filter chain, tab routing and history,
//! owned by an explicitly constructed [`Dispatcher`].
//!
//! Lifecycle is explicit: build at config load, rebuild the chain on
//! config change (a whole-chain swap, never an in-place edit), drop at
//! shutdown. Processing is synchronous on the host's update thread.

use core_config::{Config, TabDef};
use core_filters::{FilterChain, Outcome, ProcessorRegistry, SoundPlayer};
use core_history::{ChannelHistory, ChannelLimits, MAIN_CHANNEL};
use core_match::CompiledPattern;
use core_style::StyledText;
use std::sync::Arc;
use tracing::{debug, warn};

/// Terminal consumer for lines that survive the chain. Invoked exactly
/// once per delivered line.
pub trait Deliver {
    fn deliver(&mut self, text: &StyledText);
}

/// A raw line entering the pipeline.
#[derive(Debug, Clone)]
pub struct IncomingLine {
    pub text: StyledText,
    /// Zero means "new message"; a nonzero id replaces a tracked entry.
    pub message_id: u32,
    pub timestamp: u64,
    /// When set, bypasses tab routing and targets one channel directly.
    pub channel_hint: Option<String>,
}

impl IncomingLine {
    pub fn new(text: StyledText, timestamp: u64) -> Self {
        Self {
            text,
            message_id: 0,
            timestamp,
            channel_hint: None,
        }
    }
}

/// What happened to one processed line; returned for host bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The chain terminated the line; nothing was delivered or stored.
    Suppressed,
    Delivered { channels: Vec<String> },
}

struct Tab {
    name: String,
    pattern: CompiledPattern,
    forward: bool,
}

/// Ordered pattern routing into display channels. Every line falls
/// through to the main channel unless a matching non-forwarding tab
/// captures it first.
#[derive(Default)]
pub struct TabRouter {
    tabs: Vec<Tab>,
}

impl TabRouter {
    pub fn from_defs(defs: &[TabDef]) -> Self {
        let mut tabs = Vec::new();
        for def in defs {
            match CompiledPattern::compile(&def.find, def.mode) {
                Ok(pattern) => tabs.push(Tab {
                    name: def.name.clone(),
                    pattern,
                    forward: def.forward,
                }),
                Err(err) => {
                    warn!(target: "dispatch", tab = %def.name, error = %err, "skipping tab definition")
                }
            }
        }
        Self { tabs }
    }

    /// Channels the line should land in, in tab order. A matching tab
    /// with `forward = false` stops routing; otherwise the main channel
    /// is appended last.
    pub fn route(&self, plain: &str) -> Vec<String> {
        let mut channels = Vec::new();
        for tab in &self.tabs {
            if tab.pattern.is_match(plain) {
                channels.push(tab.name.clone());
                if !tab.forward {
                    return channels;
                }
            }
        }
        channels.push(MAIN_CHANNEL.to_owned());
        channels
    }
}

/// Owns one consistent chain snapshot plus the channel histories.
pub struct Dispatcher {
    chain: Arc<FilterChain>,
    router: TabRouter,
    history: ChannelHistory,
    consumer: Box<dyn Deliver>,
}

impl Dispatcher {
    pub fn new(
        chain: FilterChain,
        router: TabRouter,
        limits: ChannelLimits,
        consumer: Box<dyn Deliver>,
    ) -> Self {
        Self {
            chain: Arc::new(chain),
            router,
            history: ChannelHistory::new(limits),
            consumer,
        }
    }

    /// Assemble a dispatcher from a loaded configuration.
    pub fn from_config(
        config: &Config,
        registry: &ProcessorRegistry,
        player: &Arc<dyn SoundPlayer>,
        consumer: Box<dyn Deliver>,
    ) -> Self {
        let chain = FilterChain::from_config(&config.file.filters, registry, player);
        let router = TabRouter::from_defs(&config.file.tabs);
        let limits = ChannelLimits {
            max_retained: config.file.history.max_retained,
            stack_depth: config.file.history.stack_depth,
        };
        Self::new(chain, router, limits, consumer)
    }

    /// Swap in a freshly built chain. The old snapshot stays alive for
    /// any apply currently borrowing it; no partially rebuilt chain is
    /// ever observable.
    pub fn rebuild_chain(&mut self, chain: FilterChain) {
        debug!(target: "dispatch", filters = chain.len(), "swapping filter chain");
        self.chain = Arc::new(chain);
    }

    pub fn history(&self) -> &ChannelHistory {
        &self.history
    }

    /// Run one line through the chain, deliver it if it survives, and
    /// record it in every routed channel's history.
    pub fn process(&mut self, line: IncomingLine) -> ProcessOutcome {
        let chain = Arc::clone(&self.chain);
        match chain.apply(&line.text) {
            Outcome::Terminated => {
                debug!(target: "dispatch", "line suppressed by filter chain");
                ProcessOutcome::Suppressed
            }
            Outcome::Delivered { text, background } => {
                self.consumer.deliver(&text);
                let channels = match line.channel_hint {
                    Some(hint) => vec![hint],
                    None => self.router.route(&text.unformatted()),
                };
                for channel in &channels {
                    self.history.append(
                        channel,
                        text.clone(),
                        background,
                        line.timestamp,
                        line.message_id,
                    );
                }
                ProcessOutcome::Delivered { channels }
            }
        }
    }
}
