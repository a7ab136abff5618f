//! Bounded, deduplicating per-channel message history.
//!
//! Each display channel keeps a most-recent-first deque of processed
//! lines. A duplicate arriving within the stacking lookback increments the
//! existing entry's counter instead of creating a new entry; otherwise the
//! new entry is pushed to the front and the oldest entries are evicted
//! until the channel is back within its retention limit.

use core_style::{Color, StyledText};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Name of the channel every forwarded line ends up in.
pub const MAIN_CHANNEL: &str = "main";

/// Sizing limits applied to every channel.
#[derive(Debug, Clone, Copy)]
pub struct ChannelLimits {
    /// Entries retained before eviction (oldest first).
    pub max_retained: usize,
    /// How many recent entries are scanned for duplicate stacking.
    pub stack_depth: usize,
}

impl Default for ChannelLimits {
    fn default() -> Self {
        Self {
            max_retained: 100,
            stack_depth: 5,
        }
    }
}

/// One retained line. Created on append; only `stacks` is ever mutated
/// afterwards.
#[derive(Debug, Clone)]
pub struct ChannelEntry {
    /// Monotonically increasing across the whole history.
    pub seq: u64,
    pub timestamp: u64,
    pub content: StyledText,
    pub background: Option<Color>,
    /// How many times this line has arrived, at least 1.
    pub stacks: u32,
    /// Host message id; nonzero ids can be replaced in place.
    pub message_id: u32,
    dedup_key: String,
}

impl ChannelEntry {
    pub fn dedup_key(&self) -> &str {
        &self.dedup_key
    }
}

#[derive(Debug, Default)]
struct Channel {
    entries: VecDeque<ChannelEntry>,
}

/// All channels plus the shared sequence counter.
#[derive(Debug)]
pub struct ChannelHistory {
    channels: HashMap<String, Channel>,
    limits: ChannelLimits,
    next_seq: u64,
}

impl ChannelHistory {
    pub fn new(limits: ChannelLimits) -> Self {
        Self {
            channels: HashMap::new(),
            limits,
            next_seq: 1,
        }
    }

    pub fn limits(&self) -> ChannelLimits {
        self.limits
    }

    /// Append a processed line to `channel`.
    ///
    /// A nonzero `message_id` first removes any tracked entry carrying the
    /// same id (last-writer-wins replacement for progress-style messages);
    /// then the stacking scan runs, and only if no duplicate is found is a
    /// new entry created and the channel trimmed to its retention limit.
    pub fn append(
        &mut self,
        channel: &str,
        content: StyledText,
        background: Option<Color>,
        timestamp: u64,
        message_id: u32,
    ) {
        let limits = self.limits;
        let seq = self.next_seq;
        let chan = self.channels.entry(channel.to_owned()).or_default();

        if message_id != 0 {
            let before = chan.entries.len();
            chan.entries.retain(|e| e.message_id != message_id);
            if chan.entries.len() != before {
                debug!(target: "history", channel, message_id, "replaced tracked message");
            }
        }

        let dedup_key = content.unformatted();
        let lookback = limits.stack_depth.min(chan.entries.len());
        if let Some(existing) = chan
            .entries
            .iter_mut()
            .take(lookback)
            .find(|e| e.dedup_key == dedup_key)
        {
            existing.stacks += 1;
            debug!(
                target: "history",
                channel,
                seq = existing.seq,
                stacks = existing.stacks,
                "stacked duplicate line"
            );
            return;
        }

        self.next_seq += 1;
        chan.entries.push_front(ChannelEntry {
            seq,
            timestamp,
            content,
            background,
            stacks: 1,
            message_id,
            dedup_key,
        });
        while chan.entries.len() > limits.max_retained {
            let evicted = chan.entries.pop_back();
            if let Some(e) = evicted {
                debug!(target: "history", channel, seq = e.seq, "evicted oldest entry");
            }
        }
    }

    /// Most-recent-first view of a channel; empty for unknown channels.
    pub fn entries(&self, channel: &str) -> impl Iterator<Item = &ChannelEntry> {
        self.channels
            .get(channel)
            .map(|c| c.entries.iter())
            .into_iter()
            .flatten()
    }

    pub fn channel_len(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, |c| c.entries.len())
    }

    /// Channel names that have received at least one line.
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }
}

impl Default for ChannelHistory {
    fn default() -> Self {
        Self::new(ChannelLimits::default())
    }
}
