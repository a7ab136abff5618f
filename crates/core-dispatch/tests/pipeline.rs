//! End-to-end pipeline tests: config in, filtered lines and histories out.

use core_config::Config;
use core_dispatch::{Deliver, Dispatcher, IncomingLine, ProcessOutcome};
use core_filters::{
    MatchProcessor, NullSoundPlayer, ProcessorRegistry, SoundPlayer,
};
use core_match::MatchSpan;
use core_style::StyledText;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Sink {
    delivered: Arc<Mutex<Vec<String>>>,
}

impl Deliver for Sink {
    fn deliver(&mut self, text: &StyledText) {
        self.delivered.lock().unwrap().push(text.unformatted());
    }
}

struct Consume {
    calls: AtomicUsize,
}

impl MatchProcessor for Consume {
    fn process(
        &self,
        _: &StyledText,
        _: &StyledText,
        _: Option<&[MatchSpan]>,
    ) -> anyhow::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

fn dispatcher_from(toml_src: &str, registry: &ProcessorRegistry) -> (Dispatcher, Arc<Mutex<Vec<String>>>) {
    let config = Config {
        raw: None,
        file: toml::from_str(toml_src).unwrap(),
    };
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = Sink {
        delivered: Arc::clone(&delivered),
    };
    let player: Arc<dyn SoundPlayer> = Arc::new(NullSoundPlayer);
    let dispatcher = Dispatcher::from_config(&config, registry, &player, Box::new(sink));
    (dispatcher, delivered)
}

fn line(text: &str, timestamp: u64) -> IncomingLine {
    IncomingLine::new(StyledText::plain(text), timestamp)
}

#[test]
fn filtered_line_is_delivered_and_routed() {
    let registry = ProcessorRegistry::new();
    let (mut d, delivered) = dispatcher_from(
        r#"
[[filter]]
find = "heck"
[filter.replace]
to = "h***"

[[tab]]
name = "team"
find = "[team]"
"#,
        &registry,
    );

    let outcome = d.process(line("[team] what the heck", 1));
    assert_eq!(
        outcome,
        ProcessOutcome::Delivered {
            channels: vec!["team".into(), "main".into()]
        }
    );
    assert_eq!(delivered.lock().unwrap().as_slice(), ["[team] what the h***"]);
    assert_eq!(d.history().channel_len("team"), 1);
    assert_eq!(d.history().channel_len("main"), 1);
}

#[test]
fn consumed_line_never_reaches_consumer_or_history() {
    let mut registry = ProcessorRegistry::new();
    let proc = Arc::new(Consume {
        calls: AtomicUsize::new(0),
    });
    registry.register("sink", Arc::clone(&proc) as Arc<dyn MatchProcessor>);
    let (mut d, delivered) = dispatcher_from(
        r#"
[[filter]]
find = "!hidden"
[filter.forward]
processors = ["sink"]
"#,
        &registry,
    );

    assert_eq!(d.process(line("!hidden command", 1)), ProcessOutcome::Suppressed);
    assert!(delivered.lock().unwrap().is_empty());
    assert_eq!(d.history().channel_len("main"), 0);
    assert_eq!(proc.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn duplicate_lines_stack_in_history() {
    let registry = ProcessorRegistry::new();
    let (mut d, _) = dispatcher_from(
        r#"
[history]
max_retained = 5
stack_depth = 5
"#,
        &registry,
    );

    d.process(line("hello", 1));
    d.process(line("hello", 2));
    d.process(line("world", 3));
    let entries: Vec<(String, u32)> = d
        .history()
        .entries("main")
        .map(|e| (e.content.unformatted(), e.stacks))
        .collect();
    assert_eq!(entries, [("world".into(), 1), ("hello".into(), 2)]);
}

#[test]
fn eviction_honors_retention_limit() {
    let registry = ProcessorRegistry::new();
    let (mut d, _) = dispatcher_from("[history]\nmax_retained = 2\n", &registry);
    d.process(line("A", 1));
    d.process(line("B", 2));
    d.process(line("C", 3));
    let texts: Vec<String> = d
        .history()
        .entries("main")
        .map(|e| e.content.unformatted())
        .collect();
    assert_eq!(texts, ["C", "B"]);
}

#[test]
fn nonzero_message_id_replaces_previous_line() {
    let registry = ProcessorRegistry::new();
    let (mut d, _) = dispatcher_from("", &registry);
    let mut progress = line("loading 10%", 1);
    progress.message_id = 42;
    d.process(progress);
    let mut done = line("loading 100%", 2);
    done.message_id = 42;
    d.process(done);
    let texts: Vec<String> = d
        .history()
        .entries("main")
        .map(|e| e.content.unformatted())
        .collect();
    assert_eq!(texts, ["loading 100%"]);
}

#[test]
fn channel_hint_bypasses_routing() {
    let registry = ProcessorRegistry::new();
    let (mut d, _) = dispatcher_from("", &registry);
    let mut hinted = line("status update", 1);
    hinted.channel_hint = Some("system".into());
    assert_eq!(
        d.process(hinted),
        ProcessOutcome::Delivered {
            channels: vec!["system".into()]
        }
    );
    assert_eq!(d.history().channel_len("system"), 1);
    assert_eq!(d.history().channel_len("main"), 0);
}

#[test]
fn background_color_recorded_on_entries() {
    let registry = ProcessorRegistry::new();
    let (mut d, _) = dispatcher_from(
        r##"
[[filter]]
find = "alert"
[filter.background]
color = "#AA0000"
"##,
        &registry,
    );
    d.process(line("alert: creeper", 1));
    d.process(line("all quiet", 2));
    let backgrounds: Vec<Option<core_style::Color>> = d
        .history()
        .entries("main")
        .map(|e| e.background)
        .collect();
    assert_eq!(
        backgrounds,
        [None, Some(core_style::Color::rgb(0xAA, 0, 0))]
    );
}

#[test]
fn chain_rebuild_swaps_behavior() {
    let registry = ProcessorRegistry::new();
    let (mut d, delivered) = dispatcher_from(
        r#"
[[filter]]
find = "old"
[filter.replace]
to = "new"
"#,
        &registry,
    );
    d.process(line("old rule", 1));

    let replacement: core_config::ConfigFile = toml::from_str(
        r#"
[[filter]]
find = "old"
[filter.replace]
to = "rebuilt"
"#,
    )
    .unwrap();
    let player: Arc<dyn SoundPlayer> = Arc::new(NullSoundPlayer);
    d.rebuild_chain(core_filters::FilterChain::from_config(
        &replacement.filters,
        &registry,
        &player,
    ));
    d.process(line("old rule", 2));
    assert_eq!(
        delivered.lock().unwrap().as_slice(),
        ["new rule", "rebuilt rule"]
    );
}
