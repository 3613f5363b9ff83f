use super::*;
use crate::actions::testing::{Call, RecordingInvoker};
use crate::config::{Config, HotkeyRecord, SnippetRecord};
use crate::hook::{HookError, SimulatedHook, UnsupportedHook};

/// Binding source whose contents a test can change between reloads.
#[derive(Clone, Default)]
struct SharedSource(Arc<Mutex<Config>>);

impl SharedSource {
    fn set(&self, config: Config) {
        *self.0.lock() = config;
    }
}

impl BindingSource for SharedSource {
    fn hotkeys(&self) -> Vec<HotkeyRecord> {
        self.0.lock().hotkeys.clone()
    }

    fn snippets(&self) -> Vec<SnippetRecord> {
        self.0.lock().snippets.clone()
    }
}

fn hotkey(trigger: &str, kind: &str, target: &str, suppress: bool) -> HotkeyRecord {
    HotkeyRecord {
        trigger: trigger.to_string(),
        kind: kind.to_string(),
        target: target.to_string(),
        active: true,
        suppress,
        created_at: None,
    }
}

fn snippet(trigger: &str, replacement: &str) -> SnippetRecord {
    SnippetRecord {
        trigger: trigger.to_string(),
        replacement: replacement.to_string(),
        active: true,
        created_at: None,
    }
}

fn config(hotkeys: Vec<HotkeyRecord>, snippets: Vec<SnippetRecord>) -> Config {
    Config {
        hotkeys,
        snippets,
        ..Config::default()
    }
}

fn engine_with(
    hook: &SimulatedHook,
    config: Config,
) -> (HookEngine<SimulatedHook>, Arc<RecordingInvoker>) {
    let invoker = Arc::new(RecordingInvoker::default());
    let settings = config.settings.clone();
    let engine = HookEngine::new(hook.clone(), Box::new(config), invoker.clone(), &settings);
    (engine, invoker)
}

/// Drop the engine (joining the worker) and return what was invoked.
fn finish(engine: HookEngine<SimulatedHook>, invoker: &RecordingInvoker) -> Vec<Call> {
    drop(engine);
    invoker.calls()
}

#[test]
fn test_suppressed_hotkey_is_swallowed_and_fires_once() {
    let hook = SimulatedHook::new();
    let (mut engine, invoker) = engine_with(
        &hook,
        config(vec![hotkey("ctrl+alt+n", "focus", "Notepad", true)], vec![]),
    );
    engine.start().unwrap();

    let verdicts = hook.press_chord("ctrl+alt+n");
    assert_eq!(
        verdicts,
        vec![
            Verdict::Pass,     // ctrl down
            Verdict::Pass,     // alt down
            Verdict::Suppress, // n down
            Verdict::Suppress, // n up
            Verdict::Pass,     // alt up
            Verdict::Pass,     // ctrl up
        ]
    );
    assert_eq!(finish(engine, &invoker), vec![Call::Focus("Notepad".into())]);
}

#[test]
fn test_pass_through_hotkey_still_fires_once() {
    let hook = SimulatedHook::new();
    let (mut engine, invoker) = engine_with(
        &hook,
        config(vec![hotkey("ctrl+alt+n", "focus", "Notepad", false)], vec![]),
    );
    engine.start().unwrap();

    let verdicts = hook.press_chord("ctrl+alt+n");
    assert!(verdicts.iter().all(|v| *v == Verdict::Pass));
    assert_eq!(finish(engine, &invoker), vec![Call::Focus("Notepad".into())]);
}

#[test]
fn test_partial_and_superset_chords_do_not_fire() {
    let hook = SimulatedHook::new();
    let (mut engine, invoker) = engine_with(
        &hook,
        config(vec![hotkey("ctrl+alt+t", "run", "terminal", true)], vec![]),
    );
    engine.start().unwrap();

    hook.press_chord("ctrl+t");
    hook.press_chord("ctrl+alt+shift+t");
    assert!(finish(engine, &invoker).is_empty());
}

#[test]
fn test_auto_repeat_keeps_suppressing_without_refiring() {
    let hook = SimulatedHook::new();
    let (mut engine, invoker) = engine_with(
        &hook,
        config(vec![hotkey("ctrl+alt+t", "run", "terminal", true)], vec![]),
    );
    engine.start().unwrap();

    hook.feed(&KeyEvent::down(KeyToken::ctrl(), None));
    hook.feed(&KeyEvent::down(KeyToken::alt(), None));
    assert_eq!(hook.feed(&KeyEvent::char_down('t')), Verdict::Suppress);
    assert_eq!(hook.feed(&KeyEvent::char_down('t')), Verdict::Suppress);
    assert_eq!(hook.feed(&KeyEvent::char_down('t')), Verdict::Suppress);
    assert_eq!(hook.feed(&KeyEvent::up(KeyToken::new("t"))), Verdict::Suppress);

    assert_eq!(finish(engine, &invoker), vec![Call::Run("terminal".into())]);
}

#[test]
fn test_suppressed_key_stays_swallowed_after_modifier_release() {
    let hook = SimulatedHook::new();
    let (mut engine, invoker) = engine_with(
        &hook,
        config(vec![hotkey("ctrl+alt+t", "run", "terminal", true)], vec![]),
    );
    engine.start().unwrap();

    hook.feed(&KeyEvent::down(KeyToken::ctrl(), None));
    hook.feed(&KeyEvent::down(KeyToken::alt(), None));
    assert_eq!(hook.feed(&KeyEvent::char_down('t')), Verdict::Suppress);
    assert_eq!(hook.feed(&KeyEvent::up(KeyToken::ctrl())), Verdict::Pass);
    assert_eq!(hook.feed(&KeyEvent::char_down('t')), Verdict::Suppress);
    assert_eq!(hook.feed(&KeyEvent::up(KeyToken::alt())), Verdict::Pass);
    assert_eq!(hook.feed(&KeyEvent::char_down('t')), Verdict::Suppress);
    assert_eq!(hook.feed(&KeyEvent::up(KeyToken::new("t"))), Verdict::Suppress);

    // Released for real: the next press is ordinary typing.
    assert_eq!(hook.feed(&KeyEvent::char_down('t')), Verdict::Pass);
    assert_eq!(finish(engine, &invoker), vec![Call::Run("terminal".into())]);
}

#[test]
fn test_missed_key_ups_do_not_wedge_held_keys() {
    let hook = SimulatedHook::new();
    let (mut engine, invoker) = engine_with(
        &hook,
        config(
            vec![hotkey("ctrl+alt+t", "run", "terminal", true)],
            vec![snippet("omw", "on my way")],
        ),
    );
    engine.start().unwrap();

    // Win+L: the lock screen takes both key-ups.
    hook.feed(&KeyEvent::down(KeyToken::windows(), None));
    hook.feed(&KeyEvent::char_down('l'));
    hook.release_unseen("windows");
    hook.release_unseen("l");

    hook.type_text("omw ");
    let verdicts = hook.press_chord("ctrl+alt+t");
    assert_eq!(verdicts[2], Verdict::Suppress);
    assert_eq!(
        finish(engine, &invoker),
        vec![
            Call::Replace("omw".into(), "on my way".into()),
            Call::Run("terminal".into()),
        ]
    );
}

#[test]
fn test_missed_key_up_of_suppressed_key_is_forgotten() {
    let hook = SimulatedHook::new();
    let (mut engine, invoker) = engine_with(
        &hook,
        config(vec![hotkey("ctrl+alt+t", "run", "terminal", true)], vec![]),
    );
    engine.start().unwrap();

    hook.feed(&KeyEvent::down(KeyToken::ctrl(), None));
    hook.feed(&KeyEvent::down(KeyToken::alt(), None));
    assert_eq!(hook.feed(&KeyEvent::char_down('t')), Verdict::Suppress);
    hook.release_unseen("ctrl");
    hook.release_unseen("alt");
    hook.release_unseen("t");

    assert_eq!(hook.feed(&KeyEvent::char_down('x')), Verdict::Pass);
    assert_eq!(hook.feed(&KeyEvent::char_down('t')), Verdict::Pass);
    assert_eq!(finish(engine, &invoker), vec![Call::Run("terminal".into())]);
}

#[test]
fn test_duplicate_triggers_all_fire_in_load_order() {
    let hook = SimulatedHook::new();
    let (mut engine, invoker) = engine_with(
        &hook,
        config(
            vec![
                hotkey("ctrl+alt+d", "run", "first", false),
                hotkey("alt+ctrl+d", "open_url", "example.com", false),
            ],
            vec![],
        ),
    );
    let report = engine.start().unwrap();
    assert_eq!(report.registered.len(), 1);

    hook.press_chord("ctrl+alt+d");
    assert_eq!(
        finish(engine, &invoker),
        vec![Call::Run("first".into()), Call::OpenUrl("example.com".into())]
    );
}

#[test]
fn test_snippet_expands_after_delimiter() {
    let hook = SimulatedHook::new();
    let (mut engine, invoker) =
        engine_with(&hook, config(vec![], vec![snippet("omw", "on my way")]));
    engine.start().unwrap();

    let verdicts = hook.type_text("omw ");
    assert!(verdicts.iter().all(|v| *v == Verdict::Pass));
    assert_eq!(
        finish(engine, &invoker),
        vec![Call::Replace("omw".into(), "on my way".into())]
    );
}

#[test]
fn test_backspaced_snippet_does_not_expand() {
    let hook = SimulatedHook::new();
    let (mut engine, invoker) = engine_with(&hook, config(vec![], vec![snippet("hi", "hello")]));
    engine.start().unwrap();

    hook.type_text("hi\u{8}\u{8} ");
    assert!(finish(engine, &invoker).is_empty());
}

#[test]
fn test_shortcut_chord_breaks_typed_word() {
    let hook = SimulatedHook::new();
    let (mut engine, invoker) =
        engine_with(&hook, config(vec![], vec![snippet("omw", "on my way")]));
    engine.start().unwrap();

    hook.type_text("om");
    hook.press_chord("ctrl+c");
    hook.type_text("w ");
    assert!(finish(engine, &invoker).is_empty());
}

#[test]
fn test_injected_events_are_ignored() {
    let hook = SimulatedHook::new();
    let (mut engine, invoker) = engine_with(
        &hook,
        config(
            vec![hotkey("f9", "run", "x", true)],
            vec![snippet("omw", "on my way")],
        ),
    );
    engine.start().unwrap();

    for c in "omw".chars() {
        let mut event = KeyEvent::char_down(c);
        event.injected = true;
        assert_eq!(hook.feed(&event), Verdict::Pass);
    }
    let mut space = KeyEvent::down(KeyToken::new("space"), Some(' '));
    space.injected = true;
    hook.feed(&space);

    let mut f9 = KeyEvent::down(KeyToken::new("f9"), None);
    f9.injected = true;
    assert_eq!(hook.feed(&f9), Verdict::Pass);

    assert!(finish(engine, &invoker).is_empty());
}

/// Answers only through `bindings`, counting how often it is read.
#[derive(Clone, Default)]
struct CountingSource {
    reads: Arc<Mutex<usize>>,
}

impl BindingSource for CountingSource {
    fn hotkeys(&self) -> Vec<HotkeyRecord> {
        Vec::new()
    }

    fn snippets(&self) -> Vec<SnippetRecord> {
        Vec::new()
    }

    fn bindings(&self) -> (Vec<HotkeyRecord>, Vec<SnippetRecord>) {
        *self.reads.lock() += 1;
        (
            vec![hotkey("ctrl+alt+t", "run", "x", false)],
            vec![snippet("omw", "on my way")],
        )
    }
}

#[test]
fn test_tables_come_from_one_read_per_build() {
    let hook = SimulatedHook::new();
    let source = CountingSource::default();
    let mut engine = HookEngine::new(
        hook.clone(),
        Box::new(source.clone()),
        Arc::new(RecordingInvoker::default()),
        &EngineSettings::default(),
    );

    let report = engine.start().unwrap();
    assert_eq!(report.registered.len(), 1);
    assert_eq!(report.snippet_count, 1);
    assert_eq!(*source.reads.lock(), 1);

    engine.reload().unwrap();
    assert_eq!(*source.reads.lock(), 2);
}

#[test]
fn test_start_is_idempotent() {
    let hook = SimulatedHook::new();
    let (mut engine, _invoker) = engine_with(
        &hook,
        config(vec![hotkey("ctrl+alt+t", "run", "x", false)], vec![]),
    );
    let first = engine.start().unwrap();
    let second = engine.start().unwrap();

    assert_eq!(first, second);
    assert_eq!(hook.install_count(), 1);
    assert_eq!(hook.claimed().len(), 1);
    assert_eq!(engine.state(), HookState::Running);
}

#[test]
fn test_reload_requires_running_engine() {
    let hook = SimulatedHook::new();
    let (mut engine, _invoker) = engine_with(&hook, Config::default());
    assert!(matches!(engine.reload(), Err(EngineError::NotRunning)));

    engine.start().unwrap();
    engine.stop();
    assert!(matches!(engine.reload(), Err(EngineError::NotRunning)));
}

#[test]
fn test_reload_swaps_tables_without_reinstalling() {
    let hook = SimulatedHook::new();
    let source = SharedSource::default();
    source.set(config(vec![hotkey("ctrl+alt+a", "run", "old", false)], vec![]));

    let invoker = Arc::new(RecordingInvoker::default());
    let mut engine = HookEngine::new(
        hook.clone(),
        Box::new(source.clone()),
        invoker.clone(),
        &EngineSettings::default(),
    );
    engine.start().unwrap();

    source.set(config(
        vec![hotkey("ctrl+alt+b", "run", "new", false)],
        vec![snippet("brb", "be right back")],
    ));
    let report = engine.reload().unwrap();
    assert_eq!(report.registered, vec![Trigger::parse("ctrl+alt+b").unwrap()]);
    assert_eq!(report.snippet_count, 1);
    assert_eq!(hook.install_count(), 1);
    assert_eq!(hook.claimed(), vec![Trigger::parse("ctrl+alt+b").unwrap()]);

    hook.press_chord("ctrl+alt+a");
    hook.press_chord("ctrl+alt+b");
    hook.type_text("brb ");
    assert_eq!(
        finish(engine, &invoker),
        vec![
            Call::Run("new".into()),
            Call::Replace("brb".into(), "be right back".into())
        ]
    );
}

#[test]
fn test_reload_with_same_bindings_is_stable() {
    let hook = SimulatedHook::new();
    let (mut engine, _invoker) = engine_with(
        &hook,
        config(
            vec![
                hotkey("ctrl+alt+t", "run", "x", false),
                hotkey("windows+e", "focus", "Explorer", true),
            ],
            vec![snippet("omw", "on my way"), snippet("sig", "Regards")],
        ),
    );
    let started = engine.start().unwrap();
    let triggers = engine.registered_triggers();
    let snippets = engine.snippet_triggers();

    let reloaded = engine.reload().unwrap();
    assert_eq!(started, reloaded);
    assert_eq!(engine.registered_triggers(), triggers);
    assert_eq!(engine.snippet_triggers(), snippets);
}

#[test]
fn test_conflicting_trigger_is_skipped_and_others_register() {
    let hook = SimulatedHook::new().with_conflict("ctrl+alt+t");
    let (mut engine, invoker) = engine_with(
        &hook,
        config(
            vec![
                hotkey("ctrl+alt+t", "run", "taken", true),
                hotkey("ctrl+alt+y", "run", "free", true),
            ],
            vec![],
        ),
    );
    let report = engine.start().unwrap();

    assert_eq!(report.registered, vec![Trigger::parse("ctrl+alt+y").unwrap()]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].trigger, "ctrl+alt+t");

    let verdicts = hook.press_chord("ctrl+alt+t");
    assert!(verdicts.iter().all(|v| *v == Verdict::Pass));
    hook.press_chord("ctrl+alt+y");
    assert_eq!(finish(engine, &invoker), vec![Call::Run("free".into())]);
}

#[test]
fn test_invalid_records_are_reported() {
    let hook = SimulatedHook::new();
    let (mut engine, _invoker) = engine_with(
        &hook,
        config(
            vec![
                hotkey("ctrl+alt+t", "teleport", "x", false),
                hotkey("", "run", "x", false),
            ],
            vec![],
        ),
    );
    let report = engine.start().unwrap();
    assert!(report.registered.is_empty());
    assert_eq!(report.skipped.len(), 2);
}

#[test]
fn test_subscribers_toggle_independently() {
    let hook = SimulatedHook::new();
    let (mut engine, invoker) = engine_with(
        &hook,
        config(
            vec![hotkey("ctrl+alt+t", "run", "terminal", true)],
            vec![snippet("omw", "on my way")],
        ),
    );
    engine.start().unwrap();

    engine.set_hotkeys_enabled(false);
    let verdicts = hook.press_chord("ctrl+alt+t");
    assert!(verdicts.iter().all(|v| *v == Verdict::Pass));
    hook.type_text("omw ");
    assert!(hook.is_installed());

    engine.set_hotkeys_enabled(true);
    engine.set_snippets_enabled(false);
    hook.press_chord("ctrl+alt+t");
    hook.type_text("omw ");
    assert!(engine.hotkeys_enabled());
    assert!(!engine.snippets_enabled());

    assert_eq!(
        finish(engine, &invoker),
        vec![
            Call::Replace("omw".into(), "on my way".into()),
            Call::Run("terminal".into()),
        ]
    );
}

#[test]
fn test_settings_can_start_with_subscriber_disabled() {
    let hook = SimulatedHook::new();
    let mut cfg = config(vec![], vec![snippet("omw", "on my way")]);
    cfg.settings.snippets_enabled = false;
    let (mut engine, invoker) = engine_with(&hook, cfg);
    engine.start().unwrap();

    hook.type_text("omw ");
    assert!(finish(engine, &invoker).is_empty());
}

#[test]
fn test_stop_uninstalls_and_restart_works() {
    let hook = SimulatedHook::new();
    let (mut engine, invoker) = engine_with(
        &hook,
        config(vec![hotkey("ctrl+alt+t", "run", "terminal", true)], vec![]),
    );
    engine.start().unwrap();
    engine.stop();

    assert_eq!(engine.state(), HookState::Stopped);
    assert!(!hook.is_installed());
    assert!(hook.claimed().is_empty());
    assert_eq!(hook.feed(&KeyEvent::char_down('t')), Verdict::Pass);

    engine.start().unwrap();
    assert_eq!(hook.install_count(), 2);
    hook.press_chord("ctrl+alt+t");
    assert_eq!(finish(engine, &invoker), vec![Call::Run("terminal".into())]);
}

#[test]
fn test_drop_stops_engine() {
    let hook = SimulatedHook::new();
    let (mut engine, _invoker) = engine_with(&hook, Config::default());
    engine.start().unwrap();
    assert!(hook.is_installed());
    drop(engine);
    assert!(!hook.is_installed());
}

#[test]
fn test_install_failure_leaves_engine_stopped() {
    let invoker = Arc::new(RecordingInvoker::default());
    let mut engine = HookEngine::new(
        UnsupportedHook,
        Box::new(Config::default()),
        invoker,
        &EngineSettings::default(),
    );
    let err = engine.start().unwrap_err();
    assert!(matches!(err, EngineError::Hook(HookError::Unsupported)));
    assert_eq!(engine.state(), HookState::Stopped);
}
