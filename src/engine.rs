//! Global hook engine.
//!
//! Ties the pieces of the system together:
//! - `HookBackend`: the single OS keyboard hook
//! - `HotkeyDispatcher`: registered-trigger table and suppression
//! - `SnippetMatcher`: typed-character buffer and trigger detection
//! - `ActionWorker`: runs matched actions off the hook thread
//!
//! # Architecture
//!
//! Every key event reaches one callback that runs synchronously on the hook
//! thread. It updates the held-key set, asks the dispatcher whether the held
//! keys form a registered trigger, feeds key-downs to the snippet matcher, and
//! returns a verdict. Matched work is queued for the worker; the callback never
//! performs an action itself.
//!
//! `reload()` builds new tables outside the lock and swaps them in under the
//! same lock the callback takes, so an event never sees a half-built table.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::actions::ActionInvoker;
use crate::config::{BindingSource, EngineSettings};
use crate::error::{panic_message, EngineError};
use crate::hook::{HookBackend, KeyDirection, KeyEvent, KeySink, KeyStateFn, Verdict};
use crate::hotkeys::{bindings_from_records, HotkeyBinding, HotkeyDispatcher, SkippedBinding};
use crate::snippets::{build_table, SnippetMatcher};
use crate::trigger::{KeyToken, Trigger};
use crate::worker::{ActionJob, ActionQueue, ActionWorker};

/// Engine lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookState {
    Stopped,
    Running,
}

/// What `start()` or `reload()` registered.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    /// Distinct registered triggers in canonical order.
    pub registered: Vec<Trigger>,
    /// Records rejected for a bad trigger, unknown type or conflict.
    pub skipped: Vec<SkippedBinding>,
    pub snippet_count: usize,
}

/// State shared with the hook callback.
struct EngineCore {
    dispatcher: HotkeyDispatcher,
    matcher: SnippetMatcher,
    held: BTreeSet<KeyToken>,
    /// Keys whose key-down was swallowed; their key-up is swallowed too.
    suppressed: HashSet<KeyToken>,
    key_state: Option<KeyStateFn>,
    hotkeys_enabled: bool,
    snippets_enabled: bool,
}

impl EngineCore {
    fn new(settings: &EngineSettings) -> Self {
        Self {
            dispatcher: HotkeyDispatcher::new(),
            matcher: SnippetMatcher::new(),
            held: BTreeSet::new(),
            suppressed: HashSet::new(),
            key_state: None,
            hotkeys_enabled: settings.hotkeys_enabled,
            snippets_enabled: settings.snippets_enabled,
        }
    }

    fn reset_input(&mut self) {
        self.held.clear();
        self.suppressed.clear();
        self.matcher.clear_buffer();
    }

    fn handle(&mut self, event: &KeyEvent) -> (Verdict, Vec<ActionJob>) {
        match event.direction {
            KeyDirection::Down => self.key_down(event),
            KeyDirection::Up => {
                self.held.remove(&event.key);
                let verdict = if self.suppressed.remove(&event.key) {
                    Verdict::Suppress
                } else {
                    Verdict::Pass
                };
                (verdict, Vec::new())
            }
        }
    }

    /// Forget held keys that are no longer physically down; their key-up
    /// never reached the hook.
    fn drop_released_keys(&mut self, current: &KeyToken) {
        let Some(is_down) = &self.key_state else {
            return;
        };
        let before = self.held.len();
        self.held.retain(|key| key == current || is_down(key));
        if self.held.len() != before {
            debug!(dropped = before - self.held.len(), "Dropped held keys with missed key-ups");
            let held = &self.held;
            self.suppressed.retain(|key| held.contains(key));
        }
    }

    fn key_down(&mut self, event: &KeyEvent) -> (Verdict, Vec<ActionJob>) {
        self.drop_released_keys(&event.key);
        let repeat = !self.held.insert(event.key.clone());

        // A swallowed key stays swallowed until its key-up, even if the rest
        // of the chord was released first.
        if repeat && self.suppressed.contains(&event.key) {
            trace!(key = %event.key, "Auto-repeat of suppressed key");
            return (Verdict::Suppress, Vec::new());
        }

        let mut verdict = Verdict::Pass;
        let mut jobs = Vec::new();

        if self.hotkeys_enabled {
            if let Some(dispatch) = self.dispatcher.lookup(self.held.iter()) {
                let trigger = Trigger::from_tokens(self.held.iter().cloned()).format();
                if repeat {
                    trace!(trigger = %trigger, "Auto-repeat of held hotkey");
                } else {
                    debug!(
                        trigger = %trigger,
                        suppress = dispatch.suppress,
                        action_count = dispatch.actions.len(),
                        "Hotkey fired"
                    );
                    jobs.extend(dispatch.actions.into_iter().map(|action| ActionJob::Hotkey {
                        trigger: trigger.clone(),
                        action,
                    }));
                }
                if dispatch.suppress {
                    verdict = Verdict::Suppress;
                    self.suppressed.insert(event.key.clone());
                }
            }
        }

        if self.snippets_enabled {
            if verdict.is_suppress() {
                // The focused app never sees this key, so it cannot be part of a typed word.
                self.matcher.clear_buffer();
            } else {
                let chorded = self.held.iter().any(KeyToken::is_chord_modifier);
                if let Some(expansion) = self.matcher.on_key(event, chorded) {
                    debug!(erase_count = expansion.erase_count, "Snippet trigger matched");
                    jobs.push(ActionJob::Replace(expansion));
                }
            }
        }

        (verdict, jobs)
    }
}

/// Tables built from one read of the binding source.
struct Tables {
    dispatcher: HotkeyDispatcher,
    snippets: HashMap<String, String>,
    report: RegistrationReport,
}

/// The global input-interception engine.
///
/// Owns the hook backend; dropping the engine stops it and joins the action
/// worker after queued actions finish.
pub struct HookEngine<B: HookBackend> {
    backend: B,
    source: Box<dyn BindingSource>,
    core: Arc<Mutex<EngineCore>>,
    worker: ActionWorker,
    state: HookState,
    last_report: RegistrationReport,
}

impl<B: HookBackend> HookEngine<B> {
    pub fn new(
        backend: B,
        source: Box<dyn BindingSource>,
        invoker: Arc<dyn ActionInvoker>,
        settings: &EngineSettings,
    ) -> Self {
        Self {
            backend,
            source,
            core: Arc::new(Mutex::new(EngineCore::new(settings))),
            worker: ActionWorker::spawn(invoker, settings.action_queue_capacity),
            state: HookState::Stopped,
            last_report: RegistrationReport::default(),
        }
    }

    pub fn state(&self) -> HookState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == HookState::Running
    }

    /// Load bindings, claim triggers and install the hook.
    ///
    /// Calling `start()` while running does nothing and returns the report
    /// from the original start.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> Result<RegistrationReport, EngineError> {
        if self.is_running() {
            debug!("Engine already running");
            return Ok(self.last_report.clone());
        }

        info!("Starting hook engine");
        let tables = self.build_tables();
        {
            let mut core = self.core.lock();
            core.dispatcher = tables.dispatcher;
            core.matcher.replace_table(tables.snippets);
            core.key_state = self.backend.key_state();
            core.reset_input();
        }

        let sink = make_sink(Arc::clone(&self.core), self.worker.queue());
        if let Err(e) = self.backend.install(sink) {
            error!(error = %e, "Failed to install keyboard hook");
            self.backend.release_all();
            return Err(e.into());
        }

        self.state = HookState::Running;
        self.last_report = tables.report;
        info!(
            hotkey_count = self.last_report.registered.len(),
            skipped_count = self.last_report.skipped.len(),
            snippet_count = self.last_report.snippet_count,
            "Hook engine running"
        );
        Ok(self.last_report.clone())
    }

    /// Re-read bindings and swap the tables without reinstalling the hook.
    #[instrument(skip(self))]
    pub fn reload(&mut self) -> Result<RegistrationReport, EngineError> {
        if !self.is_running() {
            return Err(EngineError::NotRunning);
        }

        self.backend.release_all();
        let tables = self.build_tables();
        {
            let mut core = self.core.lock();
            core.dispatcher = tables.dispatcher;
            core.matcher.replace_table(tables.snippets);
        }

        self.last_report = tables.report;
        info!(
            hotkey_count = self.last_report.registered.len(),
            snippet_count = self.last_report.snippet_count,
            "Bindings reloaded"
        );
        Ok(self.last_report.clone())
    }

    /// Uninstall the hook. Actions already queued still run.
    #[instrument(skip(self))]
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        self.backend.uninstall();
        self.backend.release_all();
        self.core.lock().reset_input();
        self.state = HookState::Stopped;
        info!("Hook engine stopped");
    }

    pub fn set_hotkeys_enabled(&self, enabled: bool) {
        let mut core = self.core.lock();
        core.hotkeys_enabled = enabled;
        if !enabled {
            core.suppressed.clear();
        }
        info!(enabled, "Hotkey subscriber toggled");
    }

    pub fn set_snippets_enabled(&self, enabled: bool) {
        let mut core = self.core.lock();
        core.snippets_enabled = enabled;
        core.matcher.clear_buffer();
        info!(enabled, "Snippet subscriber toggled");
    }

    pub fn hotkeys_enabled(&self) -> bool {
        self.core.lock().hotkeys_enabled
    }

    pub fn snippets_enabled(&self) -> bool {
        self.core.lock().snippets_enabled
    }

    pub fn last_report(&self) -> &RegistrationReport {
        &self.last_report
    }

    /// Registered triggers in canonical order.
    pub fn registered_triggers(&self) -> Vec<Trigger> {
        self.core
            .lock()
            .dispatcher
            .triggers()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Active snippet triggers (lowercase) in sorted order.
    pub fn snippet_triggers(&self) -> Vec<String> {
        self.core
            .lock()
            .matcher
            .triggers()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn build_tables(&mut self) -> Tables {
        // One read, so hotkeys and snippets come from the same config version.
        let (hotkey_records, snippet_records) = self.source.bindings();
        let (bindings, mut skipped) = bindings_from_records(&hotkey_records);

        // Claim outcome per distinct trigger; `Some(reason)` means refused.
        let mut claims: HashMap<Trigger, Option<String>> = HashMap::new();
        let mut accepted: Vec<HotkeyBinding> = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let refusal = claims
                .entry(binding.trigger.clone())
                .or_insert_with(|| match self.backend.claim(&binding.trigger) {
                    Ok(()) => None,
                    Err(e) => {
                        warn!(trigger = %binding.trigger, error = %e, "Hotkey not registered");
                        Some(e.to_string())
                    }
                })
                .clone();
            match refusal {
                None => accepted.push(binding),
                Some(reason) => skipped.push(SkippedBinding {
                    trigger: binding.trigger.format(),
                    reason,
                }),
            }
        }

        let dispatcher = HotkeyDispatcher::from_bindings(accepted);
        let snippets = build_table(&snippet_records);
        let report = RegistrationReport {
            registered: dispatcher.triggers().into_iter().cloned().collect(),
            skipped,
            snippet_count: snippets.len(),
        };

        Tables {
            dispatcher,
            snippets,
            report,
        }
    }
}

impl<B: HookBackend> Drop for HookEngine<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Build the hook callback. Nothing escapes it: injected events pass
/// untouched and a panic becomes a pass-through verdict.
fn make_sink(core: Arc<Mutex<EngineCore>>, queue: ActionQueue) -> KeySink {
    Arc::new(move |event: &KeyEvent| {
        if event.injected {
            return Verdict::Pass;
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| core.lock().handle(event)));
        match outcome {
            Ok((verdict, jobs)) => {
                for job in jobs {
                    queue.submit(job);
                }
                verdict
            }
            Err(payload) => {
                error!(
                    key = %event.key,
                    panic = %panic_message(payload.as_ref()),
                    "Hook callback panicked, passing event through"
                );
                Verdict::Pass
            }
        }
    })
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
