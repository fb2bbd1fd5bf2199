use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::debug;

use super::{ModeRegistry, ResolvedMode};

/// Maximum number of transition log entries kept.
pub const TRANSITION_LOG_CAPACITY: usize = 20;

/// One mode transition, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionEntry {
    pub from: String,
    pub to: String,
    pub action: String,
    /// Wall clock, milliseconds since the Unix epoch
    pub timestamp: u64,
    /// Tool names sent with the transition
    pub tools: Vec<String>,
}

/// Mode state for one call.
///
/// `previous` holds at most one level of history: exiting always returns to
/// the mode that was active before the most recent distinct entry, and a
/// second exit falls back to the initial mode.
pub struct ModeMachine<C> {
    registry: Arc<ModeRegistry<C>>,
    initial: String,
    active: String,
    previous: Option<String>,
    log: VecDeque<TransitionEntry>,
}

impl<C> ModeMachine<C> {
    pub fn new(registry: Arc<ModeRegistry<C>>, initial: impl Into<String>) -> Self {
        let initial = initial.into();
        Self {
            registry,
            active: initial.clone(),
            initial,
            previous: None,
            log: VecDeque::with_capacity(TRANSITION_LOG_CAPACITY),
        }
    }

    pub fn active(&self) -> &str {
        &self.active
    }

    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    pub fn initial(&self) -> &str {
        &self.initial
    }

    /// Return to the initial mode with no history and an empty log.
    pub fn reset(&mut self) {
        self.active = self.initial.clone();
        self.previous = None;
        self.log.clear();
    }

    /// Resolve the active mode without recording a transition.
    pub fn resolve_active(&self, ctx: &C) -> ResolvedMode {
        self.resolve(&self.active, ctx)
    }

    /// Mode id an exit would return to.
    pub fn exit_target(&self) -> &str {
        self.previous.as_deref().unwrap_or(&self.initial)
    }

    /// Enter `target`, returning what has to be sent to the remote side.
    pub fn enter(
        &mut self,
        target: &str,
        save_previous: bool,
        action: &str,
        ctx: &C,
    ) -> ResolvedMode {
        let resolved = self.resolve(target, ctx);
        self.apply_enter(resolved, save_previous, action)
    }

    /// Leave the current mode for the remembered previous one (or the initial mode).
    pub fn exit(&mut self, action: &str, ctx: &C) -> ResolvedMode {
        let resolved = self.resolve(self.exit_target(), ctx);
        self.apply_exit(resolved, action)
    }

    /// Re-resolve the active mode for a changed context.
    pub fn refresh(&mut self, action: &str, ctx: &C) -> ResolvedMode {
        let resolved = self.resolve(&self.active, ctx);
        self.apply_refresh(resolved, action)
    }

    /// Record entry into an already resolved mode.
    pub fn apply_enter(
        &mut self,
        resolved: ResolvedMode,
        save_previous: bool,
        action: &str,
    ) -> ResolvedMode {
        if save_previous && resolved.id != self.active {
            self.previous = Some(self.active.clone());
        }
        self.transition(resolved, action)
    }

    /// Record an exit into an already resolved mode and clear the history.
    pub fn apply_exit(&mut self, resolved: ResolvedMode, action: &str) -> ResolvedMode {
        self.previous = None;
        self.transition(resolved, action)
    }

    /// Record a refresh of the active mode.
    pub fn apply_refresh(&mut self, resolved: ResolvedMode, action: &str) -> ResolvedMode {
        self.transition(resolved, action)
    }

    /// Transition log, oldest first.
    pub fn log(&self) -> Vec<TransitionEntry> {
        self.log.iter().cloned().collect()
    }

    fn resolve(&self, id: &str, ctx: &C) -> ResolvedMode {
        self.registry.resolve_or(id, &self.initial, ctx)
    }

    fn transition(&mut self, resolved: ResolvedMode, action: &str) -> ResolvedMode {
        let entry = TransitionEntry {
            from: self.active.clone(),
            to: resolved.id.clone(),
            action: action.to_string(),
            timestamp: now_millis(),
            tools: resolved.tool_names(),
        };
        debug!(from = %entry.from, to = %entry.to, action = %entry.action, "Mode transition");

        if self.log.len() == TRANSITION_LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(entry);
        self.active = resolved.id.clone();
        resolved
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::modes::Mode;
    use crate::core::protocol::ToolSchema;
    use serde_json::json;

    struct Ctx {
        topic: String,
    }

    fn ctx() -> Ctx {
        Ctx {
            topic: "fractions".to_string(),
        }
    }

    fn machine() -> ModeMachine<Ctx> {
        let registry = ModeRegistry::new()
            .with_mode(Mode::fixed("main", "Main instructions", vec![]))
            .with_mode(Mode::new(
                "quiz",
                |c: &Ctx| format!("Quiz about {}", c.topic),
                |_| vec![ToolSchema::function("answer", "Check answer", json!({}))],
            ))
            .with_mode(Mode::fixed("hint", "Give a hint", vec![]));
        ModeMachine::new(Arc::new(registry), "main")
    }

    #[test]
    fn test_enter_resolves_target() {
        let mut m = machine();
        let resolved = m.enter("quiz", true, "enter", &ctx());

        assert_eq!(resolved.instructions, "Quiz about fractions");
        assert_eq!(m.active(), "quiz");
        assert_eq!(m.previous(), Some("main"));
    }

    #[test]
    fn test_single_level_history() {
        let mut m = machine();
        m.enter("quiz", true, "enter", &ctx());
        m.enter("hint", true, "enter", &ctx());

        let back = m.exit("exit", &ctx());
        assert_eq!(back.id, "quiz");
        assert_eq!(m.active(), "quiz");
        assert_eq!(m.previous(), None);

        // Second exit does not unwind further history
        let back = m.exit("exit", &ctx());
        assert_eq!(back.id, "main");
    }

    #[test]
    fn test_reentering_same_mode_keeps_previous() {
        let mut m = machine();
        m.enter("quiz", true, "enter", &ctx());
        m.enter("quiz", true, "enter", &ctx());
        assert_eq!(m.previous(), Some("main"));
    }

    #[test]
    fn test_enter_without_saving_previous() {
        let mut m = machine();
        m.enter("quiz", true, "enter", &ctx());
        m.enter("hint", false, "enter", &ctx());
        assert_eq!(m.previous(), Some("main"));
        assert_eq!(m.exit("exit", &ctx()).id, "main");
    }

    #[test]
    fn test_exit_with_no_history_goes_to_initial() {
        let mut m = machine();
        assert_eq!(m.exit("exit", &ctx()).id, "main");
    }

    #[test]
    fn test_refresh_keeps_history() {
        let mut m = machine();
        m.enter("quiz", true, "enter", &ctx());
        let resolved = m.refresh(
            "refresh",
            &Ctx {
                topic: "decimals".to_string(),
            },
        );
        assert_eq!(resolved.instructions, "Quiz about decimals");
        assert_eq!(m.previous(), Some("main"));
    }

    #[test]
    fn test_unknown_mode_falls_back_to_initial() {
        let mut m = machine();
        m.enter("quiz", true, "enter", &ctx());
        let resolved = m.enter("nope", true, "enter", &ctx());

        assert_eq!(resolved.id, "main");
        assert_eq!(resolved.instructions, "Main instructions");
        assert_eq!(m.active(), "main");
    }

    #[test]
    fn test_log_is_bounded() {
        let mut m = machine();
        for i in 0..25 {
            let target = if i % 2 == 0 { "quiz" } else { "main" };
            m.enter(target, true, "enter", &ctx());
        }
        let log = m.log();
        assert_eq!(log.len(), TRANSITION_LOG_CAPACITY);
        // Oldest five dropped; entry 5 entered "main" from "quiz"
        assert_eq!(log[0].from, "quiz");
        assert_eq!(log[0].to, "main");
        assert_eq!(log.last().unwrap().to, "quiz");
    }

    #[test]
    fn test_log_records_tools_and_action() {
        let mut m = machine();
        m.enter("quiz", true, "tool:start_quiz", &ctx());
        let entry = &m.log()[0];
        assert_eq!(entry.action, "tool:start_quiz");
        assert_eq!(entry.tools, vec!["answer".to_string()]);
        assert!(entry.timestamp > 0);
    }

    #[test]
    fn test_exit_target_follows_history() {
        let mut m = machine();
        assert_eq!(m.exit_target(), "main");

        m.enter("quiz", true, "enter", &ctx());
        m.enter("hint", true, "enter", &ctx());
        assert_eq!(m.exit_target(), "quiz");

        let resolved = m.registry.resolve_or("quiz", "main", &ctx());
        m.apply_exit(resolved, "exit");
        assert_eq!(m.active(), "quiz");
        assert_eq!(m.exit_target(), "main");
    }

    #[test]
    fn test_reset() {
        let mut m = machine();
        m.enter("quiz", true, "enter", &ctx());
        m.reset();
        assert_eq!(m.active(), "main");
        assert_eq!(m.previous(), None);
        assert!(m.log().is_empty());
    }
}
