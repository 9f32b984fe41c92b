//! Signal core configuration
//!
//! Build-time choices come from cargo features (`sig-default` and the
//! per-group `sig*-action` switches); a `SignalConfig` captures them once
//! and can be adjusted before the core is created.

use super::action::DefaultActions;
use super::constants::SIGQUEUE_DEPTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalConfig {
    /// Which signals run their category default action
    pub default_actions: DefaultActions,
    /// Maximum queued instances per task
    pub queue_depth: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        SignalConfig {
            default_actions: DefaultActions::from_features(),
            queue_depth: SIGQUEUE_DEPTH,
        }
    }
}

impl SignalConfig {
    /// Enable the default action of one signal
    pub fn with_default_action(mut self, sig: u32) -> Self {
        self.default_actions.enable(sig);
        self
    }

    /// Demote one signal's default action to Ignore
    pub fn without_default_action(mut self, sig: u32) -> Self {
        self.default_actions.disable(sig);
        self
    }

    pub fn with_default_actions(mut self, actions: DefaultActions) -> Self {
        self.default_actions = actions;
        self
    }

    /// A depth of zero is raised to one so a task can always hold an instance
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }
}
