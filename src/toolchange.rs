//! Tool selection and tool-change bookkeeping.
//!
//! Two jobs: turn a tool selection into the reserved-tool-slot connection
//! source, and repair the probe-completed subscription that some host
//! tool-change sequences detach. Without the repair the interlock would
//! never re-arm after a tool change that probed the fixture.

use crate::config::RESERVED_PROBE_TOOL;
use crate::hooks::{HookKind, ObserverId, Subscriptions};
use crate::traits::ToolId;

/// Hooks that must stay subscribed across tool changes.
pub const REQUIRED_HOOKS: [HookKind; 1] = [HookKind::ProbeCompleted];

/// Tool-change coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToolChangeCoordinator {
    reserved_tool: ToolId,
    selected: Option<ToolId>,
    current: Option<ToolId>,
    repairs: u32,
}

impl Default for ToolChangeCoordinator {
    fn default() -> Self {
        Self::new(RESERVED_PROBE_TOOL)
    }
}

impl ToolChangeCoordinator {
    /// Coordinator treating `reserved_tool` as the probe.
    pub const fn new(reserved_tool: ToolId) -> Self {
        Self {
            reserved_tool,
            selected: None,
            current: None,
            repairs: 0,
        }
    }

    /// Tool number treated as the probe.
    pub fn reserved_tool(&self) -> ToolId {
        self.reserved_tool
    }

    /// Last selected tool.
    pub fn selected(&self) -> Option<ToolId> {
        self.selected
    }

    /// Tool in the spindle after the last completed change.
    pub fn current(&self) -> Option<ToolId> {
        self.current
    }

    /// Subscriptions put back so far.
    pub fn repairs(&self) -> u32 {
        self.repairs
    }

    /// Record a selection.
    ///
    /// Returns the reserved-tool-slot source value: `true` iff `tool` is the
    /// reserved probe tool and the convention is `enabled`.
    pub fn on_tool_selected(&mut self, tool: ToolId, enabled: bool) -> bool {
        self.selected = Some(tool);
        enabled && tool == self.reserved_tool
    }

    /// Record a completed change.
    pub fn on_tool_changed(&mut self, tool: ToolId) {
        self.current = Some(tool);
    }

    /// Re-subscribe `id` to every required hook it lost.
    ///
    /// Returns the number of subscriptions restored.
    pub fn ensure_subscribed(&mut self, subscriptions: &mut Subscriptions, id: ObserverId) -> u32 {
        let mut restored = 0;
        for kind in REQUIRED_HOOKS {
            if !subscriptions.is_subscribed(kind, id) && subscriptions.subscribe(kind, id) {
                restored += 1;
            }
        }
        self.repairs = self.repairs.saturating_add(restored);
        restored
    }
}
