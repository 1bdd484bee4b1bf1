//! Host event hooks as ordered observer chains.
//!
//! Host firmware usually exposes each event as a single function pointer
//! that every plugin overwrites after saving the previous value. Here each
//! event kind has an explicit chain of subscribed observers instead. An
//! observer registered later runs first and the earlier ones follow, which
//! is the order a saved-pointer chain produces, but nobody can lose the rest
//! of the chain by forgetting to call it.
//!
//! Observers receive a [`HookContext`] that gives them the host and the
//! subscription table, so an observer can check whether someone detached
//! one of its subscriptions and put it back.
//!
//! # Example
//!
//! ```rust
//! use probe_protect::hal::MockHost;
//! use probe_protect::hooks::{HookBus, HookContext, HookEvent, HookKind, HostHooks};
//!
//! #[derive(Default)]
//! struct Counter {
//!     resets: u32,
//! }
//!
//! impl HostHooks<MockHost> for Counter {
//!     fn on_event(&mut self, event: &HookEvent, _ctx: &mut HookContext<'_, MockHost>) -> bool {
//!         if let HookEvent::DriverReset = event {
//!             self.resets += 1;
//!         }
//!         true
//!     }
//! }
//!
//! let mut host = MockHost::new(4);
//! let mut bus = HookBus::new();
//! let id = bus.register(Counter::default(), &[HookKind::DriverReset]).unwrap();
//!
//! bus.dispatch(&HookEvent::DriverReset, &mut host, 0);
//! assert_eq!(bus.observer::<Counter>(id).unwrap().resets, 1);
//! ```

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::Any;

use crate::traits::{SpindleId, ToolId};

/// Maximum observers per event kind.
pub const MAX_OBSERVERS: usize = 8;

/// Host events this crate observes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// An intentional probing move is about to start.
    ProbeStart,
    /// A probing move finished.
    ProbeCompleted,
    /// Probing at the tool-setter fixture started or ended.
    ProbeFixture,
    /// A spindle was selected.
    SpindleSelect,
    /// A tool was selected (T word).
    ToolSelected,
    /// A tool change finished (M6).
    ToolChanged,
    /// Controller reset.
    DriverReset,
    /// `$I` style option report.
    ReportOptions,
    /// The host processed a probe-connected toggle.
    ConnectedToggle,
}

impl HookKind {
    /// Every kind, in table order.
    pub const ALL: [HookKind; 9] = [
        HookKind::ProbeStart,
        HookKind::ProbeCompleted,
        HookKind::ProbeFixture,
        HookKind::SpindleSelect,
        HookKind::ToolSelected,
        HookKind::ToolChanged,
        HookKind::DriverReset,
        HookKind::ReportOptions,
        HookKind::ConnectedToggle,
    ];

    const fn index(self) -> usize {
        self as usize
    }
}

/// A host event with its arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookEvent {
    /// See [`HookKind::ProbeStart`].
    ProbeStart,
    /// See [`HookKind::ProbeCompleted`].
    ProbeCompleted,
    /// See [`HookKind::ProbeFixture`].
    ProbeFixture {
        /// Selected tool when called from a tool change, `None` otherwise.
        tool: Option<ToolId>,
        /// Probing at the fixture position.
        at_fixture: bool,
        /// Probing starting (`true`) or finished.
        on: bool,
    },
    /// See [`HookKind::SpindleSelect`].
    SpindleSelect {
        /// Selected spindle.
        spindle: SpindleId,
    },
    /// See [`HookKind::ToolSelected`].
    ToolSelected {
        /// Selected tool.
        tool: ToolId,
    },
    /// See [`HookKind::ToolChanged`].
    ToolChanged {
        /// Tool now in the spindle.
        tool: ToolId,
    },
    /// See [`HookKind::DriverReset`].
    DriverReset,
    /// See [`HookKind::ReportOptions`].
    ReportOptions {
        /// Host is asking for new-style options only.
        newopt: bool,
    },
    /// See [`HookKind::ConnectedToggle`].
    ConnectedToggle,
}

impl HookEvent {
    /// Kind used for subscription lookup.
    pub fn kind(&self) -> HookKind {
        match self {
            HookEvent::ProbeStart => HookKind::ProbeStart,
            HookEvent::ProbeCompleted => HookKind::ProbeCompleted,
            HookEvent::ProbeFixture { .. } => HookKind::ProbeFixture,
            HookEvent::SpindleSelect { .. } => HookKind::SpindleSelect,
            HookEvent::ToolSelected { .. } => HookKind::ToolSelected,
            HookEvent::ToolChanged { .. } => HookKind::ToolChanged,
            HookEvent::DriverReset => HookKind::DriverReset,
            HookEvent::ReportOptions { .. } => HookKind::ReportOptions,
            HookEvent::ConnectedToggle => HookKind::ConnectedToggle,
        }
    }
}

/// Handle of a registered observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(u8);

impl ObserverId {
    /// Registration index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

type Chain = heapless::Vec<ObserverId, MAX_OBSERVERS>;

/// Which observers are subscribed to which event kind.
#[derive(Clone, Debug, Default)]
pub struct Subscriptions {
    chains: [Chain; HookKind::ALL.len()],
}

impl Subscriptions {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `id` to `kind`. Returns `false` if the chain is full.
    pub fn subscribe(&mut self, kind: HookKind, id: ObserverId) -> bool {
        let chain = &mut self.chains[kind.index()];
        match chain.binary_search(&id) {
            Ok(_) => true,
            Err(pos) => chain.insert(pos, id).is_ok(),
        }
    }

    /// Remove `id` from `kind`. Returns `true` if it was subscribed.
    pub fn detach(&mut self, kind: HookKind, id: ObserverId) -> bool {
        let chain = &mut self.chains[kind.index()];
        match chain.binary_search(&id) {
            Ok(pos) => {
                chain.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Remove every observer from `kind`.
    pub fn clear(&mut self, kind: HookKind) {
        self.chains[kind.index()].clear();
    }

    /// Whether `id` is subscribed to `kind`.
    pub fn is_subscribed(&self, kind: HookKind, id: ObserverId) -> bool {
        self.chains[kind.index()].binary_search(&id).is_ok()
    }

    /// Observers subscribed to `kind`, oldest first.
    pub fn chain(&self, kind: HookKind) -> &[ObserverId] {
        &self.chains[kind.index()]
    }
}

/// What an observer can reach while handling an event.
pub struct HookContext<'a, H> {
    /// The host controller.
    pub host: &'a mut H,
    /// Subscription table, mutable so observers can repair their wiring.
    pub subscriptions: &'a mut Subscriptions,
    /// Dispatch time.
    pub now_ms: u64,
    /// Id of the observer being called.
    pub observer: ObserverId,
}

/// A plugin observing host events.
///
/// `on_event` returns the observer's verdict for events that have one
/// (fixture probing, spindle select); the bus ANDs the verdicts of the
/// whole chain. Return `true` when the event carries no verdict.
pub trait HostHooks<H> {
    /// Handle one event.
    fn on_event(&mut self, event: &HookEvent, ctx: &mut HookContext<'_, H>) -> bool;
}

/// Object-safe, downcastable form of [`HostHooks`].
///
/// Implemented for every `HostHooks<H> + 'static`; use [`HookBus`] instead
/// of naming it.
pub trait HostHooksDyn<H> {
    /// See [`HostHooks::on_event`].
    fn on_event(&mut self, event: &HookEvent, ctx: &mut HookContext<'_, H>) -> bool;
    /// Upcast for downcasting.
    fn as_any(&self) -> &dyn Any;
    /// Upcast for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<H, T: HostHooks<H> + 'static> HostHooksDyn<H> for T {
    fn on_event(&mut self, event: &HookEvent, ctx: &mut HookContext<'_, H>) -> bool {
        HostHooks::on_event(self, event, ctx)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Registered observers and their subscriptions.
pub struct HookBus<H> {
    observers: Vec<Box<dyn HostHooksDyn<H>>>,
    subscriptions: Subscriptions,
}

impl<H> Default for HookBus<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> core::fmt::Debug for HookBus<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HookBus")
            .field("observers", &self.observers.len())
            .field("subscriptions", &self.subscriptions)
            .finish()
    }
}

impl<H> HookBus<H> {
    /// No observers.
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
            subscriptions: Subscriptions::new(),
        }
    }

    /// Register `observer` on `kinds`.
    ///
    /// Returns `None` when the id space or a chain is exhausted; in that
    /// case nothing is registered.
    pub fn register<T>(&mut self, observer: T, kinds: &[HookKind]) -> Option<ObserverId>
    where
        T: HostHooks<H> + 'static,
    {
        let id = ObserverId(u8::try_from(self.observers.len()).ok()?);
        if kinds
            .iter()
            .any(|kind| self.subscriptions.chain(*kind).len() >= MAX_OBSERVERS)
        {
            return None;
        }
        for kind in kinds {
            self.subscriptions.subscribe(*kind, id);
        }
        self.observers.push(Box::new(observer));
        Some(id)
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Subscription table.
    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    /// Subscription table, for hosts that rewire hooks (tool-change code).
    pub fn subscriptions_mut(&mut self) -> &mut Subscriptions {
        &mut self.subscriptions
    }

    /// Deliver `event` down its chain, newest observer first.
    ///
    /// Returns the AND of every verdict, `true` for an empty chain.
    pub fn dispatch(&mut self, event: &HookEvent, host: &mut H, now_ms: u64) -> bool {
        // Copy so observers can rewire the table while the chain runs
        let chain: Chain = self.subscriptions.chain(event.kind()).iter().copied().collect();
        let mut verdict = true;
        for id in chain.iter().rev() {
            let Some(observer) = self.observers.get_mut(id.index()) else {
                continue;
            };
            let mut ctx = HookContext {
                host: &mut *host,
                subscriptions: &mut self.subscriptions,
                now_ms,
                observer: *id,
            };
            verdict &= observer.on_event(event, &mut ctx);
        }
        verdict
    }

    /// Borrow a registered observer as its concrete type.
    pub fn observer<T: 'static>(&self, id: ObserverId) -> Option<&T> {
        self.observers.get(id.index())?.as_any().downcast_ref()
    }

    /// Mutably borrow a registered observer as its concrete type.
    pub fn observer_mut<T: 'static>(&mut self, id: ObserverId) -> Option<&mut T> {
        self.observers
            .get_mut(id.index())?
            .as_any_mut()
            .downcast_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[derive(Default)]
    struct Host {
        log: Vec<(u8, HookKind)>,
    }

    struct Recorder {
        tag: u8,
        verdict: bool,
    }

    impl HostHooks<Host> for Recorder {
        fn on_event(&mut self, event: &HookEvent, ctx: &mut HookContext<'_, Host>) -> bool {
            ctx.host.log.push((self.tag, event.kind()));
            self.verdict
        }
    }

    /// Detaches everyone else from ProbeCompleted when a tool change runs.
    struct Detacher;

    impl HostHooks<Host> for Detacher {
        fn on_event(&mut self, _event: &HookEvent, ctx: &mut HookContext<'_, Host>) -> bool {
            ctx.subscriptions.clear(HookKind::ProbeCompleted);
            true
        }
    }

    fn recorder(tag: u8) -> Recorder {
        Recorder { tag, verdict: true }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    #[test]
    fn subscribe_keeps_registration_order() {
        let mut subs = Subscriptions::new();
        assert!(subs.subscribe(HookKind::ToolChanged, ObserverId(2)));
        assert!(subs.subscribe(HookKind::ToolChanged, ObserverId(0)));
        assert!(subs.subscribe(HookKind::ToolChanged, ObserverId(2)));
        assert_eq!(
            subs.chain(HookKind::ToolChanged),
            &[ObserverId(0), ObserverId(2)]
        );
    }

    #[test]
    fn detach_and_resubscribe() {
        let mut subs = Subscriptions::new();
        subs.subscribe(HookKind::ProbeCompleted, ObserverId(1));
        assert!(subs.detach(HookKind::ProbeCompleted, ObserverId(1)));
        assert!(!subs.detach(HookKind::ProbeCompleted, ObserverId(1)));
        assert!(!subs.is_subscribed(HookKind::ProbeCompleted, ObserverId(1)));

        subs.subscribe(HookKind::ProbeCompleted, ObserverId(1));
        assert!(subs.is_subscribed(HookKind::ProbeCompleted, ObserverId(1)));
    }

    #[test]
    fn chain_capacity() {
        let mut subs = Subscriptions::new();
        for i in 0..MAX_OBSERVERS as u8 {
            assert!(subs.subscribe(HookKind::DriverReset, ObserverId(i)));
        }
        assert!(!subs.subscribe(HookKind::DriverReset, ObserverId(200)));
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    #[test]
    fn newest_observer_runs_first() {
        let mut host = Host::default();
        let mut bus = HookBus::new();
        bus.register(recorder(1), &[HookKind::DriverReset]);
        bus.register(recorder(2), &[HookKind::DriverReset]);
        bus.register(recorder(3), &[HookKind::ProbeStart]);

        assert!(bus.dispatch(&HookEvent::DriverReset, &mut host, 0));
        assert_eq!(
            host.log,
            vec![(2, HookKind::DriverReset), (1, HookKind::DriverReset)]
        );
    }

    #[test]
    fn verdicts_are_anded() {
        let mut host = Host::default();
        let mut bus = HookBus::new();
        bus.register(recorder(1), &[HookKind::SpindleSelect]);
        bus.register(
            Recorder {
                tag: 2,
                verdict: false,
            },
            &[HookKind::SpindleSelect],
        );

        let event = HookEvent::SpindleSelect { spindle: 0 };
        assert!(!bus.dispatch(&event, &mut host, 0));
        // Whole chain still ran
        assert_eq!(host.log.len(), 2);
    }

    #[test]
    fn empty_chain_is_true() {
        let mut host = Host::default();
        let mut bus: HookBus<Host> = HookBus::new();
        assert!(bus.is_empty());
        assert!(bus.dispatch(&HookEvent::ProbeCompleted, &mut host, 0));
    }

    #[test]
    fn observer_can_rewire_during_dispatch() {
        let mut host = Host::default();
        let mut bus = HookBus::new();
        let rec = bus
            .register(recorder(1), &[HookKind::ProbeCompleted, HookKind::ToolChanged])
            .unwrap();
        bus.register(Detacher, &[HookKind::ToolChanged]);

        bus.dispatch(&HookEvent::ToolChanged { tool: 1 }, &mut host, 0);
        assert!(!bus.subscriptions().is_subscribed(HookKind::ProbeCompleted, rec));

        bus.dispatch(&HookEvent::ProbeCompleted, &mut host, 0);
        assert_eq!(host.log, vec![(1, HookKind::ToolChanged)]);
    }

    #[test]
    fn downcast_registered_observer() {
        let mut bus: HookBus<Host> = HookBus::new();
        let id = bus.register(recorder(7), &[]).unwrap();
        assert_eq!(bus.observer::<Recorder>(id).map(|r| r.tag), Some(7));
        assert!(bus.observer::<Detacher>(id).is_none());

        if let Some(r) = bus.observer_mut::<Recorder>(id) {
            r.tag = 8;
        }
        assert_eq!(bus.observer::<Recorder>(id).map(|r| r.tag), Some(8));
    }

    #[test]
    fn event_kinds_match_table() {
        for (i, kind) in HookKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
        assert_eq!(
            HookEvent::ProbeFixture {
                tool: None,
                at_fixture: true,
                on: true
            }
            .kind(),
            HookKind::ProbeFixture
        );
    }
}
