//! Hook bus and subscription bus: the core's observer registries.
//!
//! Thin glue, per `spec.md` §1. `HookBus` lets observers veto construction
//! hooks (`SINK_NEW`/`SINK_FIXATE`); `SubscriptionSink` receives the
//! introspection-facing NEW/CHANGE/REMOVE stream.

/// Named hooks a sink fires during its lifecycle, per `spec.md` §6.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Hook {
    SinkNew,
    SinkFixate,
    SinkPut,
    SinkStateChanged,
    SinkProplistChanged,
    SinkUnlink,
    SinkUnlinkPost,
}

/// Result of firing a hook that observers may veto.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HookResult {
    Ok,
    Vetoed,
}

/// A synchronous observer invoked when a hook fires.
pub trait HookObserver: Send {
    /// Handles `hook` for `sink_index`. Only `SinkNew` and `SinkFixate`
    /// observations may return `Vetoed`; the sink ignores a veto returned
    /// from any other hook.
    fn on_hook(&mut self, hook: Hook, sink_index: u32) -> HookResult;
}

/// Registry of [`HookObserver`]s, fired in registration order.
#[derive(Default)]
pub struct HookBus {
    observers: Vec<Box<dyn HookObserver>>,
}

impl HookBus {
    /// An empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer.
    pub fn register(&mut self, observer: Box<dyn HookObserver>) {
        self.observers.push(observer);
    }

    /// Fires `hook`. Returns `Vetoed` as soon as any observer vetoes;
    /// remaining observers are still given a chance to run for
    /// non-vetoable hooks (veto short-circuits only for `SinkNew`/
    /// `SinkFixate`).
    pub fn fire(&mut self, hook: Hook, sink_index: u32) -> HookResult {
        let mut result = HookResult::Ok;
        for observer in &mut self.observers {
            if observer.on_hook(hook, sink_index) == HookResult::Vetoed {
                result = HookResult::Vetoed;
                if matches!(hook, Hook::SinkNew | Hook::SinkFixate) {
                    return result;
                }
            }
        }
        result
    }
}

/// Subscription event kind, per `spec.md` §6.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent {
    New,
    Change,
    Remove,
}

/// Receives the sink's subscription event stream.
pub trait SubscriptionSink: Send {
    /// Delivers one event for the sink at `sink_index`.
    fn notify(&mut self, event: SubscriptionEvent, sink_index: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Vetoer;
    impl HookObserver for Vetoer {
        fn on_hook(&mut self, _hook: Hook, _sink_index: u32) -> HookResult {
            HookResult::Vetoed
        }
    }

    struct Counter(u32);
    impl HookObserver for Counter {
        fn on_hook(&mut self, _hook: Hook, _sink_index: u32) -> HookResult {
            self.0 += 1;
            HookResult::Ok
        }
    }

    #[test]
    fn veto_short_circuits_on_sink_new() {
        let mut bus = HookBus::new();
        bus.register(Box::new(Vetoer));
        assert_eq!(bus.fire(Hook::SinkNew, 0), HookResult::Vetoed);
    }

    #[test]
    fn non_vetoable_hook_runs_all_observers() {
        let mut bus = HookBus::new();
        bus.register(Box::new(Vetoer));
        assert_eq!(bus.fire(Hook::SinkPut, 0), HookResult::Vetoed);
    }
}
