//! Minimal stand-ins for the core's name registry and index allocator.
//!
//! Thin glue, as `spec.md` §1 describes — this crate owns just enough of
//! `pa_namereg`/`pa_idxset` to make `Sink::new` self-contained.

use std::collections::HashSet;

/// Collision policy when a requested name is already taken, mirroring
/// `pa_namereg_fail`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NameregFail {
    /// Fail outright on collision.
    Fail,
    /// Pick a unique variant (`name`, `name.2`, `name.3`, ...).
    Rename,
}

/// Registers unique names within a namespace ("sink", "source", ...).
#[derive(Default)]
pub struct NameRegistry {
    taken: HashSet<String>,
}

impl NameRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name`, applying `fail` on collision. Returns the name
    /// actually registered, or `None` on an unresolvable collision.
    pub fn register(&mut self, name: &str, fail: NameregFail) -> Option<String> {
        if !self.taken.contains(name) {
            self.taken.insert(name.to_string());
            return Some(name.to_string());
        }

        match fail {
            NameregFail::Fail => None,
            NameregFail::Rename => {
                let mut n = 2;
                loop {
                    let candidate = format!("{name}.{n}");
                    if !self.taken.contains(&candidate) {
                        self.taken.insert(candidate.clone());
                        return Some(candidate);
                    }
                    n += 1;
                }
            }
        }
    }

    /// Releases a previously registered name.
    pub fn unregister(&mut self, name: &str) {
        self.taken.remove(name);
    }
}

/// Monotonic index allocator, standing in for the core's sinks index.
#[derive(Default)]
pub struct SinkIndex {
    next: u32,
}

impl SinkIndex {
    /// A fresh allocator starting at index 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next index.
    pub fn alloc(&mut self) -> u32 {
        let idx = self.next;
        self.next += 1;
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_rejects_collision_on_fail_policy() {
        let mut reg = NameRegistry::new();
        assert_eq!(reg.register("sink0", NameregFail::Fail), Some("sink0".into()));
        assert_eq!(reg.register("sink0", NameregFail::Fail), None);
    }

    #[test]
    fn register_renames_on_collision() {
        let mut reg = NameRegistry::new();
        reg.register("sink0", NameregFail::Fail);
        assert_eq!(
            reg.register("sink0", NameregFail::Rename),
            Some("sink0.2".into())
        );
    }

    #[test]
    fn unregister_frees_the_name() {
        let mut reg = NameRegistry::new();
        reg.register("sink0", NameregFail::Fail);
        reg.unregister("sink0");
        assert_eq!(reg.register("sink0", NameregFail::Fail), Some("sink0".into()));
    }

    #[test]
    fn index_allocates_monotonically() {
        let mut idx = SinkIndex::new();
        assert_eq!(idx.alloc(), 0);
        assert_eq!(idx.alloc(), 1);
    }
}
