//! Minimal stand-in for the sink's paired monitor source.
//!
//! Only the monitor role is modeled (`spec.md` §1 keeps the full source
//! object out of scope): linked/opened tracking, a rewind forward, and a
//! `post` sink that either counts chunks (for tests) or forwards them to a
//! caller-supplied callback.

use crate::memblock::MemChunk;

/// Lifecycle state a monitor source is visible through: it is constructed
/// alongside its sink, `put` alongside `Sink::put`, and unlinked alongside
/// `Sink::unlink`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum MonitorState {
    Init,
    Linked,
    Unlinked,
}

/// A sink's paired monitor source.
pub struct MonitorSource {
    name: String,
    description: String,
    state: MonitorState,
    /// Count of downstream consumers; `linked_by` in `spec.md` §8's
    /// `used_by ≤ linked_by` property.
    consumers: u32,
    posted: Vec<MemChunk>,
    sink: Box<dyn FnMut(&MemChunk) + Send>,
}

impl MonitorSource {
    /// Builds a monitor named `"<sink_name>.monitor"` with description
    /// `"Monitor of <sink_desc>"`, per `spec.md` §4.1.
    pub fn new(sink_name: &str) -> Self {
        Self {
            name: format!("{sink_name}.monitor"),
            description: String::new(),
            state: MonitorState::Init,
            consumers: 0,
            posted: Vec::new(),
            sink: Box::new(|_| {}),
        }
    }

    /// The monitor's registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The monitor's current description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Installs a callback invoked on every [`Self::post`]; replaces any
    /// previously installed callback.
    pub fn set_sink(&mut self, sink: impl FnMut(&MemChunk) + Send + 'static) {
        self.sink = Box::new(sink);
    }

    /// Transitions INIT → Linked, mirroring `Sink::put`.
    pub fn put(&mut self) {
        self.state = MonitorState::Linked;
    }

    /// Transitions to Unlinked, mirroring `Sink::unlink`. Idempotent.
    pub fn unlink(&mut self) {
        self.state = MonitorState::Unlinked;
    }

    /// True while the monitor is linked and has at least one consumer.
    pub fn is_opened(&self) -> bool {
        self.state == MonitorState::Linked && self.consumers > 0
    }

    /// True while the monitor is linked, irrespective of consumers.
    pub fn is_linked(&self) -> bool {
        self.state == MonitorState::Linked
    }

    /// Registers a new downstream consumer.
    pub fn add_consumer(&mut self) {
        self.consumers += 1;
    }

    /// Removes a downstream consumer.
    pub fn remove_consumer(&mut self) {
        self.consumers = self.consumers.saturating_sub(1);
    }

    /// Number of active consumers (`linked_by`).
    pub fn consumer_count(&self) -> u32 {
        self.consumers
    }

    /// Posts a just-rendered chunk, forwarding it to the installed sink
    /// callback and recording it for test inspection.
    pub fn post(&mut self, chunk: &MemChunk) {
        (self.sink)(chunk);
        self.posted.push(chunk.clone());
    }

    /// Chunks posted so far (test/debug aid; not part of the production
    /// data path).
    pub fn posted(&self) -> &[MemChunk] {
        &self.posted
    }

    /// Forwards a rewind, mirroring `Sink::process_rewind`'s fan-out to
    /// the monitor.
    pub fn process_rewind(&mut self, _nbytes: usize) {}

    /// Updates the monitor's description to `"Monitor Source of <desc>"`,
    /// mirroring `Sink::set_description`'s cascade.
    pub fn set_description_from_sink(&mut self, sink_description: &str) -> &str {
        self.description = format!("Monitor Source of {sink_description}");
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memblock::MemBlock;

    #[test]
    fn name_derivation() {
        let monitor = MonitorSource::new("analog-stereo");
        assert_eq!(monitor.name(), "analog-stereo.monitor");
    }

    #[test]
    fn opened_requires_linked_and_consumer() {
        let mut monitor = MonitorSource::new("s");
        assert!(!monitor.is_opened());
        monitor.put();
        assert!(!monitor.is_opened());
        monitor.add_consumer();
        assert!(monitor.is_opened());
    }

    #[test]
    fn set_description_from_sink_is_stored() {
        let mut monitor = MonitorSource::new("analog-stereo");
        assert_eq!(monitor.description(), "");

        let desc = monitor.set_description_from_sink("Built-in Audio").to_string();
        assert_eq!(desc, "Monitor Source of Built-in Audio");
        assert_eq!(monitor.description(), "Monitor Source of Built-in Audio");
    }

    #[test]
    fn post_forwards_and_records() {
        let mut monitor = MonitorSource::new("s");
        let seen = std::sync::Arc::new(std::sync::Mutex::new(0usize));
        let seen2 = seen.clone();
        monitor.set_sink(move |chunk| *seen2.lock().unwrap() += chunk.len());

        let chunk = MemChunk::new(MemBlock::new(vec![1, 2, 3, 4]), 0, 4);
        monitor.post(&chunk);

        assert_eq!(*seen.lock().unwrap(), 4);
        assert_eq!(monitor.posted().len(), 1);
    }
}
