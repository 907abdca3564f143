//! The `Sink` type: construction/teardown, the control-thread façade over
//! volume/mute/state, and the input move protocol (`spec.md` §4.1, §4.2,
//! §4.7, §4.9).

use std::sync::{Arc, Mutex};

use bitflags::bitflags;

use crate::error::SinkError;
use crate::hooks::{Hook, HookBus, HookResult, SubscriptionEvent, SubscriptionSink};
use crate::input::{GhostInput, Input};
use crate::mailbox::{Mailbox, MailboxHandle, SinkReply};
use crate::memblock::MemChunk;
use crate::message::{MoveInfo, MoveResult, SinkMessage};
use crate::mix::RenderThread;
use crate::monitor::MonitorSource;
use crate::props::Props;
use crate::registry::{NameRegistry, NameregFail, SinkIndex};
use crate::roster::ControlRoster;
use crate::sample::{ChannelMap, SampleSpec};
use crate::state::SinkState;
use crate::volume::ChannelVolume;

bitflags! {
    /// Feature flags describing a sink's capabilities (`spec.md` §6).
    #[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
    pub struct SinkFlags: u32 {
        const HW_VOLUME_CTRL = 0x0001;
        const LATENCY = 0x0002;
        const HARDWARE = 0x0004;
        const NETWORK = 0x0008;
        const HW_MUTE_CTRL = 0x0010;
        const DECIBEL_VOLUME = 0x0020;
        const DYNAMIC_LATENCY = 0x0080;
    }
}

/// The driver's installed callbacks (`spec.md` §6). Any field may be
/// `None`; a hook that reports failure nulls its own field out, per
/// `spec.md` §7.
#[derive(Default)]
pub struct Driver {
    pub set_state: Option<Box<dyn FnMut(SinkState) -> bool + Send>>,
    pub get_volume: Option<Box<dyn FnMut() -> ChannelVolume + Send>>,
    pub set_volume: Option<Box<dyn FnMut(&ChannelVolume) -> bool + Send>>,
    pub get_mute: Option<Box<dyn FnMut() -> bool + Send>>,
    pub set_mute: Option<Box<dyn FnMut(bool) -> bool + Send>>,
    pub get_latency: Option<Box<dyn FnMut() -> u64 + Send>>,
    pub request_rewind: Option<Box<dyn FnMut() + Send>>,
    pub update_requested_latency: Option<Box<dyn FnMut() + Send>>,
}

/// Construction parameters for [`Sink::new`].
pub struct SinkNewData {
    pub name: String,
    pub driver: Option<String>,
    pub sample_spec: SampleSpec,
    pub channel_map: Option<ChannelMap>,
    pub cvolume: Option<ChannelVolume>,
    pub muted: Option<bool>,
    pub props: Props,
    pub namereg_fail: NameregFail,
}

/// Shared process-wide collaborators a sink registers itself with at
/// construction. Thin glue, per `spec.md` §1.
pub struct Core {
    pub names: NameRegistry,
    pub sink_index: SinkIndex,
    pub hooks: HookBus,
    pub subscriptions: Vec<Box<dyn SubscriptionSink>>,
}

impl Default for Core {
    fn default() -> Self {
        Self {
            names: NameRegistry::new(),
            sink_index: SinkIndex::new(),
            hooks: HookBus::new(),
            subscriptions: Vec::new(),
        }
    }
}

impl Core {
    fn notify(&mut self, event: SubscriptionEvent, sink_index: u32) {
        for sub in &mut self.subscriptions {
            sub.notify(event, sink_index);
        }
    }
}

/// A logical output device: the control-thread-facing half of `spec.md`
/// §3's `Sink` data model. The render-thread half lives in
/// [`RenderThread`], reachable only through [`Sink::render_thread`].
pub struct Sink {
    pub index: u32,
    pub name: String,
    pub driver: Option<String>,
    pub sample_spec: SampleSpec,
    pub channel_map: ChannelMap,
    pub volume: ChannelVolume,
    pub muted: bool,
    pub flags: SinkFlags,
    pub props: Props,
    pub state: SinkState,
    pub min_latency_us: u64,
    pub max_latency_us: u64,
    pub refresh_volume: bool,
    pub refresh_muted: bool,

    inputs: ControlRoster,
    driver_hooks: Driver,
    render: Arc<Mutex<RenderThread>>,
    mailbox: MailboxHandle,
    inbox: Mailbox,
}

impl Sink {
    /// `spec.md` §4.1 `new`.
    pub fn new(core: &mut Core, new_data: SinkNewData, flags: SinkFlags) -> Result<Self, SinkError> {
        if new_data.name.is_empty() {
            return Err(SinkError::NameTaken(new_data.name));
        }

        let name = core
            .names
            .register(&new_data.name, new_data.namereg_fail)
            .ok_or_else(|| SinkError::NameTaken(new_data.name.clone()))?;

        if core.hooks.fire(Hook::SinkNew, 0) == HookResult::Vetoed {
            core.names.unregister(&name);
            return Err(SinkError::HookVetoed);
        }

        let channel_map = new_data
            .channel_map
            .unwrap_or_else(|| ChannelMap::auto_default(new_data.sample_spec.channels));
        if channel_map.num_channels() != new_data.sample_spec.channels {
            core.names.unregister(&name);
            return Err(SinkError::InvalidSampleSpec(
                crate::sample::SampleSpecError::ChannelMismatch {
                    map_channels: channel_map.num_channels(),
                    spec_channels: new_data.sample_spec.channels,
                },
            ));
        }

        let volume = new_data
            .cvolume
            .unwrap_or_else(|| ChannelVolume::norm(new_data.sample_spec.channels));
        let muted = new_data.muted.unwrap_or(false);

        if core.hooks.fire(Hook::SinkFixate, 0) == HookResult::Vetoed {
            core.names.unregister(&name);
            return Err(SinkError::HookVetoed);
        }

        let index = core.sink_index.alloc();

        let frame_size = new_data.sample_spec.frame_size();
        let block_size_max = crate::mix::MIX_BUFFER_LENGTH;
        let render = RenderThread::new(
            new_data.sample_spec.channels,
            new_data.sample_spec.format,
            frame_size,
            block_size_max,
            crate::mix::DEFAULT_MIN_LATENCY_US,
            0,
        );
        let mut render = render;
        let mut monitor = MonitorSource::new(&name);
        let monitor_desc = format!("Monitor of {name}");
        monitor.set_description_from_sink(&monitor_desc);
        render.set_monitor(monitor);

        let (mailbox, inbox) = Mailbox::new().map_err(SinkError::Mailbox)?;

        log::debug!("sink {name} ({index}) constructed");

        Ok(Self {
            index,
            name,
            driver: new_data.driver,
            sample_spec: new_data.sample_spec,
            channel_map,
            volume,
            muted,
            flags,
            props: new_data.props,
            state: SinkState::Init,
            min_latency_us: crate::mix::DEFAULT_MIN_LATENCY_US,
            max_latency_us: 0,
            refresh_volume: false,
            refresh_muted: false,
            inputs: ControlRoster::new(),
            driver_hooks: Driver::default(),
            render: Arc::new(Mutex::new(render)),
            mailbox,
            inbox,
        })
    }

    /// Installs the driver's capability record. Must happen before
    /// [`Self::put`].
    pub fn set_driver(&mut self, driver: Driver) {
        self.driver_hooks = driver;
    }

    /// A cloneable handle other threads can use to post messages to this
    /// sink's render thread.
    pub fn mailbox_handle(&self) -> MailboxHandle {
        self.mailbox.clone()
    }

    /// Shared handle to the render-thread state, for a driver-owned render
    /// loop to call [`RenderThread::render`] et al. directly.
    pub fn render_thread(&self) -> Arc<Mutex<RenderThread>> {
        self.render.clone()
    }

    /// `spec.md` §4.1 `put`.
    pub fn put(&mut self, core: &mut Core) -> Result<(), SinkError> {
        if self.state != SinkState::Init {
            return Err(SinkError::NotInit);
        }

        if !self.flags.contains(SinkFlags::HW_VOLUME_CTRL) {
            self.flags.insert(SinkFlags::DECIBEL_VOLUME);
        }

        self.transition(core, SinkState::Idle)?;

        {
            let mut render = self.render.lock().unwrap();
            if let Some(monitor) = render.monitor_mut() {
                monitor.put();
            }
        }

        core.notify(SubscriptionEvent::New, self.index);
        core.hooks.fire(Hook::SinkPut, self.index);
        log::info!("sink {} ({}) put", self.name, self.index);
        Ok(())
    }

    /// `spec.md` §4.1 `unlink`. Idempotent.
    pub fn unlink(&mut self, core: &mut Core) {
        if self.state == SinkState::Unlinked {
            return;
        }

        let was_linked = self.state.is_linked();
        if was_linked {
            core.hooks.fire(Hook::SinkUnlink, self.index);
        }

        core.names.unregister(&self.name);

        {
            let mut render = self.render.lock().unwrap();
            render.roster_mut().drain(|mut input| input.kill());
        }
        self.inputs = ControlRoster::new();

        self.state = SinkState::Unlinked;

        {
            let mut render = self.render.lock().unwrap();
            if let Some(monitor) = render.monitor_mut() {
                monitor.unlink();
            }
        }

        if was_linked {
            core.notify(SubscriptionEvent::Remove, self.index);
            core.hooks.fire(Hook::SinkUnlinkPost, self.index);
        }

        log::info!("sink {} ({}) unlinked", self.name, self.index);
    }

    /// `spec.md` §4.2`: the centralized state transition function.
    pub fn transition(&mut self, core: &mut Core, target: SinkState) -> Result<(), SinkError> {
        if target == self.state {
            return Ok(());
        }

        let suspend_change = self.state.is_linked() != target.is_linked()
            || (self.state == SinkState::Suspended) != (target == SinkState::Suspended);

        if let Some(hook) = &mut self.driver_hooks.set_state {
            if !hook(target) {
                return Err(SinkError::DriverRejected);
            }
        }

        self.apply_sync(SinkMessage::SetState(target));

        self.state = target;

        if suspend_change {
            let mut render = self.render.lock().unwrap();
            for input in render.roster_mut().iter_mut() {
                input.suspend(target == SinkState::Suspended);
            }
        }

        if target != SinkState::Unlinked {
            core.hooks.fire(Hook::SinkStateChanged, self.index);
        }

        Ok(())
    }

    /// `spec.md` §4.2 `update_status`.
    pub fn update_status(&mut self, core: &mut Core) -> Result<(), SinkError> {
        if self.state == SinkState::Suspended {
            return Ok(());
        }
        let target = if self.inputs.used_by() > 0 {
            SinkState::Running
        } else {
            SinkState::Idle
        };
        self.transition(core, target)
    }

    /// `spec.md` §4.2 `suspend`: moves to SUSPENDED, or resumes straight to
    /// RUNNING/IDLE depending on `used_by`. The resume side calls
    /// `transition` directly rather than through `update_status`, since
    /// `update_status` no-ops while still SUSPENDED (`pulsecore/sink.c`'s
    /// `pa_sink_suspend` calls `sink_set_state` directly for the same
    /// reason: going through the status recompute would never leave
    /// SUSPENDED).
    pub fn suspend(&mut self, core: &mut Core, suspended: bool) -> Result<(), SinkError> {
        if suspended {
            self.transition(core, SinkState::Suspended)
        } else {
            let target = if self.inputs.used_by() > 0 {
                SinkState::Running
            } else {
                SinkState::Idle
            };
            self.transition(core, target)
        }
    }

    /// Drains and applies every pending async mailbox message against the
    /// shared render thread. A driver embedding this crate with its own
    /// render thread calls this (or drains [`Mailbox`] directly) between
    /// render passes; `Sink`'s own methods below never rely on it for
    /// their *sync* messages, since this crate doesn't spawn the render
    /// thread itself (`spec.md` §1: device I/O and its clock-locked loop
    /// are the driver's job) — they apply sync messages directly via
    /// [`Self::apply_sync`], which is observably identical to a real
    /// render thread draining the same message the instant it's sent.
    pub fn drive_mailbox(&mut self) {
        let pending = self.inbox.try_drain();
        let mut render = self.render.lock().unwrap();
        for envelope in pending {
            let reply = apply_message(&mut render, envelope.message);
            if let Some(reply_to) = envelope.reply_to {
                let _ = reply_to.send(reply);
            }
        }
    }

    /// Applies a sync message immediately against the shared render
    /// thread, without going through the mailbox's blocking round trip
    /// (which requires a second thread actually draining it). This is
    /// `Sink`'s own rendezvous; an external driver posting through
    /// [`Self::mailbox_handle`] still goes through the real mailbox and is
    /// drained by [`Self::drive_mailbox`].
    fn apply_sync(&mut self, message: SinkMessage) -> SinkReply {
        let mut render = self.render.lock().unwrap();
        apply_message(&mut render, message)
    }

    /// `spec.md` §4.8 ADD_INPUT.
    pub fn add_input(&mut self, input: Box<dyn Input>) -> Result<(), SinkError> {
        let index = input.index();
        self.apply_sync(SinkMessage::AddInput(index));
        {
            let mut render = self.render.lock().unwrap();
            render.roster_mut().insert(input);
            render.invalidate_requested_latency();
            render.request_rewind(0);
        }
        self.inputs.link(index);
        Ok(())
    }

    /// `spec.md` §4.8 REMOVE_INPUT.
    pub fn remove_input(&mut self, index: u32) -> Result<(), SinkError> {
        self.apply_sync(SinkMessage::RemoveInput(index));
        {
            let mut render = self.render.lock().unwrap();
            render.roster_mut().remove(index);
            render.invalidate_requested_latency();
            let nbytes = render.pending_rewind();
            render.request_rewind(nbytes);
        }
        self.inputs.unlink(index);
        Ok(())
    }

    /// `spec.md` §4.9's input move: REMOVE_INPUT_AND_BUFFER followed by
    /// the caller's ADD_INPUT on the destination sink. Returns the
    /// captured buffer so the caller can hand it to the destination if
    /// it wants to preserve continuity there too (out of scope here: only
    /// A's side, installing the ghost, is modeled).
    pub fn move_input_out(&mut self, index: u32, buffer_bytes: usize) -> Result<MoveResult, SinkError> {
        let reply = self.apply_sync(SinkMessage::RemoveInputAndBuffer(MoveInfo {
            input_index: index,
            buffer_bytes,
        }));

        let result = match reply {
            SinkReply::Moved(result) => result,
            _ => {
                let mut render = self.render.lock().unwrap();
                do_move_out(&mut render, index, buffer_bytes)
            }
        };

        self.inputs.unlink(index);
        Ok(result)
    }

    /// `spec.md` §4.7 `set_volume`.
    pub fn set_volume(&mut self, volume: ChannelVolume, core: &mut Core) -> Result<(), SinkError> {
        let changed = volume != self.volume;
        self.volume = volume.clone();

        let hook_handled = if let Some(hook) = &mut self.driver_hooks.set_volume {
            if hook(&volume) {
                true
            } else {
                self.driver_hooks.set_volume = None;
                false
            }
        } else {
            false
        };

        if !hook_handled {
            self.mailbox
                .send_async(SinkMessage::SetVolume(volume))
                .map_err(SinkError::Mailbox)?;
            self.drive_mailbox();
            let mut render = self.render.lock().unwrap();
            let nbytes = render.pending_rewind().max(1);
            render.request_rewind(nbytes);
        }

        if changed {
            core.notify(SubscriptionEvent::Change, self.index);
        }
        Ok(())
    }

    /// `spec.md` §4.7 `get_volume`.
    pub fn get_volume(&mut self, core: &mut Core) -> Result<ChannelVolume, SinkError> {
        let snapshot = self.volume.clone();

        let observed = if let Some(hook) = &mut self.driver_hooks.get_volume {
            hook()
        } else if self.refresh_volume {
            let reply = self.apply_sync(SinkMessage::GetVolume);
            match reply {
                SinkReply::Volume(v) => v,
                _ => {
                    let render = self.render.lock().unwrap();
                    render.soft_volume.clone()
                }
            }
        } else {
            snapshot.clone()
        };

        self.volume = observed.clone();
        if observed != snapshot {
            core.notify(SubscriptionEvent::Change, self.index);
        }
        Ok(observed)
    }

    /// `spec.md` §4.7 `set_mute`.
    pub fn set_mute(&mut self, muted: bool, core: &mut Core) -> Result<(), SinkError> {
        let changed = muted != self.muted;
        self.muted = muted;

        let hook_handled = if let Some(hook) = &mut self.driver_hooks.set_mute {
            if hook(muted) {
                true
            } else {
                self.driver_hooks.set_mute = None;
                false
            }
        } else {
            false
        };

        if !hook_handled {
            self.mailbox
                .send_async(SinkMessage::SetMute(muted))
                .map_err(SinkError::Mailbox)?;
            self.drive_mailbox();
        }

        if changed {
            core.notify(SubscriptionEvent::Change, self.index);
        }
        Ok(())
    }

    /// `spec.md` §4.7 `get_mute`.
    pub fn get_mute(&mut self, core: &mut Core) -> Result<bool, SinkError> {
        let snapshot = self.muted;

        let observed = if let Some(hook) = &mut self.driver_hooks.get_mute {
            hook()
        } else if self.refresh_muted {
            let reply = self.apply_sync(SinkMessage::GetMute);
            match reply {
                SinkReply::Mute(m) => m,
                _ => self.render.lock().unwrap().soft_muted,
            }
        } else {
            snapshot
        };

        self.muted = observed;
        if observed != snapshot {
            core.notify(SubscriptionEvent::Change, self.index);
        }
        Ok(observed)
    }

    /// `spec.md` §4.7 `set_description`.
    pub fn set_description(&mut self, description: &str, core: &mut Core) {
        self.props.set("device.description", description);

        {
            let mut render = self.render.lock().unwrap();
            if let Some(monitor) = render.monitor_mut() {
                monitor.set_description_from_sink(description);
                log::debug!("monitor description updated: {}", monitor.description());
            }
        }

        if self.state.is_linked() {
            core.notify(SubscriptionEvent::Change, self.index);
            core.hooks.fire(Hook::SinkProplistChanged, self.index);
        }
    }

    /// `spec.md` §6 `get_latency`: prefers the driver hook, falling back
    /// to 0 while suspended and to the message path otherwise.
    pub fn get_latency(&mut self) -> u64 {
        if let Some(hook) = &mut self.driver_hooks.get_latency {
            return hook();
        }
        if self.state == SinkState::Suspended {
            return 0;
        }
        self.drive_mailbox();
        let mut render = self.render.lock().unwrap();
        render.get_requested_latency_within_thread().unwrap_or(0)
    }

    /// `linked_by` term of `spec.md` §8's `used_by ≤ linked_by` property.
    pub fn linked_by(&self) -> usize {
        let monitor_consumers = {
            let mut render = self.render.lock().unwrap();
            render
                .monitor_mut()
                .map(|m| m.consumer_count() as usize)
                .unwrap_or(0)
        };
        self.inputs.len() + monitor_consumers
    }

    /// `used_by` per `spec.md` §3.
    pub fn used_by(&self) -> usize {
        self.inputs.used_by()
    }
}

/// Applies one [`SinkMessage`] to the render thread, returning the reply a
/// sync sender should receive (ignored for async messages).
fn apply_message(render: &mut RenderThread, message: SinkMessage) -> SinkReply {
    match message {
        SinkMessage::AddInput(_) => SinkReply::Ack,
        SinkMessage::RemoveInput(_) => SinkReply::Ack,
        SinkMessage::RemoveInputAndBuffer(move_info) => {
            let result = do_move_out(render, move_info.input_index, move_info.buffer_bytes);
            SinkReply::Moved(result)
        }
        SinkMessage::SetVolume(v) => {
            render.soft_volume = v;
            render.request_rewind(0);
            SinkReply::Ack
        }
        SinkMessage::SetMute(m) => {
            render.soft_muted = m;
            render.request_rewind(0);
            SinkReply::Ack
        }
        SinkMessage::GetVolume => SinkReply::Volume(render.soft_volume.clone()),
        SinkMessage::GetMute => SinkReply::Mute(render.soft_muted),
        SinkMessage::SetState(state) => {
            render.state = state;
            SinkReply::Ack
        }
        SinkMessage::Detach => {
            for input in render.roster_mut().iter_mut() {
                input.detach();
            }
            SinkReply::Ack
        }
        SinkMessage::Attach => {
            for input in render.roster_mut().iter_mut() {
                input.attach();
            }
            SinkReply::Ack
        }
        SinkMessage::GetRequestedLatency => {
            SinkReply::Latency(render.get_requested_latency_within_thread())
        }
    }
}

/// Shared implementation of the REMOVE_INPUT_AND_BUFFER handler
/// (`spec.md` §4.8, §4.9): detach the input, drain up to `buffer_bytes`
/// of audio (applying its volume if non-unit), install a ghost replaying
/// the captured buffer in its place.
fn do_move_out(render: &mut RenderThread, index: u32, buffer_bytes: usize) -> MoveResult {
    let mut buffer = Vec::new();
    let mut volume = ChannelVolume::empty();
    let (channels, format) = render.format();

    if let Some(input) = render.roster_mut().get_mut(index) {
        input.detach();
        let mut remaining = buffer_bytes;
        while remaining > 0 {
            match input.peek(remaining) {
                crate::input::PeekResult::Chunk(chunk, vol) => {
                    if chunk.is_empty() {
                        break;
                    }
                    volume = vol;
                    let mut chunk = chunk;
                    if !volume.is_norm() {
                        crate::mix::apply_volume_to_chunk(&mut chunk, channels, format, &volume);
                    }
                    let taken = chunk.len();
                    input.drop_samples(taken);
                    remaining = remaining.saturating_sub(taken);
                    buffer.push(chunk);
                }
                crate::input::PeekResult::Skip => break,
            }
        }
    }

    let ghost = GhostInput::new(index, volume.clone(), buffer.clone());
    render.roster_mut().replace(index, Box::new(ghost));
    render.invalidate_requested_latency();
    render.request_rewind(0);

    MoveResult {
        input_index: index,
        buffer,
        volume,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::TestInput;
    use crate::sample::SampleFormat;

    fn new_sink(core: &mut Core, name: &str) -> Sink {
        Sink::new(
            core,
            SinkNewData {
                name: name.to_string(),
                driver: None,
                sample_spec: SampleSpec::new(SampleFormat::S16Le, 2, 44100).unwrap(),
                channel_map: None,
                cvolume: None,
                muted: None,
                props: Props::new(),
                namereg_fail: NameregFail::Fail,
            },
            SinkFlags::empty(),
        )
        .unwrap()
    }

    #[test_log::test]
    fn new_then_put_transitions_init_to_idle() {
        let mut core = Core::default();
        let mut sink = new_sink(&mut core, "test-sink");
        assert_eq!(sink.state, SinkState::Init);

        sink.put(&mut core).unwrap();
        assert_eq!(sink.state, SinkState::Idle);
    }

    #[test]
    fn put_outside_init_fails() {
        let mut core = Core::default();
        let mut sink = new_sink(&mut core, "test-sink");
        sink.put(&mut core).unwrap();

        assert!(matches!(sink.put(&mut core), Err(SinkError::NotInit)));
    }

    #[test]
    fn unlink_is_idempotent() {
        let mut core = Core::default();
        let mut sink = new_sink(&mut core, "test-sink");
        sink.put(&mut core).unwrap();

        sink.unlink(&mut core);
        assert_eq!(sink.state, SinkState::Unlinked);
        sink.unlink(&mut core);
        assert_eq!(sink.state, SinkState::Unlinked);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut core = Core::default();
        let _first = new_sink(&mut core, "dup");
        let result = Sink::new(
            &mut core,
            SinkNewData {
                name: "dup".to_string(),
                driver: None,
                sample_spec: SampleSpec::new(SampleFormat::S16Le, 2, 44100).unwrap(),
                channel_map: None,
                cvolume: None,
                muted: None,
                props: Props::new(),
                namereg_fail: NameregFail::Fail,
            },
            SinkFlags::empty(),
        );
        assert!(matches!(result, Err(SinkError::NameTaken(_))));
    }

    #[test]
    fn add_input_updates_used_by() {
        let mut core = Core::default();
        let mut sink = new_sink(&mut core, "test-sink");
        sink.put(&mut core).unwrap();

        sink.add_input(Box::new(TestInput::new(0, vec![]))).unwrap();
        assert_eq!(sink.used_by(), 1);

        sink.remove_input(0).unwrap();
        assert_eq!(sink.used_by(), 0);
    }

    #[test]
    fn suspend_cycle_resumes_to_running_and_fans_out_to_inputs() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let mut core = Core::default();
        let mut sink = new_sink(&mut core, "test-sink");
        sink.put(&mut core).unwrap();

        let suspended_flag = Arc::new(AtomicBool::new(false));
        sink.add_input(Box::new(
            TestInput::new(0, vec![]).with_suspend_flag(suspended_flag.clone()),
        ))
        .unwrap();
        sink.update_status(&mut core).unwrap();
        assert_eq!(sink.state, SinkState::Running);

        sink.suspend(&mut core, true).unwrap();
        assert_eq!(sink.state, SinkState::Suspended);
        assert!(suspended_flag.load(Ordering::SeqCst));
        assert_eq!(sink.get_latency(), 0);

        // Resuming must leave SUSPENDED, not get stuck behind
        // `update_status`'s own "already suspended" guard.
        sink.suspend(&mut core, false).unwrap();
        assert_eq!(sink.state, SinkState::Running);
        assert!(!suspended_flag.load(Ordering::SeqCst));
    }

    #[test]
    fn suspend_resumes_to_idle_with_no_inputs() {
        let mut core = Core::default();
        let mut sink = new_sink(&mut core, "test-sink");
        sink.put(&mut core).unwrap();
        assert_eq!(sink.state, SinkState::Idle);

        sink.suspend(&mut core, true).unwrap();
        assert_eq!(sink.state, SinkState::Suspended);

        sink.suspend(&mut core, false).unwrap();
        assert_eq!(sink.state, SinkState::Idle);
    }

    #[test]
    fn used_by_never_exceeds_linked_by() {
        let mut core = Core::default();
        let mut sink = new_sink(&mut core, "test-sink");
        sink.put(&mut core).unwrap();
        assert!(sink.used_by() <= sink.linked_by());

        sink.add_input(Box::new(TestInput::new(0, vec![]))).unwrap();
        sink.add_input(Box::new(TestInput::new(1, vec![]))).unwrap();
        assert_eq!(sink.used_by(), 2);
        assert!(sink.used_by() <= sink.linked_by());

        {
            let render = sink.render_thread();
            let mut render = render.lock().unwrap();
            if let Some(monitor) = render.monitor_mut() {
                monitor.add_consumer();
            }
        }
        assert!(sink.used_by() <= sink.linked_by());
        assert!(sink.linked_by() > sink.used_by());

        sink.remove_input(0).unwrap();
        assert!(sink.used_by() <= sink.linked_by());
    }

    #[test_log::test]
    fn move_input_out_installs_ghost() {
        let mut core = Core::default();
        let mut sink = new_sink(&mut core, "test-sink");
        sink.put(&mut core).unwrap();

        let bytes: Vec<u8> = (0u8..16).collect();
        let chunk = crate::memblock::MemChunk::new(crate::memblock::MemBlock::new(bytes), 0, 16);
        sink.add_input(Box::new(TestInput::new(0, vec![chunk])))
            .unwrap();

        let result = sink.move_input_out(0, 16).unwrap();
        assert_eq!(result.input_index, 0);
        assert!(!result.buffer.is_empty());
    }
}
