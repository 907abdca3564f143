//! Cross-thread mailbox: the sink's sole rendezvous between control thread
//! and render thread.
//!
//! Grounded in the teacher's `client::reactor::{Reactor, ReactorHandle}`:
//! the same `mio::Poll` + `mio::Waker` + `mpsc::Sender` shape used there to
//! unblock a background thread on an outgoing command, adapted to a fully
//! synchronous consumer (`drain`) instead of an async reactor loop, since
//! this crate has no async runtime.

use std::io;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::time::Duration;

use crate::message::{MoveResult, SinkMessage};
use crate::volume::ChannelVolume;

/// Reply payload for a sync message, sent back over a one-shot
/// `sync_channel(1)` the caller blocks on (`spec.md` §5: "Sync messages are
/// the only cross-thread rendezvous").
pub enum SinkReply {
    Ack,
    Volume(ChannelVolume),
    Mute(bool),
    Latency(Option<u64>),
    Moved(MoveResult),
}

/// One posted message: its payload and, for sync messages, the reply slot
/// the render thread must fill before the sender unblocks.
pub struct Envelope {
    pub message: SinkMessage,
    pub reply_to: Option<SyncSender<SinkReply>>,
}

const WAKER: mio::Token = mio::Token(0);

/// Control-thread handle used to post messages to a sink's render thread.
#[derive(Clone)]
pub struct MailboxHandle {
    outgoing: Sender<Envelope>,
    waker: Arc<mio::Waker>,
}

impl MailboxHandle {
    /// Posts an async message; returns as soon as it's queued.
    pub fn send_async(&self, message: SinkMessage) -> io::Result<()> {
        let _ = self.outgoing.send(Envelope {
            message,
            reply_to: None,
        });
        self.waker.wake()
    }

    /// Posts a sync message and blocks until the render thread replies.
    pub fn send_sync(&self, message: SinkMessage) -> io::Result<SinkReply> {
        let (tx, rx) = mpsc::sync_channel(1);
        let _ = self.outgoing.send(Envelope {
            message,
            reply_to: Some(tx),
        });
        self.waker.wake()?;
        Ok(rx.recv().unwrap_or(SinkReply::Ack))
    }
}

/// Render-thread side: drains posted messages between render passes.
pub struct Mailbox {
    poll: mio::Poll,
    incoming: Receiver<Envelope>,
}

impl Mailbox {
    /// Builds a fresh mailbox pair: a [`MailboxHandle`] for the control
    /// thread and the [`Mailbox`] itself for the render thread.
    pub fn new() -> io::Result<(MailboxHandle, Self)> {
        let poll = mio::Poll::new()?;
        let waker = Arc::new(mio::Waker::new(poll.registry(), WAKER)?);
        let (tx, rx) = mpsc::channel();

        Ok((
            MailboxHandle {
                outgoing: tx,
                waker,
            },
            Mailbox { poll, incoming: rx },
        ))
    }

    /// Blocks (up to `timeout`, or indefinitely if `None`) until at least
    /// one message is posted, then drains every pending message. This is
    /// the render thread's "wait primitive" of `spec.md` §5: it may block
    /// only here, between passes.
    pub fn drain(&mut self, timeout: Option<Duration>) -> io::Result<Vec<Envelope>> {
        let mut events = mio::Events::with_capacity(16);
        self.poll.poll(&mut events, timeout)?;

        Ok(self.try_drain())
    }

    /// Non-blocking drain, for a render thread driven by its own clock
    /// that polls the mailbox between every pass regardless of wakeups.
    pub fn try_drain(&mut self) -> Vec<Envelope> {
        let mut drained = Vec::new();
        while let Ok(envelope) = self.incoming.try_recv() {
            drained.push(envelope);
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn async_message_is_drained() {
        let (handle, mut mailbox) = Mailbox::new().unwrap();
        handle.send_async(SinkMessage::GetVolume).unwrap();

        let drained = mailbox.drain(Some(Duration::from_secs(1))).unwrap();
        assert_eq!(drained.len(), 1);
        assert!(drained[0].reply_to.is_none());
    }

    #[test]
    fn sync_message_round_trips() {
        let (handle, mut mailbox) = Mailbox::new().unwrap();

        let render = std::thread::spawn(move || {
            let drained = mailbox.drain(Some(Duration::from_secs(1))).unwrap();
            for envelope in drained {
                if let Some(reply_to) = envelope.reply_to {
                    let _ = reply_to.send(SinkReply::Mute(true));
                }
            }
        });

        let reply = handle.send_sync(SinkMessage::GetMute).unwrap();
        render.join().unwrap();

        match reply {
            SinkReply::Mute(m) => assert!(m),
            _ => panic!("expected mute reply"),
        }
    }
}
