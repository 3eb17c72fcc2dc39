//! Periodic push of the rig layout to an outside consumer.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::state::{PositionUpdate, SharedRig};

/// Receiver of periodic [`PositionUpdate`]s.
pub trait BroadcastSink: Send + 'static {
    fn publish(&mut self, update: &PositionUpdate);
}

/// Forwards updates into a channel; a closed channel is ignored.
#[derive(Debug)]
pub struct ChannelSink(pub Sender<PositionUpdate>);

impl BroadcastSink for ChannelSink {
    fn publish(&mut self, update: &PositionUpdate) {
        let _ = self.0.send(update.clone());
    }
}

/// Writes one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: Write + Send + 'static> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send + 'static> BroadcastSink for JsonLinesSink<W> {
    fn publish(&mut self, update: &PositionUpdate) {
        let res = serde_json::to_writer(&mut self.writer, update)
            .map_err(std::io::Error::from)
            .and_then(|_| writeln!(self.writer))
            .and_then(|_| self.writer.flush());
        if let Err(err) = res {
            log::warn!("position broadcast failed: {err}");
        }
    }
}

/// Spawns the broadcaster thread.
pub struct Broadcaster;

impl Broadcaster {
    /// Publish a snapshot of `rig` every `interval` until the handle is shut down.
    pub fn spawn<S: BroadcastSink>(
        rig: SharedRig,
        mut sink: S,
        interval: Duration,
    ) -> BroadcasterHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let join = thread::spawn(move || {
            log::debug!("broadcaster started, interval {interval:?}");
            while !shutdown_thread.load(Ordering::SeqCst) {
                let update = rig.snapshot().to_update();
                sink.publish(&update);
                thread::park_timeout(interval);
            }
            log::debug!("broadcaster stopped");
        });
        BroadcasterHandle {
            shutdown,
            join: Some(join),
        }
    }
}

#[derive(Debug)]
pub struct BroadcasterHandle {
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl BroadcasterHandle {
    /// Stop the thread and wait for it.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.thread().unpark();
            if join.join().is_err() {
                log::error!("broadcaster thread panicked");
            }
        }
    }
}

impl Drop for BroadcasterHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
