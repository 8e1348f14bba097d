use crate::config::StreamConfig;
use crate::decoder::{PenDecoder, RawFrame};
use crate::line::LineReader;
use crate::types::{PenEvent, PositionSample};
use crate::{DpointError, Result};
use crossbeam_channel::{
    Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError,
};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Counters kept by the decode thread of one pen stream.
#[derive(Debug, Default)]
pub struct StreamStats {
    frames: AtomicU64,
    bad_length: AtomicU64,
    no_payload: AtomicU64,
    dropped_samples: AtomicU64,
    button_events: AtomicU64,
}

/// Point-in-time copy of [`StreamStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames: u64,
    pub bad_length: u64,
    pub no_payload: u64,
    pub dropped_samples: u64,
    pub button_events: u64,
}

impl StreamStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            bad_length: self.bad_length.load(Ordering::Relaxed),
            no_payload: self.no_payload.load(Ordering::Relaxed),
            dropped_samples: self.dropped_samples.load(Ordering::Relaxed),
            button_events: self.button_events.load(Ordering::Relaxed),
        }
    }
}

/// Transport-side handle of a pen stream.
///
/// Hand a clone to whatever receives notifications; each call to
/// [`push`](Self::push) queues one frame for the decode thread.
#[derive(Debug, Clone)]
pub struct FrameSink {
    sender: Sender<RawFrame>,
}

impl FrameSink {
    /// Queue a notification payload, stamped with the current time.
    pub fn push(&self, data: &[u8]) -> Result<()> {
        self.push_frame(RawFrame::new(data, Instant::now()))
    }

    /// Queue a frame that already carries its arrival time.
    ///
    /// Blocks while the queue is full, so frames are never reordered or lost.
    pub fn push_frame(&self, frame: RawFrame) -> Result<()> {
        self.sender
            .send(frame)
            .map_err(|_| DpointError::StreamStopped)
    }
}

/// Handle to a running binary pen stream.
///
/// Frames pushed through the paired [`FrameSink`] are decoded on a
/// dedicated thread, in order. Valid frames come out as
/// [`PenEvent::Sample`], followed by any [`PenEvent::Button`] transitions
/// they caused. Samples are dropped if the consumer falls behind; button
/// events are not.
pub struct PenStream {
    receiver: Receiver<PenEvent>,
    stop_flag: Arc<AtomicBool>,
    stats: Arc<StreamStats>,
    thread: Option<JoinHandle<()>>,
}

impl PenStream {
    /// Start the decode thread and return the transport handle with the stream.
    pub fn start(config: &StreamConfig) -> Result<(FrameSink, PenStream)> {
        let capacity = config.channel_capacity.max(1);
        let (frame_tx, frame_rx) = crossbeam_channel::bounded(capacity);
        let (event_tx, event_rx) = crossbeam_channel::bounded(capacity);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(StreamStats::default());
        let decoder = PenDecoder::new(Instant::now());

        let stop_clone = stop_flag.clone();
        let stats_clone = stats.clone();
        let poll = config.poll_interval;
        let thread = std::thread::Builder::new()
            .name("dpoint-decode".into())
            .spawn(move || {
                pen_decode_loop(decoder, frame_rx, event_tx, stop_clone, stats_clone, poll);
            })
            .map_err(|e| DpointError::Spawn(e.to_string()))?;

        Ok((
            FrameSink { sender: frame_tx },
            PenStream {
                receiver: event_rx,
                stop_flag,
                stats,
                thread: Some(thread),
            },
        ))
    }

    /// Receive the next event (blocks until available).
    pub fn recv(&self) -> Result<PenEvent> {
        self.receiver.recv().map_err(|_| DpointError::StreamStopped)
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Option<PenEvent> {
        self.receiver.try_recv().ok()
    }

    /// Receive an event with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<PenEvent> {
        recv_timeout(&self.receiver, timeout)
    }

    /// The event channel. Clones share one queue, each event going to one receiver.
    pub fn receiver(&self) -> &Receiver<PenEvent> {
        &self.receiver
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Check if the decode thread is still running.
    pub fn is_active(&self) -> bool {
        !self.stop_flag.load(Ordering::Relaxed)
    }

    /// Stop the stream and wait for the decode thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for PenStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn pen_decode_loop(
    mut decoder: PenDecoder,
    frames: Receiver<RawFrame>,
    events: Sender<PenEvent>,
    stop_flag: Arc<AtomicBool>,
    stats: Arc<StreamStats>,
    poll: Duration,
) {
    log::info!("Pen decoder started");

    'frames: loop {
        if stop_flag.load(Ordering::Relaxed) {
            log::info!("Pen decoder stopping (stop flag set)");
            break;
        }

        let frame = match frames.recv_timeout(poll) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                log::info!("All frame sinks dropped, stopping decoder");
                break;
            }
        };
        stats.frames.fetch_add(1, Ordering::Relaxed);

        let output = match decoder.process(&frame) {
            Ok(Some(output)) => output,
            Ok(None) => {
                stats.no_payload.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            Err(e) => {
                log::warn!("Dropping frame: {}", e);
                stats.bad_length.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        };

        match events.try_send(PenEvent::Sample(output.sample)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::trace!("Event channel full, dropping sample");
                stats.dropped_samples.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {
                log::info!("Event channel disconnected, stopping decoder");
                break;
            }
        }

        for event in output.events {
            log::debug!("{:?} {:?}", event.button, event.transition);
            stats.button_events.fetch_add(1, Ordering::Relaxed);
            if !send_until_stopped(&events, PenEvent::Button(event), &stop_flag, poll) {
                break 'frames;
            }
        }
    }

    stop_flag.store(true, Ordering::Relaxed);
}

/// Handle to a running serial position feed.
///
/// A dedicated thread owns the [`LineReader`] and blocks on it; malformed
/// lines are skipped there and never reach the channel.
pub struct PositionStream {
    receiver: Receiver<PositionSample>,
    stop_flag: Arc<AtomicBool>,
    discarded: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl PositionStream {
    /// Start reading positions from `reader` on a background thread.
    pub fn start<R>(reader: LineReader<R>, config: &StreamConfig) -> Result<PositionStream>
    where
        R: BufRead + Send + 'static,
    {
        let (sender, receiver) = crossbeam_channel::bounded(config.channel_capacity.max(1));
        let stop_flag = Arc::new(AtomicBool::new(false));
        let discarded = Arc::new(AtomicU64::new(0));

        let stop_clone = stop_flag.clone();
        let discarded_clone = discarded.clone();
        let thread = std::thread::Builder::new()
            .name("dpoint-serial".into())
            .spawn(move || {
                position_reader_loop(reader, sender, stop_clone, discarded_clone);
            })
            .map_err(|e| DpointError::Spawn(e.to_string()))?;

        Ok(PositionStream {
            receiver,
            stop_flag,
            discarded,
            thread: Some(thread),
        })
    }

    /// Receive the next position (blocks until available).
    pub fn recv(&self) -> Result<PositionSample> {
        self.receiver.recv().map_err(|_| DpointError::StreamStopped)
    }

    /// Try to receive a position without blocking.
    pub fn try_recv(&self) -> Option<PositionSample> {
        self.receiver.try_recv().ok()
    }

    /// Receive a position with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<PositionSample> {
        recv_timeout(&self.receiver, timeout)
    }

    /// Malformed lines skipped so far.
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Check if the reader thread is still running.
    pub fn is_active(&self) -> bool {
        !self.stop_flag.load(Ordering::Relaxed)
    }

    /// Stop the stream and wait for the reader thread to finish.
    ///
    /// The thread notices the request before its next transport read.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for PositionStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn position_reader_loop<R: BufRead>(
    mut reader: LineReader<R>,
    sender: Sender<PositionSample>,
    stop_flag: Arc<AtomicBool>,
    discarded: Arc<AtomicU64>,
) {
    log::info!("Serial position reader started");

    loop {
        if stop_flag.load(Ordering::Relaxed) {
            log::info!("Serial position reader stopping (stop flag set)");
            break;
        }

        let result = reader.read_sample_while(|| !stop_flag.load(Ordering::Relaxed));
        discarded.store(reader.discarded(), Ordering::Relaxed);

        let sample = match result {
            Ok(Some(sample)) => sample,
            Ok(None) => {
                if stop_flag.load(Ordering::Relaxed) {
                    log::info!("Serial position reader stopping (stop flag set)");
                } else {
                    log::info!("Serial source closed");
                }
                break;
            }
            Err(e) => {
                log::warn!("Serial read error: {}", e);
                break;
            }
        };

        match sender.try_send(sample) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::trace!("Position channel full, dropping sample");
            }
            Err(TrySendError::Disconnected(_)) => {
                log::info!("Position channel disconnected, stopping reader");
                break;
            }
        }
    }

    stop_flag.store(true, Ordering::Relaxed);
}

fn recv_timeout<T>(receiver: &Receiver<T>, timeout: Duration) -> Result<T> {
    receiver.recv_timeout(timeout).map_err(|e| match e {
        RecvTimeoutError::Timeout => DpointError::Timeout,
        RecvTimeoutError::Disconnected => DpointError::StreamStopped,
    })
}

/// Blocking send that gives up once the stop flag is raised or the
/// receiver is gone. Returns whether the value was delivered.
fn send_until_stopped<T>(
    sender: &Sender<T>,
    mut value: T,
    stop_flag: &AtomicBool,
    poll: Duration,
) -> bool {
    loop {
        match sender.send_timeout(value, poll) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(v)) => {
                if stop_flag.load(Ordering::Relaxed) {
                    return false;
                }
                value = v;
            }
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}
