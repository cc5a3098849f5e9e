//! One-frame-in-flight pacing.
//!
//! Each submission registers a completion callback that sends the frame's
//! GPU wall time into a single-slot channel. Before encoding the next frame
//! the renderer waits on that slot, so at most one frame is outstanding and
//! the callback never touches renderer state.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TryRecvError};
use std::time::{Duration, Instant};

use crate::util::{Error, Result};

/// Sleep owed after a frame that took `elapsed`, if it was slow.
pub fn cooldown_for(elapsed: Duration, slow_frame: Duration, cooldown: Duration) -> Option<Duration> {
    (elapsed > slow_frame && !cooldown.is_zero()).then_some(cooldown)
}

pub struct FramePacer {
    tx: SyncSender<Duration>,
    rx: Receiver<Duration>,
    in_flight: bool,
    slow_frame: Duration,
    cooldown: Duration,
    last_frame_time: Option<Duration>,
}

impl FramePacer {
    pub fn new(slow_frame: Duration, cooldown: Duration) -> Self {
        let (tx, rx) = sync_channel(1);
        Self {
            tx,
            rx,
            in_flight: false,
            slow_frame,
            cooldown,
            last_frame_time: None,
        }
    }

    /// Changes the slow-frame threshold and cooldown; an outstanding frame
    /// stays tracked.
    pub fn set_timings(&mut self, slow_frame: Duration, cooldown: Duration) {
        self.slow_frame = slow_frame;
        self.cooldown = cooldown;
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// GPU time of the most recently completed frame.
    pub fn last_frame_time(&self) -> Option<Duration> {
        self.last_frame_time
    }

    /// Hooks completion of everything submitted so far.
    pub fn submitted(&mut self, queue: &wgpu::Queue) {
        let tx = self.tx.clone();
        let start = Instant::now();
        queue.on_submitted_work_done(move || {
            // the receiver may already be gone during shutdown
            let _ = tx.try_send(start.elapsed());
        });
        self.in_flight = true;
    }

    /// Blocks until the outstanding frame (if any) has completed, applying
    /// the slow-frame cooldown.
    pub fn wait(&mut self, device: &wgpu::Device) -> Result<()> {
        if !self.in_flight {
            return Ok(());
        }
        let elapsed = match self.rx.try_recv() {
            Ok(elapsed) => elapsed,
            Err(TryRecvError::Empty) => {
                device
                    .poll(wgpu::PollType::wait_indefinitely())
                    .map_err(|e| Error::gpu(format!("poll failed: {e}")))?;
                self.rx
                    .recv()
                    .map_err(|_| Error::gpu("frame completion channel closed"))?
            }
            Err(TryRecvError::Disconnected) => {
                return Err(Error::gpu("frame completion channel closed"));
            }
        };
        self.in_flight = false;
        self.finish(elapsed);
        Ok(())
    }

    fn finish(&mut self, elapsed: Duration) {
        self.last_frame_time = Some(elapsed);
        if let Some(cooldown) = cooldown_for(elapsed, self.slow_frame, self.cooldown) {
            tracing::warn!(
                frame_ms = elapsed.as_secs_f64() * 1000.0,
                cooldown_ms = cooldown.as_millis() as u64,
                "slow frame, cooling down"
            );
            std::thread::sleep(cooldown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_only_for_slow_frames() {
        let slow = Duration::from_secs(1);
        let cool = Duration::from_secs(3);
        assert_eq!(cooldown_for(Duration::from_millis(16), slow, cool), None);
        assert_eq!(cooldown_for(Duration::from_secs(1), slow, cool), None);
        assert_eq!(cooldown_for(Duration::from_millis(1500), slow, cool), Some(cool));
        assert_eq!(cooldown_for(Duration::from_secs(5), slow, Duration::ZERO), None);
    }

    #[test]
    fn test_finish_records_time() {
        let mut pacer = FramePacer::new(Duration::from_secs(1), Duration::ZERO);
        assert!(!pacer.in_flight());
        pacer.finish(Duration::from_millis(20));
        assert_eq!(pacer.last_frame_time(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn test_new_timings_keep_outstanding_frame() {
        let mut pacer = FramePacer::new(Duration::from_secs(1), Duration::from_secs(3));
        pacer.in_flight = true;
        pacer.set_timings(Duration::from_millis(500), Duration::ZERO);
        assert!(pacer.in_flight());
        assert_eq!(pacer.slow_frame, Duration::from_millis(500));

        // the completion of the earlier submission is still consumed
        pacer.tx.try_send(Duration::from_millis(700)).unwrap();
        assert_eq!(pacer.rx.try_recv().unwrap(), Duration::from_millis(700));
    }
}
