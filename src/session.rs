use crate::{
    config::CamrecConfig,
    error::Result,
    frame::CapturedFrame,
    ring_buffer::PrerollBuffer,
    stamp::FrameStamper,
    storage,
    worker::Recorder,
};
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

/// Lifecycle states of a recording session.
///
/// `Idle` means no session exists and new frames only feed the pre-roll
/// buffer. `Active` means motion is currently live. `Gap` covers the
/// debounce window after motion drops out, during which frames still go
/// into the recording. `Glue` is the merge window after the gap expires:
/// frames are encoded but held back, and a fresh onset folds them into
/// the same file instead of opening a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
    Gap,
    Glue,
}

type RecorderSpawner = fn(&CamrecConfig, SystemTime) -> Result<Recorder>;

/// Per-frame driver of the recording engine.
///
/// One instance is driven by the capture thread; it stamps every frame,
/// maintains the pre-roll buffer while idle, and starts, feeds and
/// stops at most one recording session at a time. All subprocess I/O
/// happens on the session's worker thread, so `process_frame` never
/// blocks on the encoder.
pub struct RecordingPipeline {
    config: CamrecConfig,
    stamper: FrameStamper,
    ring: PrerollBuffer,
    state: SessionState,
    recorder: Option<Recorder>,
    gap_window: u32,
    glue_window: u32,
    gap_remaining: u32,
    glue_remaining: u32,
    backlog_limit: usize,
    first_frame_seen: bool,
    spawner: RecorderSpawner,
}

impl RecordingPipeline {
    /// Create the pipeline. The output directory is created up front so
    /// a misconfigured path fails here rather than at the first motion
    /// event.
    pub fn new(config: &CamrecConfig) -> Result<Self> {
        storage::ensure_output_dir(Path::new(&config.storage.dir))?;

        let timezone = config.storage.resolve_timezone();

        info!("recorder ready");
        info!("    -> {}", config.storage.dir);

        Ok(Self {
            config: config.clone(),
            stamper: FrameStamper::new(timezone),
            ring: PrerollBuffer::new(config.preroll_frames() as usize),
            state: SessionState::Idle,
            recorder: None,
            gap_window: config.gap_frames(),
            glue_window: config.glue_frames(),
            gap_remaining: 0,
            glue_remaining: 0,
            backlog_limit: config.backlog_limit(),
            first_frame_seen: false,
            spawner: Recorder::spawn,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    /// Feed one captured frame through the state machine.
    ///
    /// The frame's payload is consumed here; the stamped copy is what
    /// flows onward. Errors only arise from starting a session (output
    /// directory or subprocess trouble); the pipeline stays idle in
    /// that case and the next motion event tries again.
    pub fn process_frame(&mut self, frame: CapturedFrame) -> Result<()> {
        let motion = frame.motion;
        let timestamp = frame.timestamp;
        let stamped = self.stamper.stamp(timestamp, &frame.payload);
        drop(frame);

        // The very first observation is a neutral tick: it seeds the
        // pre-roll buffer but never counts as an onset.
        if !self.first_frame_seen {
            self.first_frame_seen = true;
            self.ring.push(stamped);
            return Ok(());
        }

        self.check_backpressure();

        // No active session: buffer, and start one on motion.
        if self.recorder.is_none() {
            self.ring.push(stamped);
            if motion {
                self.start_session(timestamp)?;
            }
            return Ok(());
        }

        if motion {
            if let Some(recorder) = &self.recorder {
                recorder.put(stamped);
            }
            self.gap_remaining = self.gap_window;
            self.glue_remaining = self.glue_window;
            self.state = SessionState::Active;
        } else if self.gap_remaining > 0 {
            self.state = SessionState::Gap;
            self.gap_remaining -= 1;
            if let Some(recorder) = &self.recorder {
                recorder.put(stamped);
            }
            if self.gap_remaining == 0 {
                self.state = SessionState::Glue;
            }
        } else {
            if let Some(recorder) = &self.recorder {
                recorder.cache(stamped);
            }
            self.glue_remaining = self.glue_remaining.saturating_sub(1);
            if self.glue_remaining == 0 {
                self.stop_session();
            }
        }

        Ok(())
    }

    /// Stop any in-flight session and wait for its file to be
    /// committed. Unlike the per-frame path this blocks, so it belongs
    /// to orderly teardown only.
    pub fn shutdown(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            info!("shutting down active recording session");
            if let Some(worker) = recorder.stop() {
                match worker.join() {
                    Ok(Ok(stats)) => debug!(
                        "session closed ({} frames forwarded)",
                        stats.frames_forwarded
                    ),
                    Ok(Err(e)) => error!("session failed during shutdown: {}", e),
                    Err(_) => error!("recorder worker panicked"),
                }
            }
        }
        self.state = SessionState::Idle;
    }

    fn start_session(&mut self, started_at: SystemTime) -> Result<()> {
        let recorder = (self.spawner)(&self.config, started_at)?;

        // Seed everything captured just before the onset, oldest first,
        // then drop it from the buffer so a later session cannot replay
        // stale pre-roll.
        let seeded = self.ring.len();
        for stamped in self.ring.iter() {
            recorder.put(stamped.clone());
        }
        self.ring.clear();
        debug!("seeded {} pre-roll frames", seeded);

        self.gap_remaining = self.gap_window;
        self.glue_remaining = self.glue_window;
        self.state = SessionState::Active;
        self.recorder = Some(recorder);

        Ok(())
    }

    fn stop_session(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            // The worker drains, commits and logs on its own thread.
            let _ = recorder.stop();
        }
        self.state = SessionState::Idle;
    }

    /// Abort the session if the worker has fallen too far behind.
    /// Losing the current event bounds memory; the next onset starts
    /// clean.
    fn check_backpressure(&mut self) {
        let depth = match &self.recorder {
            Some(recorder) => recorder.queue_depth(),
            None => return,
        };
        if depth <= self.backlog_limit {
            return;
        }

        error!(
            "recorder queue depth {} exceeds limit {}",
            depth, self.backlog_limit
        );
        error!("encoder cannot keep up; check encoder options or system load");

        if let Some(recorder) = self.recorder.take() {
            let (dropped, _worker) = recorder.abort();
            warn!("aborted recording session, dropped {} queued frames", dropped);
        }
        self.state = SessionState::Idle;
    }
}
