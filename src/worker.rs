//! Recording worker: one dedicated thread per session that drains the
//! frame queue through the encoder/writer subprocess pair and commits
//! the finished file.
//!
//! The worker is the only thread that touches the subprocess pipes, so
//! blocking reads and writes there can never stall the capture path.
//! Frames tagged cache-only are encoded but held back; they are flushed
//! in order if motion resumes and dropped if the session ends first.

use crate::{
    config::CamrecConfig,
    encoder,
    error::{CamrecError, Result},
    framing,
    queue::{FrameQueue, WorkItem},
    storage::{self, OutputPaths},
};
use std::io::{Read, Write};
use std::path::Path;
use std::process::Child;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::SystemTime;
use tracing::{debug, info};

/// Counters reported by a worker when its session ends
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    /// Frame units written to the writer subprocess
    pub frames_forwarded: u64,
    /// Frame units that entered the hold-back buffer
    pub frames_cached: u64,
    /// Highest queue depth observed before a dequeue
    pub queue_high_water: usize,
    /// Largest hold-back buffer size in bytes
    pub cache_peak_bytes: u64,
}

type WorkerHandle = JoinHandle<Result<SessionStats>>;

/// Handle to one active recording session.
///
/// Created on motion onset, destroyed when the session stops. The
/// calling thread only ever touches the queue side; the worker thread
/// owns the subprocesses, the hold-back buffer and the output file.
pub struct Recorder {
    pub(crate) queue: Arc<FrameQueue>,
    worker: Option<WorkerHandle>,
}

impl Recorder {
    /// Spawn the subprocess pair and the worker thread for a new
    /// session starting at `started_at`.
    pub fn spawn(config: &CamrecConfig, started_at: SystemTime) -> Result<Self> {
        let timezone = config.storage.resolve_timezone();
        let name = storage::session_name(started_at, &timezone);
        let paths = storage::output_paths(Path::new(&config.storage.dir), &name);

        info!("recording started");

        let encoder_args = encoder::encoder_args(config);
        let mut encoder_child = encoder::encoder_command(config)
            .spawn()
            .map_err(|e| CamrecError::subprocess("encoder", format!("spawn failed: {}", e)))?;
        info!("    -> {}", encoder::render_command(&encoder_args));

        let writer_args = encoder::writer_args(config, &paths.temp_path);
        let writer_child = match encoder::writer_command(config, &paths.temp_path).spawn() {
            Ok(child) => child,
            Err(e) => {
                let _ = encoder_child.kill();
                let _ = encoder_child.wait();
                return Err(CamrecError::subprocess(
                    "writer",
                    format!("spawn failed: {}", e),
                ));
            }
        };
        info!("    -> {}", encoder::render_command(&writer_args));

        let queue = Arc::new(FrameQueue::new());
        let worker_queue = Arc::clone(&queue);
        let worker = thread::Builder::new()
            .name(format!("camrec-{}", name))
            .spawn(move || run_session(worker_queue, encoder_child, writer_child, paths))?;

        Ok(Self {
            queue,
            worker: Some(worker),
        })
    }

    /// Enqueue a frame for encoding and forwarding
    pub fn put(&self, bytes: Vec<u8>) {
        self.queue.push(bytes);
    }

    /// Enqueue a frame for encoding into the hold-back buffer
    pub fn cache(&self, bytes: Vec<u8>) {
        self.queue.push_cached(bytes);
    }

    /// Current depth of the work queue, sampled for backpressure
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    /// Finish the session cleanly. The worker drains the pipeline,
    /// commits the file and exits on its own; the returned handle can
    /// be joined or dropped.
    pub fn stop(mut self) -> Option<WorkerHandle> {
        self.queue.stop();
        self.worker.take()
    }

    /// Abort the session: the queued backlog is dropped and the
    /// partial output file is removed, never committed. Returns the
    /// number of dropped items alongside the worker handle.
    pub fn abort(mut self) -> (usize, Option<WorkerHandle>) {
        let dropped = self.queue.abort();
        (dropped, self.worker.take())
    }

    #[cfg(test)]
    pub(crate) fn stub() -> Self {
        Self {
            queue: Arc::new(FrameQueue::new()),
            worker: None,
        }
    }
}

fn run_session(
    queue: Arc<FrameQueue>,
    mut encoder_child: Child,
    mut writer_child: Child,
    paths: OutputPaths,
) -> Result<SessionStats> {
    let result = drive_session(&queue, &mut encoder_child, &mut writer_child, &paths);

    if let Err(e) = &result {
        // Never leave children or a partial file behind after a failure.
        tracing::error!("recording session failed: {}", e);
        let _ = encoder_child.kill();
        let _ = encoder_child.wait();
        let _ = writer_child.kill();
        let _ = writer_child.wait();
        storage::discard(&paths);
    }

    result
}

fn drive_session(
    queue: &FrameQueue,
    encoder_child: &mut Child,
    writer_child: &mut Child,
    paths: &OutputPaths,
) -> Result<SessionStats> {
    let mut encoder_in = encoder_child
        .stdin
        .take()
        .ok_or_else(|| CamrecError::subprocess("encoder", "stdin not piped"))?;
    let mut encoder_out = encoder_child
        .stdout
        .take()
        .ok_or_else(|| CamrecError::subprocess("encoder", "stdout not piped"))?;
    let mut writer_in = writer_child
        .stdin
        .take()
        .ok_or_else(|| CamrecError::subprocess("writer", "stdin not piped"))?;

    let (stats, discard) = pump(queue, &mut encoder_in, &mut encoder_out, &mut writer_in)?;

    // Two-phase drain: release the encoder completely before closing
    // the writer, so neither side can deadlock on a full pipe.
    drop(encoder_in);
    let _ = std::io::copy(&mut encoder_out, &mut std::io::sink());
    let encoder_status = encoder_child.wait()?;
    drop(writer_in);
    let writer_status = writer_child.wait()?;

    if discard {
        storage::discard(paths);
        info!(
            "recording discarded (max queue depth: {}, peak cache size: {})",
            stats.queue_high_water,
            storage::format_size(stats.cache_peak_bytes)
        );
        return Ok(stats);
    }

    if !encoder_status.success() {
        storage::discard(paths);
        return Err(CamrecError::subprocess(
            "encoder",
            format!("exited with {}", encoder_status),
        ));
    }
    if !writer_status.success() {
        storage::discard(paths);
        return Err(CamrecError::subprocess(
            "writer",
            format!("exited with {}", writer_status),
        ));
    }

    storage::commit(paths)?;
    info!(
        "recording finished (max queue depth: {}, peak cache size: {})",
        stats.queue_high_water,
        storage::format_size(stats.cache_peak_bytes)
    );

    Ok(stats)
}

/// Drain the queue until a stop sentinel arrives: feed each stamped
/// frame to the encoder, demux exactly one container frame back, and
/// forward or hold it back. Returns the session counters and whether
/// the sentinel asked for the output to be discarded.
fn pump<EI, EO, WI>(
    queue: &FrameQueue,
    encoder_in: &mut EI,
    encoder_out: &mut EO,
    writer_in: &mut WI,
) -> Result<(SessionStats, bool)>
where
    EI: Write,
    EO: Read,
    WI: Write,
{
    let mut stats = SessionStats::default();
    let mut holdback: Vec<framing::ContainerFrame> = Vec::new();
    let mut holdback_bytes: u64 = 0;
    let mut header_forwarded = false;

    loop {
        let depth = queue.len();
        if depth > stats.queue_high_water {
            stats.queue_high_water = depth;
        }

        let (bytes, cache_only) = match queue.pop() {
            WorkItem::Stop { discard } => {
                debug!(
                    "stop sentinel received ({} held frames dropped)",
                    holdback.len()
                );
                return Ok((stats, discard));
            }
            WorkItem::Frame { bytes, cache_only } => (bytes, cache_only),
        };

        encoder_in
            .write_all(&bytes)
            .map_err(|e| CamrecError::subprocess("encoder", format!("stdin write failed: {}", e)))?;
        drop(bytes);

        if !header_forwarded {
            let header = framing::read_stream_header(encoder_out)?;
            writer_in.write_all(&header).map_err(|e| {
                CamrecError::subprocess("writer", format!("stdin write failed: {}", e))
            })?;
            header_forwarded = true;
        }

        let frame = framing::read_container_frame(encoder_out)?;

        if cache_only {
            holdback_bytes += frame.len() as u64;
            if holdback_bytes > stats.cache_peak_bytes {
                stats.cache_peak_bytes = holdback_bytes;
            }
            stats.frames_cached += 1;
            holdback.push(frame);
            continue;
        }

        // Motion is live again: flush anything held back, in original
        // order, ahead of the new frame.
        for held in holdback.drain(..) {
            writer_in.write_all(held.as_bytes()).map_err(|e| {
                CamrecError::subprocess("writer", format!("stdin write failed: {}", e))
            })?;
            stats.frames_forwarded += 1;
        }
        holdback_bytes = 0;

        writer_in.write_all(frame.as_bytes()).map_err(|e| {
            CamrecError::subprocess("writer", format!("stdin write failed: {}", e))
        })?;
        stats.frames_forwarded += 1;
    }
}
