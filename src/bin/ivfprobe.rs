use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use camrec::framing;
use clap::Parser;
use serde::Serialize;
use tracing::warn;

/// Validate a captured container stream and print a frame summary.
///
/// The recorder moves an IVF-framed stream between its encoder and
/// writer subprocesses; this tool checks a dump of that stream (for
/// example an encoder capture taken while debugging) against the same
/// framing rules the recorder enforces, and exits nonzero on desync.
#[derive(Parser, Debug)]
#[command(name = "ivfprobe")]
#[command(about = "Validate camrec container streams and print a frame summary")]
struct Args {
    /// Path to the stream dump
    input: PathBuf,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// List every frame's declared payload size
    #[arg(long)]
    frames: bool,
}

#[derive(Debug, Serialize)]
struct StreamSummary {
    path: String,
    magic: String,
    frame_count: u64,
    payload_bytes: u64,
    stream_bytes: u64,
    min_payload: Option<u64>,
    max_payload: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let file = File::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    let mut reader = BufReader::new(file);

    let header = framing::read_stream_header(&mut reader)
        .with_context(|| format!("Invalid stream header in {}", args.input.display()))?;

    let magic = String::from_utf8_lossy(&header[..4]).to_string();
    if magic != "DKIF" {
        warn!("unrecognized stream magic {:?}, continuing anyway", magic);
    }

    let mut summary = StreamSummary {
        path: args.input.display().to_string(),
        magic,
        frame_count: 0,
        payload_bytes: 0,
        stream_bytes: framing::STREAM_HEADER_LEN as u64,
        min_payload: None,
        max_payload: None,
    };

    while let Some(frame) = framing::try_read_container_frame(&mut reader)
        .with_context(|| format!("Framing desync after frame {}", summary.frame_count))?
    {
        let payload = frame.payload_len() as u64;
        if args.frames {
            println!("frame {:>6}: {} payload bytes", summary.frame_count, payload);
        }

        summary.frame_count += 1;
        summary.payload_bytes += payload;
        summary.stream_bytes += frame.len() as u64;
        summary.min_payload = Some(summary.min_payload.map_or(payload, |min| min.min(payload)));
        summary.max_payload = Some(summary.max_payload.map_or(payload, |max| max.max(payload)));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary.path);
        println!("    magic:         {}", summary.magic);
        println!("    frames:        {}", summary.frame_count);
        println!("    payload bytes: {}", summary.payload_bytes);
        println!("    stream bytes:  {}", summary.stream_bytes);
        if let (Some(min), Some(max)) = (summary.min_payload, summary.max_payload) {
            println!("    payload range: {} - {}", min, max);
        }
    }

    Ok(())
}
