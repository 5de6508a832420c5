pub mod config;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod framing;
pub mod queue;
pub mod ring_buffer;
pub mod session;
pub mod stamp;
pub mod storage;
pub mod worker;

pub use config::CamrecConfig;
pub use error::{CamrecError, Result};
pub use frame::CapturedFrame;
pub use framing::{ContainerFrame, FRAME_HEADER_LEN, STREAM_HEADER_LEN};
pub use queue::{FrameQueue, WorkItem};
pub use ring_buffer::PrerollBuffer;
pub use session::{RecordingPipeline, SessionState};
pub use stamp::FrameStamper;
pub use storage::OutputPaths;
pub use worker::{Recorder, SessionStats};
