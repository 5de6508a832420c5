use std::time::SystemTime;

/// A captured camera frame handed to the recording engine.
///
/// The capture layer builds one of these per image and moves it into
/// [`crate::session::RecordingPipeline::process_frame`]. Ownership of
/// `payload` transfers with the frame; once the call returns the capture
/// layer is free to reuse or drop its own buffers. The motion flag is
/// attached upstream by the motion detector.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Capture instant, second resolution plus sub-second fraction
    pub timestamp: SystemTime,
    /// JPEG image bytes, starting at the SOI marker
    pub payload: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Whether the motion detector flagged this frame
    pub motion: bool,
}

impl CapturedFrame {
    /// Create a new captured frame
    pub fn new(
        timestamp: SystemTime,
        payload: Vec<u8>,
        width: u32,
        height: u32,
        motion: bool,
    ) -> Self {
        Self {
            timestamp,
            payload,
            width,
            height,
            motion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let frame = CapturedFrame::new(
            SystemTime::now(),
            vec![0xFF, 0xD8, 0xFF, 0xD9],
            640,
            480,
            true,
        );

        assert_eq!(frame.width, 640);
        assert_eq!(frame.height, 480);
        assert!(frame.motion);
        assert_eq!(frame.payload.len(), 4);
    }
}
