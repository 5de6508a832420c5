//! Capture-time metadata stamping.
//!
//! Every frame entering the engine gets a fixed-size EXIF APP1 segment
//! inserted right after the JPEG SOI marker, carrying the capture
//! timestamp as `DateTimeOriginal` / `SubSecTimeOriginal` text. The
//! encoder's overlay filter later renders exactly these two fields, so
//! the burned-in timestamp always reflects capture time rather than
//! encode time. The stamped image is wrapped as one multipart part the
//! way the encoder's mpjpeg input expects.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::time::SystemTime;

/// JPEG start-of-image marker expected at the head of every payload.
const SOI_MARKER: [u8; 2] = [0xFF, 0xD8];

/// Multipart part header preceding each stamped image, up to the
/// Content-Length value.
const PART_HEADER: &[u8] = b"--camrec\r\nContent-Type: image/jpeg\r\nContent-Length: ";

/// Byte range of the DateTimeOriginal value text within the template
/// (19 characters, NUL-terminated at offset 87).
const DATETIME_RANGE: std::ops::Range<usize> = 68..87;

/// Byte range of the SubSecTimeOriginal value text within the template
/// (3 characters, NUL-terminated at offset 63).
const SUBSEC_RANGE: std::ops::Range<usize> = 60..63;

/// EXIF APP1 segment template, including the SOI marker that replaces
/// the payload's own. Big-endian TIFF with one IFD0 entry pointing at an
/// Exif SubIFD holding DateTimeOriginal and SubSecTimeOriginal; the two
/// value regions are overwritten per frame, everything else is constant.
const EXIF_TEMPLATE: [u8; 88] = [
    0xFF, 0xD8, // SOI marker
    0xFF, 0xE1, // APP1 marker
    0x00, 0x54, // APP1 size
    0x45, 0x78, 0x69, 0x66, 0x00, 0x00, // Exif header
    0x4D, 0x4D, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08, // TIFF header
    0x00, 0x01, // IFD0 (1 entry)
    0x87, 0x69, 0x00, 0x04, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x1A, // ExifOffset
    0x00, 0x00, 0x00, 0x00, // end of link
    0x00, 0x02, // Exif SubIFD (2 entries)
    0x90, 0x03, 0x00, 0x02, 0x00, 0x00, 0x00, 0x14, 0x00, 0x00, 0x00,
    0x38, // DateTimeOriginal
    0x92, 0x91, 0x00, 0x02, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00,
    0x00, // SubSecTimeOriginal
    0x00, 0x00, 0x00, 0x00, // end of link
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // DateTimeOriginal value
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Stamps frames with capture-time metadata.
///
/// Stamping is pure: the same timestamp and payload always produce
/// byte-identical output.
pub struct FrameStamper {
    timezone: Tz,
}

impl FrameStamper {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// Build the stamped multipart part for one frame.
    ///
    /// The payload must start with a bare SOI marker and carry no APP1
    /// segment of its own; violating that is a caller bug and fails
    /// fast.
    pub fn stamp(&self, timestamp: SystemTime, payload: &[u8]) -> Vec<u8> {
        assert!(
            payload.len() >= SOI_MARKER.len() && payload[..2] == SOI_MARKER,
            "frame payload must begin with a JPEG SOI marker"
        );

        let text = self.format_timestamp(timestamp);
        let text = text.as_bytes();

        let mut exif = EXIF_TEMPLATE;
        exif[DATETIME_RANGE].copy_from_slice(&text[0..19]);
        exif[SUBSEC_RANGE].copy_from_slice(&text[20..23]);

        // The template brings its own SOI marker, so the payload's is
        // not counted twice.
        let content_length = EXIF_TEMPLATE.len() + payload.len() - SOI_MARKER.len();
        let length_line = format!("{}\r\n\r\n", content_length);

        let mut part =
            Vec::with_capacity(PART_HEADER.len() + length_line.len() + content_length);
        part.extend_from_slice(PART_HEADER);
        part.extend_from_slice(length_line.as_bytes());
        part.extend_from_slice(&exif);
        part.extend_from_slice(&payload[SOI_MARKER.len()..]);
        part
    }

    // 26 ASCII characters: "YYYY-MM-DD HH:MM:SS.ffffff". The two field
    // slices above depend on this exact shape.
    fn format_timestamp(&self, timestamp: SystemTime) -> String {
        let datetime = DateTime::<Utc>::from(timestamp).with_timezone(&self.timezone);
        let text = datetime.format("%Y-%m-%d %H:%M:%S%.6f").to_string();
        debug_assert_eq!(text.len(), 26);
        text
    }
}
