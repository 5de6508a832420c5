//! Container frame stream demuxing.
//!
//! The encoder emits an IVF-style framed stream: one fixed-size global
//! header, then frames of a fixed-size frame header whose first four
//! bytes declare the payload length (little-endian u32), immediately
//! followed by that many payload bytes. The engine treats everything
//! beyond the length field as opaque and forwards it unmodified; it
//! never reads past a declared payload boundary, and a stream that ends
//! inside a declared unit is a framing error, not an EOF.

use crate::error::{CamrecError, Result};
use std::io::Read;

/// Size of the global stream header transmitted once
pub const STREAM_HEADER_LEN: usize = 32;

/// Size of the per-frame header
pub const FRAME_HEADER_LEN: usize = 12;

/// One demuxed frame unit: header and payload as a single atomic chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerFrame {
    bytes: Vec<u8>,
}

impl ContainerFrame {
    /// Payload length declared by the frame header
    pub fn payload_len(&self) -> usize {
        u32::from_le_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]])
            as usize
    }

    /// Full unit (header + payload) for forwarding
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Total unit size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Read the global stream header.
pub fn read_stream_header<R: Read>(reader: &mut R) -> Result<[u8; STREAM_HEADER_LEN]> {
    let mut header = [0u8; STREAM_HEADER_LEN];
    read_full(reader, &mut header, "stream header")?;
    Ok(header)
}

/// Read the next frame unit. The stream ending cleanly at a frame
/// boundary yields `None`; ending anywhere inside a unit is a framing
/// error.
pub fn try_read_container_frame<R: Read>(reader: &mut R) -> Result<Option<ContainerFrame>> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    let mut filled = 0;
    while filled < FRAME_HEADER_LEN {
        let count = reader.read(&mut header[filled..])?;
        if count == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(CamrecError::framing(format!(
                "stream ended after {} of {} frame header bytes",
                filled, FRAME_HEADER_LEN
            )));
        }
        filled += count;
    }

    let payload_len =
        u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;

    let mut bytes = Vec::with_capacity(FRAME_HEADER_LEN + payload_len);
    bytes.extend_from_slice(&header);
    bytes.resize(FRAME_HEADER_LEN + payload_len, 0);
    read_full(
        reader,
        &mut bytes[FRAME_HEADER_LEN..],
        "frame payload",
    )?;

    Ok(Some(ContainerFrame { bytes }))
}

/// Read the next frame unit, treating any end of stream as a framing
/// error. Used by the recorder worker, which knows exactly one unit
/// must follow every image it feeds the encoder.
pub fn read_container_frame<R: Read>(reader: &mut R) -> Result<ContainerFrame> {
    match try_read_container_frame(reader)? {
        Some(frame) => Ok(frame),
        None => Err(CamrecError::framing(
            "stream ended where a frame was expected",
        )),
    }
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    let expected = buf.len();
    let mut filled = 0;
    while filled < expected {
        let count = reader.read(&mut buf[filled..])?;
        if count == 0 {
            return Err(CamrecError::framing(format!(
                "stream ended after {} of {} {} bytes",
                filled, expected, what
            )));
        }
        filled += count;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn synthetic_frame(tag: u8, payload_len: usize) -> Vec<u8> {
        let mut unit = Vec::with_capacity(FRAME_HEADER_LEN + payload_len);
        unit.extend_from_slice(&(payload_len as u32).to_le_bytes());
        unit.extend_from_slice(&[tag; FRAME_HEADER_LEN - 4]);
        unit.extend_from_slice(&vec![tag; payload_len]);
        unit
    }

    fn synthetic_stream(frames: &[(u8, usize)]) -> Vec<u8> {
        let mut stream = Vec::new();
        stream.extend_from_slice(b"DKIF");
        stream.extend_from_slice(&[0u8; STREAM_HEADER_LEN - 4]);
        for (tag, payload_len) in frames {
            stream.extend_from_slice(&synthetic_frame(*tag, *payload_len));
        }
        stream
    }

    #[test]
    fn test_header_then_frames_in_order() {
        let stream = synthetic_stream(&[(1, 10), (2, 0), (3, 500)]);
        let mut reader = Cursor::new(stream);

        let header = read_stream_header(&mut reader).unwrap();
        assert_eq!(&header[..4], b"DKIF");

        let sizes = [10usize, 0, 500];
        for (tag, expected) in (1u8..=3).zip(sizes) {
            let frame = read_container_frame(&mut reader).unwrap();
            assert_eq!(frame.payload_len(), expected);
            assert_eq!(frame.len(), FRAME_HEADER_LEN + expected);
            assert_eq!(frame.as_bytes()[4], tag);
        }

        assert!(try_read_container_frame(&mut reader).unwrap().is_none());
    }

    #[test]
    fn test_short_stream_header_is_framing_error() {
        let mut reader = Cursor::new(vec![0u8; STREAM_HEADER_LEN - 1]);
        let result = read_stream_header(&mut reader);
        assert!(matches!(result, Err(CamrecError::Framing { .. })));
    }

    #[test]
    fn test_truncated_payload_is_framing_error() {
        let mut stream = synthetic_frame(9, 100);
        stream.truncate(FRAME_HEADER_LEN + 40);
        let mut reader = Cursor::new(stream);

        let result = read_container_frame(&mut reader);
        assert!(matches!(result, Err(CamrecError::Framing { .. })));
    }

    #[test]
    fn test_truncated_frame_header_is_framing_error() {
        let mut reader = Cursor::new(vec![0u8; FRAME_HEADER_LEN / 2]);
        let result = try_read_container_frame(&mut reader);
        assert!(matches!(result, Err(CamrecError::Framing { .. })));
    }

    #[test]
    fn test_eof_at_frame_boundary() {
        let mut reader = Cursor::new(Vec::<u8>::new());
        assert!(try_read_container_frame(&mut reader).unwrap().is_none());

        let result = read_container_frame(&mut reader);
        assert!(matches!(result, Err(CamrecError::Framing { .. })));
    }
}
