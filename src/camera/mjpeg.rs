//! MJPEG stream frame assembly
//!
//! An MJPEG-over-HTTP stream is a concatenation of independent JPEG images,
//! each starting with the SOI marker `FF D8` and ending with the EOI marker
//! `FF D9`. The stream arrives in arbitrary chunks, so the assembler buffers
//! bytes until both markers are present and then slices out one frame,
//! keeping any trailing bytes for the next frame. Frame boundaries are
//! chunk-size independent: feeding the same bytes one at a time or in large
//! blocks yields identical frames.

/// JPEG start-of-image marker
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// JPEG end-of-image marker
pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// Accumulates stream chunks and extracts complete JPEG frames.
#[derive(Debug, Default)]
pub struct MjpegAssembler {
    buf: Vec<u8>,
}

impl MjpegAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of stream bytes to the internal buffer.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Extract the next complete JPEG frame, if one is buffered.
    ///
    /// The returned slice runs from the SOI marker through the EOI marker
    /// inclusive; consumed bytes (including any garbage before the frame)
    /// are dropped from the buffer. Partial frames stay buffered until the
    /// closing marker arrives.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            let soi = find_marker(&self.buf, &JPEG_SOI)?;
            let eoi = find_marker(&self.buf, &JPEG_EOI)?;
            let end = eoi + JPEG_EOI.len();

            if soi < eoi {
                let frame = self.buf[soi..end].to_vec();
                self.buf.drain(..end);
                return Some(frame);
            }

            // EOI before SOI: the tail of a frame whose start we never saw
            // (mid-stream join). Discard it and scan again.
            self.buf.drain(..end);
        }
    }

    /// Drop all buffered bytes (called when the stream handle is released).
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

fn find_marker(haystack: &[u8], marker: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_jpeg(payload: &[u8]) -> Vec<u8> {
        let mut frame = JPEG_SOI.to_vec();
        frame.extend_from_slice(payload);
        frame.extend_from_slice(&JPEG_EOI);
        frame
    }

    /// Feed `bytes` in chunks of `size` and collect every extracted frame.
    fn assemble_chunked(bytes: &[u8], size: usize) -> Vec<Vec<u8>> {
        let mut assembler = MjpegAssembler::new();
        let mut frames = Vec::new();
        for chunk in bytes.chunks(size) {
            assembler.extend(chunk);
            while let Some(frame) = assembler.next_frame() {
                frames.push(frame);
            }
        }
        frames
    }

    #[test]
    fn extracts_single_frame() {
        let frame = fake_jpeg(&[1, 2, 3]);
        let mut assembler = MjpegAssembler::new();
        assembler.extend(&frame);

        assert_eq!(assembler.next_frame().unwrap(), frame);
        assert_eq!(assembler.buffered(), 0);
        assert!(assembler.next_frame().is_none());
    }

    #[test]
    fn partial_frame_stays_buffered() {
        let frame = fake_jpeg(&[9, 9, 9, 9]);
        let mut assembler = MjpegAssembler::new();

        assembler.extend(&frame[..frame.len() - 1]);
        assert!(assembler.next_frame().is_none());

        assembler.extend(&frame[frame.len() - 1..]);
        assert_eq!(assembler.next_frame().unwrap(), frame);
    }

    #[test]
    fn chunk_size_does_not_change_frame_boundaries() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&fake_jpeg(&[1; 40]));
        stream.extend_from_slice(b"--boundary\r\n"); // multipart separator noise
        stream.extend_from_slice(&fake_jpeg(&[2; 7]));
        stream.extend_from_slice(&fake_jpeg(&[3; 123]));

        let reference = assemble_chunked(&stream, stream.len());
        assert_eq!(reference.len(), 3);

        for size in [1, 2, 3, 5, 16, 64, 1024] {
            assert_eq!(assemble_chunked(&stream, size), reference, "chunk size {size}");
        }
    }

    #[test]
    fn garbage_before_first_frame_is_dropped() {
        let frame = fake_jpeg(&[7, 7]);
        let mut assembler = MjpegAssembler::new();
        assembler.extend(b"HTTP noise");
        assembler.extend(&frame);

        assert_eq!(assembler.next_frame().unwrap(), frame);
    }

    #[test]
    fn orphan_frame_tail_is_discarded() {
        // Joining mid-stream: the tail of a frame (ending in EOI) arrives
        // before the first SOI we ever see.
        let frame = fake_jpeg(&[5, 5, 5]);
        let mut assembler = MjpegAssembler::new();
        assembler.extend(&[0x00, 0x01, 0xFF, 0xD9]);
        assembler.extend(&frame);

        assert_eq!(assembler.next_frame().unwrap(), frame);
        assert!(assembler.next_frame().is_none());
    }

    #[test]
    fn clear_resets_buffer() {
        let mut assembler = MjpegAssembler::new();
        assembler.extend(&JPEG_SOI);
        assembler.clear();
        assembler.extend(&fake_jpeg(&[1]));

        // The pre-clear SOI must not bleed into the next frame
        assert_eq!(assembler.next_frame().unwrap(), fake_jpeg(&[1]));
    }
}
