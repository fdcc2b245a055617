//! Progress tracking for response bodies
//!
//! Chunk framing is stripped from the buffer in place, so the first
//! `usable` bytes of the buffer are always plain body data regardless of the
//! transfer encoding.

use std::cmp::min;

use httparse::{InvalidChunkSize, parse_chunk_size};
use netbuf::Buf;

#[derive(Debug)]
pub enum BodyProgress {
    /// Fixed number of bytes, announced by `Content-Length`.
    Fixed(usize),
    /// Chunked transfer encoding.
    Chunked(ChunkState),
    /// No length information: the body runs until the peer closes.
    Eof,
}

#[derive(Debug)]
pub struct ChunkState {
    /// Plain body bytes at the start of the buffer, framing stripped.
    decoded: usize,
    /// Data bytes still missing for the current chunk.
    pending: usize,
    /// CRLF bytes to strip after the current chunk's data.
    ///
    /// `parse_chunk_size` must never see this CRLF: it would read it as an
    /// empty terminating chunk.
    trailing: usize,
    complete: bool,
}

impl BodyProgress {
    /// Strip any chunk framing that has fully arrived.
    pub fn parse(&mut self, buf: &mut Buf) -> Result<(), InvalidChunkSize> {
        match *self {
            BodyProgress::Chunked(ref mut state) => state.parse(buf),
            _ => Ok(()),
        }
    }

    /// Returns the number of usable body bytes at the start of the buffer
    /// and whether the body is complete.
    pub fn check(&self, buf: &Buf, eof: bool) -> (usize, bool) {
        match *self {
            BodyProgress::Fixed(total) if buf.len() >= total => (total, true),
            BodyProgress::Fixed(_) => (buf.len(), false),
            BodyProgress::Chunked(ref state) => {
                (state.decoded, state.complete)
            }
            BodyProgress::Eof => (buf.len(), eof),
        }
    }
}

impl ChunkState {
    pub fn new() -> ChunkState {
        ChunkState {
            decoded: 0,
            pending: 0,
            trailing: 0,
            complete: false,
        }
    }

    fn parse(&mut self, buf: &mut Buf) -> Result<(), InvalidChunkSize> {
        use httparse::Status::*;
        while !self.complete {
            let arrived = buf.len() - self.decoded;
            if arrived == 0 {
                return Ok(());
            }
            if self.pending > 0 {
                let taken = min(arrived, self.pending);
                self.decoded += taken;
                self.pending -= taken;
                if self.pending == 0 {
                    self.trailing = 2;
                }
            } else if self.trailing > 0 {
                let stripped = min(arrived, self.trailing);
                buf.remove_range(self.decoded..self.decoded + stripped);
                self.trailing -= stripped;
            } else {
                // at a chunk boundary: a size line must come next
                match parse_chunk_size(&buf[self.decoded..])? {
                    Complete((framing, 0)) => {
                        buf.remove_range(
                            self.decoded..self.decoded + framing);
                        self.complete = true;
                    }
                    Complete((framing, chunk_size)) => {
                        buf.remove_range(
                            self.decoded..self.decoded + framing);
                        self.pending = chunk_size as usize;
                    }
                    Partial => return Ok(()),
                }
            }
        }
        Ok(())
    }
}
