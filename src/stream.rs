//! Multiplexed log stream decoding.
//!
//! Container runtimes deliver stdout and stderr of a non-TTY container as a
//! single byte stream of frames:
//!
//! ```text
//! +--------+----------+-------------------+-----------------+
//! | tag u8 | 3 x 0x00 | length u32 (BE)   | payload[length] |
//! +--------+----------+-------------------+-----------------+
//! ```
//!
//! Tag `1` marks stdout, tag `2` marks stderr. [`demux`] splits such a
//! stream back into its two sub-streams and [`encode_frame`] produces it.

/// Size of a frame header in bytes.
pub const HEADER_LEN: usize = 8;

/// Stream a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    /// Standard output (tag `1`)
    Stdout,
    /// Standard error (tag `2`)
    Stderr,
}

impl StreamType {
    /// Wire tag for this stream.
    pub fn tag(self) -> u8 {
        match self {
            StreamType::Stdout => 1,
            StreamType::Stderr => 2,
        }
    }

    /// Decode a wire tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(StreamType::Stdout),
            2 => Some(StreamType::Stderr),
            _ => None,
        }
    }
}

/// Framing violations found while decoding a log stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedStreamError {
    /// Header tag is neither stdout nor stderr
    #[error("unknown stream type {tag} in frame at offset {offset}")]
    UnknownStreamType { tag: u8, offset: usize },

    /// Fewer than [`HEADER_LEN`] bytes left where a header was expected
    #[error("truncated frame header at offset {offset}: {available} of {HEADER_LEN} bytes")]
    TruncatedHeader { offset: usize, available: usize },

    /// Header declares more payload than the stream holds
    #[error("frame at offset {offset} declares {declared} payload bytes but only {available} remain")]
    Truncated {
        offset: usize,
        declared: usize,
        available: usize,
    },
}

/// Both sub-streams of a demultiplexed log stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Demuxed {
    /// Concatenated stdout payloads in stream order
    pub stdout: Vec<u8>,
    /// Concatenated stderr payloads in stream order
    pub stderr: Vec<u8>,
}

impl Demuxed {
    /// Sub-stream buffer for `stream`.
    pub fn buffer_mut(&mut self, stream: StreamType) -> &mut Vec<u8> {
        match stream {
            StreamType::Stdout => &mut self.stdout,
            StreamType::Stderr => &mut self.stderr,
        }
    }
}

/// Split a framed log stream into stdout and stderr.
///
/// # Errors
///
/// Returns [`MalformedStreamError`] on an unknown tag, a partial header, or a
/// declared payload length that runs past the end of `raw`.
pub fn demux(raw: &[u8]) -> Result<Demuxed, MalformedStreamError> {
    let mut out = Demuxed::default();
    let mut offset = 0;

    while offset < raw.len() {
        let rest = &raw[offset..];
        let Some(header) = rest.get(..HEADER_LEN) else {
            return Err(MalformedStreamError::TruncatedHeader {
                offset,
                available: rest.len(),
            });
        };

        let stream = StreamType::from_tag(header[0]).ok_or(
            MalformedStreamError::UnknownStreamType {
                tag: header[0],
                offset,
            },
        )?;
        let declared =
            u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;

        let body = &rest[HEADER_LEN..];
        let payload = body
            .get(..declared)
            .ok_or(MalformedStreamError::Truncated {
                offset,
                declared,
                available: body.len(),
            })?;

        out.buffer_mut(stream).extend_from_slice(payload);
        offset += HEADER_LEN + declared;
    }

    Ok(out)
}

/// Append `payload` to `out` as one or more frames tagged with `stream`.
///
/// Empty payloads produce no frames.
pub fn encode_frame(stream: StreamType, payload: &[u8], out: &mut Vec<u8>) {
    for chunk in payload.chunks(u32::MAX as usize) {
        out.reserve(HEADER_LEN + chunk.len());
        out.extend_from_slice(&[stream.tag(), 0, 0, 0]);
        out.extend_from_slice(&(chunk.len() as u32).to_be_bytes());
        out.extend_from_slice(chunk);
    }
}
