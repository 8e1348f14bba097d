//! Line-oriented position framing for the serial feed.
//!
//! Each line carries one record of the form `[x, y, z]`. Transport-level
//! line splitting and partial writes are routine on this link, so a
//! malformed line is discarded and reading continues with the next one.

use crate::types::PositionSample;
use crate::Result;
use std::io::{BufRead, ErrorKind};

pub const FRAME_OPEN: char = '[';
pub const FRAME_CLOSE: char = ']';

/// Longest line kept, newline included. Anything longer is discarded up
/// to the next newline.
pub const MAX_LINE_LEN: usize = 1024;

/// Parse one line into a position triple.
///
/// Surrounding whitespace is ignored, as is whitespace around each field.
/// Returns `None` on missing brackets, a field count other than three, or a
/// field that is not a decimal number.
pub fn parse_line(raw: &str) -> Option<PositionSample> {
    let body = raw
        .trim()
        .strip_prefix(FRAME_OPEN)?
        .strip_suffix(FRAME_CLOSE)?;

    let mut fields = body.split(',').map(|f| f.trim().parse::<f64>());
    let x = fields.next()?.ok()?;
    let y = fields.next()?.ok()?;
    let z = fields.next()?.ok()?;
    if fields.next().is_some() {
        return None;
    }

    Some(PositionSample { x, y, z })
}

/// Blocking reader that yields only well-formed position lines.
///
/// There is no deadline here: a read blocks until a good line arrives or
/// the source reaches EOF. Read timeouts from the transport are retried
/// without losing the partial line collected so far. A line longer than
/// [`MAX_LINE_LEN`] is dropped and reading resyncs at the next newline.
pub struct LineReader<R> {
    inner: R,
    pending: Vec<u8>,
    overflowed: bool,
    discarded: u64,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: Vec::new(),
            overflowed: false,
            discarded: 0,
        }
    }

    /// Number of lines thrown away as malformed so far.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read until a well-formed line arrives. `Ok(None)` means EOF.
    pub fn read_sample(&mut self) -> Result<Option<PositionSample>> {
        self.read_sample_while(|| true)
    }

    /// Like [`read_sample`](Self::read_sample), but asks `keep_going`
    /// before every read from the transport, including after a timeout.
    /// Gives up with `Ok(None)` when it returns false; a partial line is
    /// kept for the next call.
    pub(crate) fn read_sample_while(
        &mut self,
        mut keep_going: impl FnMut() -> bool,
    ) -> Result<Option<PositionSample>> {
        loop {
            if !keep_going() {
                return Ok(None);
            }

            let (used, line_done) = {
                let available = match self.inner.fill_buf() {
                    Ok(buf) => buf,
                    Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                        continue;
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                };

                if available.is_empty() {
                    // EOF. A final unterminated line still counts.
                    if std::mem::take(&mut self.overflowed) || self.pending.is_empty() {
                        return Ok(None);
                    }
                    let line = std::mem::take(&mut self.pending);
                    return Ok(self.accept(&line));
                }

                let (chunk, line_done) = match available.iter().position(|&b| b == b'\n') {
                    Some(i) => (&available[..=i], true),
                    None => (available, false),
                };

                if !self.overflowed {
                    if self.pending.len() + chunk.len() > MAX_LINE_LEN {
                        self.overflowed = true;
                        self.pending.clear();
                        self.discarded += 1;
                        log::trace!("Discarding line longer than {} bytes", MAX_LINE_LEN);
                    } else {
                        self.pending.extend_from_slice(chunk);
                    }
                }
                (chunk.len(), line_done)
            };
            self.inner.consume(used);

            if !line_done {
                continue;
            }
            if std::mem::take(&mut self.overflowed) {
                continue;
            }
            let line = std::mem::take(&mut self.pending);
            if let Some(sample) = self.accept(&line) {
                return Ok(Some(sample));
            }
        }
    }

    fn accept(&mut self, line: &[u8]) -> Option<PositionSample> {
        let text = String::from_utf8_lossy(line);
        let sample = parse_line(&text);
        if sample.is_none() {
            self.discarded += 1;
            log::trace!("Discarding malformed line: {:?}", text.trim_end());
        }
        sample
    }
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = Result<PositionSample>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_sample().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor, Read};

    fn pos(x: f64, y: f64, z: f64) -> PositionSample {
        PositionSample { x, y, z }
    }

    #[test]
    fn test_parse_line_basic() {
        assert_eq!(parse_line("[1.0, -2.5, 3]"), Some(pos(1.0, -2.5, 3.0)));
        assert_eq!(parse_line("  [0,0,0]\r\n"), Some(pos(0.0, 0.0, 0.0)));
        assert_eq!(parse_line("[ 1e3 , -0.5 ,+2 ]"), Some(pos(1000.0, -0.5, 2.0)));
    }

    #[test]
    fn test_parse_line_rejects_malformed() {
        for line in [
            "garbage",
            "",
            "[]",
            "[1.0, 2.0]",
            "[1.0, 2.0, 3.0, 4.0]",
            "[1.0, abc, 3.0]",
            "[1.0,, 3.0]",
            "1.0, 2.0, 3.0",
            "[1.0, 2.0, 3.0",
            "1.0, 2.0, 3.0]",
            "[1.0, 2.0, 3.0]]",
        ] {
            assert_eq!(parse_line(line), None, "{line:?}");
        }
    }

    #[test]
    fn test_reader_skips_garbage_and_continues() {
        let input = "garbage\n[1.0, -2.5, 3]\n[1,2\n\n[4, 5, 6]\n";
        let mut reader = LineReader::new(Cursor::new(input));

        assert_eq!(reader.read_sample().unwrap(), Some(pos(1.0, -2.5, 3.0)));
        assert_eq!(reader.discarded(), 1);
        assert_eq!(reader.read_sample().unwrap(), Some(pos(4.0, 5.0, 6.0)));
        assert_eq!(reader.discarded(), 3);
        assert_eq!(reader.read_sample().unwrap(), None);
    }

    #[test]
    fn test_reader_accepts_unterminated_last_line() {
        let reader = LineReader::new(Cursor::new("[1,2,3]\n[7, 8, 9]"));
        let samples: Vec<_> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(samples, vec![pos(1.0, 2.0, 3.0), pos(7.0, 8.0, 9.0)]);
    }

    #[test]
    fn test_reader_tolerates_invalid_utf8() {
        let input: &[u8] = b"\xff\xfe\n[1, 1, 1]\n";
        let mut reader = LineReader::new(Cursor::new(input));
        assert_eq!(reader.read_sample().unwrap(), Some(pos(1.0, 1.0, 1.0)));
        assert_eq!(reader.discarded(), 1);
    }

    /// Hands out scripted chunks, with `None` standing for a read timeout.
    struct Chunked {
        chunks: Vec<Option<&'static [u8]>>,
    }

    impl Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            match self.chunks.remove(0) {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(chunk);
                    Ok(chunk.len())
                }
                None => Err(io::Error::new(ErrorKind::TimedOut, "timed out")),
            }
        }
    }

    #[test]
    fn test_partial_line_survives_timeout() {
        let source = Chunked {
            chunks: vec![Some(b"[1.5, "), None, None, Some(b"2.5, 3.5]\n")],
        };
        let mut reader = LineReader::new(io::BufReader::new(source));
        assert_eq!(reader.read_sample().unwrap(), Some(pos(1.5, 2.5, 3.5)));
        assert_eq!(reader.discarded(), 0);
    }

    #[test]
    fn test_read_while_gives_up_on_timeout() {
        let source = Chunked {
            chunks: vec![Some(b"[1, "), None, Some(b"2, 3]\n")],
        };
        let mut reader = LineReader::new(io::BufReader::new(source));
        // Allow the first read and the one that times out, then stop.
        let mut calls = 0;
        let keep_going = || {
            calls += 1;
            calls < 3
        };
        assert_eq!(reader.read_sample_while(keep_going).unwrap(), None);
        // The partial line is kept for the next attempt.
        assert_eq!(reader.read_sample().unwrap(), Some(pos(1.0, 2.0, 3.0)));
    }

    /// Endless feed of the same line that never times out.
    struct Endless(&'static [u8]);

    impl Read for Endless {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.0.len().min(buf.len());
            buf[..n].copy_from_slice(&self.0[..n]);
            Ok(n)
        }
    }

    #[test]
    fn test_read_while_stops_on_busy_feed() {
        let mut reader = LineReader::new(io::BufReader::new(Endless(b"garbage\n")));
        let mut calls = 0;
        let result = reader.read_sample_while(|| {
            calls += 1;
            calls <= 10
        });
        assert_eq!(result.unwrap(), None);
        assert!(reader.discarded() > 0);
    }

    #[test]
    fn test_overlong_line_is_discarded_and_resyncs() {
        let mut input = vec![b'x'; 3 * MAX_LINE_LEN];
        input.extend_from_slice(b"]\n[1, 2, 3]\n");
        let mut reader = LineReader::new(Cursor::new(input));

        assert_eq!(reader.read_sample().unwrap(), Some(pos(1.0, 2.0, 3.0)));
        assert_eq!(reader.discarded(), 1);
        assert_eq!(reader.read_sample().unwrap(), None);
    }

    #[test]
    fn test_pending_stays_bounded_without_newline() {
        let mut reader = LineReader::new(io::BufReader::new(Endless(b"[1, 2, 3")));
        let mut calls = 0;
        let result = reader.read_sample_while(|| {
            calls += 1;
            calls <= 1000
        });
        assert_eq!(result.unwrap(), None);
        assert!(reader.pending.len() <= MAX_LINE_LEN);
        assert_eq!(reader.discarded(), 1);
    }

    #[test]
    fn test_line_at_limit_is_kept() {
        let body = format!("[1, 2, {}]", "3".repeat(MAX_LINE_LEN - 9));
        let line = format!("{body}\n");
        assert_eq!(line.len(), MAX_LINE_LEN);
        let mut reader = LineReader::new(Cursor::new(line));
        let sample = reader.read_sample().unwrap().unwrap();
        assert_eq!((sample.x, sample.y), (1.0, 2.0));
        assert_eq!(reader.discarded(), 0);
    }

    #[test]
    fn test_hard_io_error_propagates() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(ErrorKind::BrokenPipe, "unplugged"))
            }
        }
        let mut reader = LineReader::new(io::BufReader::new(Broken));
        assert!(matches!(
            reader.read_sample(),
            Err(crate::DpointError::Io(_))
        ));
    }
}
