//! Line decoder for downloader output
//!
//! Downloaders redraw their progress line with a bare `\r`, so lines end at
//! `\n`, `\r`, or a `\r\n` pair. Bytes are decoded with the configured
//! encoding; malformed sequences become U+FFFD instead of failing. Splitting
//! on single bytes only works for ASCII-compatible encodings, so UTF-16 is
//! replaced by its WHATWG output encoding, UTF-8.

use bytes::{Buf, BytesMut};
use encoding_rs::Encoding;
use tokio_util::codec::Decoder;

pub(crate) struct LineCodec {
    encoding: &'static Encoding,
    // A line just ended on '\r'; swallow a directly following '\n'.
    skip_lf: bool,
    // Bytes before this offset are known to hold no terminator.
    scanned: usize,
}

impl LineCodec {
    pub(crate) fn new(encoding: &'static Encoding) -> Self {
        Self {
            encoding: encoding.output_encoding(),
            skip_lf: false,
            scanned: 0,
        }
    }

    fn decode_text(&self, bytes: &[u8]) -> String {
        let (text, _had_errors) = self.encoding.decode_without_bom_handling(bytes);
        text.into_owned()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        if self.skip_lf {
            if buf.is_empty() {
                return Ok(None);
            }
            if buf[0] == b'\n' {
                buf.advance(1);
            }
            self.skip_lf = false;
        }

        let terminator = buf[self.scanned..]
            .iter()
            .position(|b| *b == b'\n' || *b == b'\r')
            .map(|offset| offset + self.scanned);

        let Some(pos) = terminator else {
            self.scanned = buf.len();
            return Ok(None);
        };

        let line = buf.split_to(pos + 1);
        self.scanned = 0;
        self.skip_lf = line[pos] == b'\r';
        Ok(Some(self.decode_text(&line[..pos])))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        // Unterminated final line
        let rest = buf.split();
        self.scanned = 0;
        Ok(Some(self.decode_text(&rest)))
    }
}
