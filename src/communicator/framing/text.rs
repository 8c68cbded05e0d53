// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::io::{self, BufRead, ErrorKind, Read, Write};

use super::{Framing, Streams};
use crate::communicator::{CommunicatorResult, Endpoint};

/// Line oriented UTF-8 text framing. Lines end with `\n`; a trailing `\r` is dropped on read.
pub struct TextFraming {
    streams: Streams,
}

impl TextFraming {
    pub fn new(name: impl Into<String>) -> Self {
        TextFraming {
            streams: Streams::new(name),
        }
    }

    pub fn with_auto_flush(mut self, auto_flush: bool) -> Self {
        self.streams.set_auto_flush(auto_flush);
        self
    }

    pub fn is_auto_flush(&self) -> bool {
        self.streams.is_auto_flush()
    }

    /// Reads one line without its terminator. `None` at end of stream.
    pub fn read_line(&mut self) -> CommunicatorResult<Option<String>> {
        self.streams.read_with(|input| {
            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            if line.ends_with('\n') {
                line.pop();
                if line.ends_with('\r') {
                    line.pop();
                }
            }
            Ok(Some(line))
        })
    }

    /// Reads a single character. `None` at end of stream.
    pub fn read_char(&mut self) -> CommunicatorResult<Option<char>> {
        self.streams.read_with(|input| {
            let lead = match input.fill_buf()?.first() {
                Some(lead) => *lead,
                None => return Ok(None),
            };
            let width = utf8_width(lead)?;
            let mut encoded = [0u8; 4];
            input.read_exact(&mut encoded[..width])?;
            std::str::from_utf8(&encoded[..width])
                .ok()
                .and_then(|s| s.chars().next())
                .map(Some)
                .ok_or_else(|| io::Error::new(ErrorKind::InvalidData, "malformed utf-8 sequence"))
        })
    }

    pub fn write(&mut self, text: &str) -> CommunicatorResult<()> {
        self.streams.write_with(|output| output.write_all(text.as_bytes()))
    }

    pub fn write_line(&mut self, text: &str) -> CommunicatorResult<()> {
        self.streams.write_with(|output| {
            output.write_all(text.as_bytes())?;
            output.write_all(b"\n")
        })
    }

    pub fn write_new_line(&mut self) -> CommunicatorResult<()> {
        self.streams.write_with(|output| output.write_all(b"\n"))
    }

    pub fn write_char(&mut self, ch: char) -> CommunicatorResult<()> {
        let mut encoded = [0u8; 4];
        let encoded = ch.encode_utf8(&mut encoded);
        self.streams.write_with(|output| output.write_all(encoded.as_bytes()))
    }
}

fn utf8_width(lead: u8) -> io::Result<usize> {
    match lead {
        0x00..=0x7f => Ok(1),
        0xc2..=0xdf => Ok(2),
        0xe0..=0xef => Ok(3),
        0xf0..=0xf4 => Ok(4),
        _ => Err(io::Error::new(
            ErrorKind::InvalidData,
            format!("invalid utf-8 lead byte {lead:#04x}"),
        )),
    }
}

impl Framing for TextFraming {
    fn name(&self) -> &str {
        self.streams.name()
    }

    fn open(&mut self, endpoint: Endpoint) -> CommunicatorResult<()> {
        self.streams.bind(endpoint)
    }

    fn close(&mut self) {
        self.streams.release();
    }

    fn is_open(&self) -> bool {
        self.streams.is_open()
    }

    fn flush_write(&mut self) -> CommunicatorResult<()> {
        self.streams.flush()
    }
}
