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

use std::io::{self, ErrorKind, Read, Write};

use super::{Framing, Streams};
use crate::communicator::{CommunicatorResult, Endpoint};

/// Generates a big-endian read/write pair for each fixed width numeric type.
macro_rules! numeric_primitives {
    ($(($read:ident, $write:ident, $ty:ty)),* $(,)?) => {
        $(
            pub fn $read(&mut self) -> CommunicatorResult<$ty> {
                let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                self.streams.read_with(|input| input.read_exact(&mut bytes))?;
                Ok(<$ty>::from_be_bytes(bytes))
            }

            pub fn $write(&mut self, data: $ty) -> CommunicatorResult<()> {
                self.streams.write_with(|output| output.write_all(&data.to_be_bytes()))
            }
        )*
    };
}

/// Primitive binary framing.
///
/// Numbers are fixed width big-endian, booleans are one byte (non-zero is true) and
/// characters are a single UTF-16 code unit, so streams interoperate with any peer using
/// the common `DataInput`/`DataOutput` layout.
pub struct DataFraming {
    streams: Streams,
}

impl DataFraming {
    pub fn new(name: impl Into<String>) -> Self {
        DataFraming {
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

    numeric_primitives!(
        (read_i16, write_i16, i16),
        (read_i32, write_i32, i32),
        (read_i64, write_i64, i64),
        (read_f32, write_f32, f32),
        (read_f64, write_f64, f64),
    );

    pub fn read_bool(&mut self) -> CommunicatorResult<bool> {
        Ok(self.read_byte()? != 0)
    }

    pub fn write_bool(&mut self, data: bool) -> CommunicatorResult<()> {
        self.write_byte(u8::from(data))
    }

    pub fn read_byte(&mut self) -> CommunicatorResult<u8> {
        let mut byte = [0u8; 1];
        self.streams.read_with(|input| input.read_exact(&mut byte))?;
        Ok(byte[0])
    }

    pub fn write_byte(&mut self, data: u8) -> CommunicatorResult<()> {
        self.streams.write_with(|output| output.write_all(&[data]))
    }

    pub fn read_char(&mut self) -> CommunicatorResult<char> {
        self.streams.read_with(|input| {
            let mut unit = [0u8; 2];
            input.read_exact(&mut unit)?;
            let unit = u16::from_be_bytes(unit);
            char::from_u32(u32::from(unit)).ok_or_else(|| {
                io::Error::new(ErrorKind::InvalidData, format!("unpaired surrogate {unit:#06x}"))
            })
        })
    }

    pub fn write_char(&mut self, data: char) -> CommunicatorResult<()> {
        self.streams.write_with(|output| {
            let mut units = [0u16; 2];
            match data.encode_utf16(&mut units) {
                [unit] => output.write_all(&unit.to_be_bytes()),
                _ => Err(io::Error::new(
                    ErrorKind::InvalidInput,
                    format!("character {data:?} does not fit a single code unit"),
                )),
            }
        })
    }

    /// Reads whatever is available up to `buffer.len()`; zero means end of stream.
    pub fn read_bytes(&mut self, buffer: &mut [u8]) -> CommunicatorResult<usize> {
        self.streams.read_with(|input| input.read(buffer))
    }

    pub fn read_exact_bytes(&mut self, buffer: &mut [u8]) -> CommunicatorResult<()> {
        self.streams.read_with(|input| input.read_exact(buffer))
    }

    pub fn write_bytes(&mut self, buffer: &[u8]) -> CommunicatorResult<()> {
        self.streams.write_with(|output| output.write_all(buffer))
    }
}

impl Framing for DataFraming {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communicator::framing::tests::{duplex, Recorder};
    use crate::communicator::CommunicatorError;

    #[test]
    fn test_numbers_are_big_endian() {
        let recorder = Recorder::default();
        let mut framing = DataFraming::new("data");
        framing.open(duplex(b"", recorder.clone())).unwrap();

        framing.write_i32(42).unwrap();
        framing.write_i16(-2).unwrap();
        framing.write_bool(true).unwrap();
        framing.write_char('M').unwrap();

        assert_eq!(
            *recorder.bytes.lock(),
            vec![0, 0, 0, 42, 0xff, 0xfe, 1, 0, b'M']
        );
    }

    #[test]
    fn test_reads_decode_what_was_written() {
        let mut input = Vec::new();
        input.extend_from_slice(&300i32.to_be_bytes());
        input.extend_from_slice(&(-7i64).to_be_bytes());
        input.extend_from_slice(&1.5f64.to_be_bytes());
        input.push(0);
        input.extend_from_slice(&('Z' as u16).to_be_bytes());

        let mut framing = DataFraming::new("data");
        framing.open(duplex(&input, Recorder::default())).unwrap();

        assert_eq!(framing.read_i32().unwrap(), 300);
        assert_eq!(framing.read_i64().unwrap(), -7);
        assert_eq!(framing.read_f64().unwrap(), 1.5);
        assert!(!framing.read_bool().unwrap());
        assert_eq!(framing.read_char().unwrap(), 'Z');
    }

    #[test]
    fn test_short_input_is_receive_error() {
        let mut framing = DataFraming::new("short");
        framing.open(duplex(&[0, 1], Recorder::default())).unwrap();

        let err = framing.read_i32().unwrap_err();
        assert!(matches!(err, CommunicatorError::Receive { ref name, .. } if name == "short"));
        assert!(err.is_disconnect());
    }

    #[test]
    fn test_auto_flush_off_defers_flush() {
        let recorder = Recorder::default();
        let mut framing = DataFraming::new("data").with_auto_flush(false);
        framing.open(duplex(b"", recorder.clone())).unwrap();

        framing.write_i64(1).unwrap();
        assert!(recorder.flushed.lock().is_empty());

        framing.flush_write().unwrap();
        assert_eq!(recorder.flushed.lock().len(), 8);
    }

    #[test]
    fn test_auto_flush_on_flushes_every_write() {
        let recorder = Recorder::default();
        let mut framing = DataFraming::new("data");
        framing.open(duplex(b"", recorder.clone())).unwrap();

        framing.write_i16(7).unwrap();
        assert_eq!(recorder.flushed.lock().len(), 2);
    }

    #[test]
    fn test_wide_char_is_transmit_error() {
        let mut framing = DataFraming::new("data");
        framing.open(duplex(b"", Recorder::default())).unwrap();

        let err = framing.write_char('\u{1F600}').unwrap_err();
        assert!(matches!(err, CommunicatorError::Transmit { .. }));
    }

    #[test]
    fn test_open_close_lifecycle() {
        let mut framing = DataFraming::new("data");
        framing.open(duplex(b"", Recorder::default())).unwrap();
        assert!(matches!(
            framing.open(duplex(b"", Recorder::default())),
            Err(CommunicatorError::AlreadyOpen(_))
        ));
        framing.close();
        framing.close();
        assert!(!framing.is_open());
        assert!(framing.write_i32(1).is_err());
    }
}
