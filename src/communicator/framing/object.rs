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

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{Framing, Streams};
use crate::communicator::{CommunicatorResult, Endpoint};

const STREAM_MAGIC: [u8; 4] = *b"NIOS";
const STREAM_VERSION: u16 = 1;
/// Upper bound for a single decoded object, guards against corrupt length prefixes.
const MAX_OBJECT_SIZE: u64 = 16 * 1024 * 1024;

fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_OBJECT_SIZE)
}

fn into_io(err: bincode::Error) -> io::Error {
    match *err {
        bincode::ErrorKind::Io(e) => e,
        other => io::Error::new(ErrorKind::InvalidData, other.to_string()),
    }
}

/// Serialized object framing. Objects are self delimiting so no length prefix is written.
///
/// On a duplex stream both sides exchange a short header when the framing opens. The local
/// header is written and flushed before the remote one is read; reversing that order would
/// leave two peers waiting on each other. Objects are flushed as soon as they are written.
pub struct ObjectFraming {
    streams: Streams,
}

impl ObjectFraming {
    pub fn new(name: impl Into<String>) -> Self {
        ObjectFraming {
            streams: Streams::new(name),
        }
    }

    pub fn read_object<T: DeserializeOwned>(&mut self) -> CommunicatorResult<T> {
        self.streams
            .read_with(|input| codec().deserialize_from(input).map_err(into_io))
    }

    pub fn write_object<T: Serialize + ?Sized>(&mut self, object: &T) -> CommunicatorResult<()> {
        self.streams
            .write_flushed(|output| codec().serialize_into(output, object).map_err(into_io))
    }

    fn handshake(&mut self) -> CommunicatorResult<()> {
        self.streams.write_flushed(|output| {
            output.write_all(&STREAM_MAGIC)?;
            output.write_all(&STREAM_VERSION.to_be_bytes())
        })?;
        self.streams.read_with(|input| {
            let mut header = [0u8; 6];
            input.read_exact(&mut header)?;
            let version = u16::from_be_bytes([header[4], header[5]]);
            if header[..4] != STREAM_MAGIC || version != STREAM_VERSION {
                return Err(io::Error::new(
                    ErrorKind::InvalidData,
                    format!("invalid object stream header {header:02x?}"),
                ));
            }
            Ok(())
        })
    }
}

impl Framing for ObjectFraming {
    fn name(&self) -> &str {
        self.streams.name()
    }

    fn open(&mut self, endpoint: Endpoint) -> CommunicatorResult<()> {
        let duplex = endpoint.is_duplex();
        self.streams.bind(endpoint)?;
        // datagrams carry one object each and have no stream to negotiate
        if duplex {
            if let Err(e) = self.handshake() {
                self.streams.release();
                return Err(e);
            }
        }
        Ok(())
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
