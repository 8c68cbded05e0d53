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

use std::io::{self, BufRead, ErrorKind, Write};

use super::{CommunicatorError, CommunicatorResult, Endpoint};

pub use data::DataFraming;
pub use object::ObjectFraming;
pub use text::TextFraming;

mod data;
mod object;
mod text;

/// Payload codec bound to an endpoint for the lifetime of one session.
pub trait Framing: Send {
    fn name(&self) -> &str;

    /// Binds the endpoint. Fails with `AlreadyOpen` while a previous endpoint is bound.
    fn open(&mut self, endpoint: Endpoint) -> CommunicatorResult<()>;

    /// Releases the bound endpoint. Safe to call any number of times.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    fn flush_write(&mut self) -> CommunicatorResult<()>;
}

/// Reader and writer currently bound to a framing, plus the bookkeeping every codec
/// shares: the open flag, the auto flush switch and error mapping.
pub(crate) struct Streams {
    name: String,
    auto_flush: bool,
    open: bool,
    input: Option<Box<dyn BufRead + Send>>,
    output: Option<Box<dyn Write + Send>>,
}

impl Streams {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Streams {
            name: name.into(),
            auto_flush: true,
            open: false,
            input: None,
            output: None,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_auto_flush(&mut self, auto_flush: bool) {
        self.auto_flush = auto_flush;
    }

    pub(crate) fn is_auto_flush(&self) -> bool {
        self.auto_flush
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    pub(crate) fn bind(&mut self, endpoint: Endpoint) -> CommunicatorResult<()> {
        if self.open {
            return Err(CommunicatorError::AlreadyOpen(self.name.clone()));
        }
        match endpoint {
            Endpoint::Duplex { input, output } => {
                self.input = Some(input);
                self.output = Some(output);
            }
            Endpoint::Inbound(input) => self.input = Some(input),
            Endpoint::Outbound(output) => self.output = Some(output),
        }
        self.open = true;
        Ok(())
    }

    pub(crate) fn release(&mut self) {
        if let Some(mut output) = self.output.take() {
            // pending bytes go out before the writer is dropped, a dead peer is not an error here
            let _ = output.flush();
        }
        self.input = None;
        self.open = false;
    }

    /// Runs a read against the bound input, mapping failures to a receive error.
    pub(crate) fn read_with<T, F>(&mut self, read: F) -> CommunicatorResult<T>
    where
        F: FnOnce(&mut (dyn BufRead + Send)) -> io::Result<T>,
    {
        let input = self.input.as_deref_mut().ok_or_else(|| {
            CommunicatorError::receive(&self.name, not_bound("no inbound stream bound"))
        })?;
        read(input).map_err(|e| CommunicatorError::receive(&self.name, e))
    }

    /// Runs a write against the bound output and flushes when auto flush is on.
    pub(crate) fn write_with<F>(&mut self, write: F) -> CommunicatorResult<()>
    where
        F: FnOnce(&mut (dyn Write + Send)) -> io::Result<()>,
    {
        let auto_flush = self.auto_flush;
        self.write_then(write, auto_flush)
    }

    /// Runs a write and always flushes, regardless of the auto flush switch.
    pub(crate) fn write_flushed<F>(&mut self, write: F) -> CommunicatorResult<()>
    where
        F: FnOnce(&mut (dyn Write + Send)) -> io::Result<()>,
    {
        self.write_then(write, true)
    }

    pub(crate) fn flush(&mut self) -> CommunicatorResult<()> {
        self.write_then(|_| Ok(()), true)
    }

    fn write_then<F>(&mut self, write: F, flush: bool) -> CommunicatorResult<()>
    where
        F: FnOnce(&mut (dyn Write + Send)) -> io::Result<()>,
    {
        let output = self.output.as_deref_mut().ok_or_else(|| {
            CommunicatorError::transmit(&self.name, not_bound("no outbound stream bound"))
        })?;
        write(&mut *output)
            .and_then(|_| if flush { output.flush() } else { Ok(()) })
            .map_err(|e| CommunicatorError::transmit(&self.name, e))
    }
}

fn not_bound(reason: &str) -> io::Error {
    io::Error::new(ErrorKind::NotConnected, reason.to_string())
}
