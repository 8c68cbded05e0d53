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

//! Packet buffers shared between a datagram socket and the communicator bound to it.
//!
//! The communicator only ever sees `Read`/`Write` views; the session owning the socket
//! keeps the other handle and moves whole packets in and out.

use std::io::{self, BufRead, Read, Write};
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use parking_lot::Mutex;

/// Every multicast message must fit in one datagram of this size.
pub const MULTICAST_PACKET_SIZE: usize = 512;

/// Outbound packet assembly area. The communicator writes, the session takes the bytes.
#[derive(Debug, Clone)]
pub(crate) struct DatagramBuffer {
    inner: Arc<Mutex<BytesMut>>,
}

impl DatagramBuffer {
    pub(crate) fn new() -> Self {
        DatagramBuffer {
            inner: Arc::new(Mutex::new(BytesMut::with_capacity(MULTICAST_PACKET_SIZE))),
        }
    }

    pub(crate) fn reset(&self) {
        self.inner.lock().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Hands out the encoded packet and leaves the buffer empty.
    pub(crate) fn take(&self) -> Bytes {
        self.inner.lock().split().freeze()
    }
}

impl Write for DatagramBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Mailbox for the most recently received packet.
#[derive(Debug, Clone, Default)]
pub(crate) struct DatagramSlot {
    pending: Arc<Mutex<Option<Bytes>>>,
}

impl DatagramSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores the received bytes only, never the unused tail of the receive buffer.
    pub(crate) fn load(&self, packet: &[u8]) {
        *self.pending.lock() = Some(Bytes::copy_from_slice(packet));
    }

    pub(crate) fn reader(&self) -> DatagramReader {
        DatagramReader {
            slot: self.clone(),
            current: Bytes::new(),
        }
    }
}

/// Read view over the current packet. A newly loaded packet replaces whatever the
/// communicator left unread of the previous one.
#[derive(Debug)]
pub(crate) struct DatagramReader {
    slot: DatagramSlot,
    current: Bytes,
}

impl DatagramReader {
    fn refresh(&mut self) {
        if let Some(packet) = self.slot.pending.lock().take() {
            self.current = packet;
        }
    }
}

impl Read for DatagramReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.refresh();
        let n = buf.len().min(self.current.remaining());
        self.current.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }
}

impl BufRead for DatagramReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.refresh();
        Ok(self.current.chunk())
    }

    fn consume(&mut self, amt: usize) {
        self.current.advance(amt.min(self.current.remaining()));
    }
}
