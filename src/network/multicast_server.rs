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

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::datagram::{DatagramBuffer, MULTICAST_PACKET_SIZE};
use super::{resolve_address, AccessClock, NetworkInterfaceConfig};
use crate::communicator::{Endpoint, MulticastServerCommunicator, NetworkMessage};
use crate::{AppError, AppResult};

struct SendState {
    communicator: Box<dyn MulticastServerCommunicator>,
    buffer: DatagramBuffer,
}

/// A send-only UDP session towards a group (or any datagram address).
pub(crate) struct MulticastServerSession {
    id: String,
    socket: UdpSocket,
    target: SocketAddr,
    state: Mutex<SendState>,
    clock: AccessClock,
}

impl MulticastServerSession {
    pub(crate) fn open(
        id: String,
        config: &NetworkInterfaceConfig,
        mut communicator: Box<dyn MulticastServerCommunicator>,
        ttl: u32,
    ) -> AppResult<Self> {
        let target = resolve_address(config.host(), config.port())?;
        let local: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local)?;
        if let SocketAddr::V4(group) = target {
            if group.ip().is_multicast() {
                socket.set_multicast_ttl_v4(ttl)?;
            }
        }

        let buffer = DatagramBuffer::new();
        communicator.open(Endpoint::Outbound(Box::new(buffer.clone())))?;
        debug!("multicast session {} sending to {}", id, target);

        Ok(MulticastServerSession {
            id,
            socket,
            target,
            state: Mutex::new(SendState {
                communicator,
                buffer,
            }),
            clock: AccessClock::new(),
        })
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    /// Renames a session that has not been registered yet.
    pub(crate) fn reassign_id(&mut self, id: String) {
        self.id = id;
    }

    /// Encodes the message and emits it as exactly one datagram. An encoding larger than
    /// [`MULTICAST_PACKET_SIZE`] is rejected before anything reaches the socket.
    pub(crate) fn send(&self, message: &dyn NetworkMessage) -> AppResult<()> {
        let mut state = self.state.lock();
        self.clock.touch();
        state.buffer.reset();
        state.communicator.send(message)?;

        let size = state.buffer.len();
        if size > MULTICAST_PACKET_SIZE {
            state.buffer.reset();
            return Err(AppError::MessageTooLarge {
                limit: MULTICAST_PACKET_SIZE,
                size,
            });
        }

        let packet = state.buffer.take();
        self.socket.send_to(&packet, self.target)?;
        trace!("multicast session {} sent {} bytes", self.id, packet.len());
        Ok(())
    }

    pub(crate) fn last_access(&self) -> Instant {
        self.clock.last_access()
    }

    pub(crate) fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        self.clock.is_idle(now, timeout)
    }

    pub(crate) fn close(&self) {
        if let Err(e) = self.state.lock().communicator.close() {
            debug!("closing communicator of multicast session {}: {}", self.id, e);
        }
    }
}
