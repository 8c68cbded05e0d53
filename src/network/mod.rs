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

//! Network Module Implementation
//!
//! This module owns every socket the process opens and the sessions built on them.
//!
//! # Architecture
//!
//! Transports are blocking `std::net` sockets driven by dedicated OS threads:
//! - an accept thread per local unicast server, feeding a bounded worker pool
//! - a receive thread per local multicast client
//! - caller threads for outbound unicast and multicast sessions
//!
//! Each transport opens a communicator on the endpoint it created and only talks to it
//! through the role traits in [`crate::communicator`].
//!
//! # Components
//!
//! - `NetworkInterface`: configuration registry and session manager
//! - `NetworkInterfaceConfig`: immutable named endpoint
//! - `UnicastServer`: listener, accept loop and connection workers
//! - `MulticastClient`: group receiver and its receive loop
//! - `UnicastClientSession` / `MulticastServerSession`: outbound sessions with idle tracking

use std::io::{self, ErrorKind};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub use config::{NetworkInterfaceConfig, NetworkInterfaceConfigType};
pub use datagram::MULTICAST_PACKET_SIZE;
pub use interface::NetworkInterface;

mod config;
mod datagram;
mod interface;
mod multicast_client;
mod multicast_server;
mod unicast_client;
mod unicast_server;

/// Resolves `host:port` to the first usable socket address.
pub(crate) fn resolve_address(host: &str, port: u16) -> io::Result<SocketAddr> {
    (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            ErrorKind::AddrNotAvailable,
            format!("no address found for {}:{}", host, port),
        )
    })
}

/// Last access time of an outbound session, read by housekeeping.
#[derive(Debug)]
pub(crate) struct AccessClock {
    last_access: Mutex<Instant>,
}

impl AccessClock {
    pub(crate) fn new() -> Self {
        AccessClock {
            last_access: Mutex::new(Instant::now()),
        }
    }

    pub(crate) fn touch(&self) {
        *self.last_access.lock() = Instant::now();
    }

    pub(crate) fn last_access(&self) -> Instant {
        *self.last_access.lock()
    }

    /// True once more than `timeout` has passed since the last access.
    pub(crate) fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_access()) > timeout
    }
}
