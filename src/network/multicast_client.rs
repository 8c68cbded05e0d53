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

use std::io::{self, ErrorKind};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use super::datagram::{DatagramSlot, MULTICAST_PACKET_SIZE};
use super::{resolve_address, NetworkInterfaceConfig};
use crate::communicator::{Endpoint, MulticastClientCommunicator};
use crate::{AppError, AppResult};

/// Binds the receive socket for a local multicast client.
///
/// When the host is a group address the socket binds the wildcard address and joins the
/// group; any other host is bound directly, which turns the client into a plain datagram
/// listener. The read timeout lets the receive loop notice cancellation.
fn bind_receive_socket(host: &str, port: u16, poll_interval: Duration) -> io::Result<UdpSocket> {
    let address = resolve_address(host, port)?;
    let domain = match address {
        SocketAddr::V4(_) => Domain::IPV4,
        SocketAddr::V6(_) => Domain::IPV6,
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;

    match address.ip() {
        IpAddr::V4(group) if group.is_multicast() => {
            let wildcard: SocketAddr = (Ipv4Addr::UNSPECIFIED, port).into();
            socket.bind(&wildcard.into())?;
            socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
        }
        IpAddr::V6(group) if group.is_multicast() => {
            let wildcard: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();
            socket.bind(&wildcard.into())?;
            socket.join_multicast_v6(&group, 0)?;
        }
        _ => socket.bind(&address.into())?,
    }

    socket.set_read_timeout(Some(poll_interval))?;
    Ok(socket.into())
}

/// A local group receiver: one socket, one communicator and one receive thread.
pub(crate) struct MulticastClient {
    config_name: String,
    cancel: CancellationToken,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl MulticastClient {
    pub(crate) fn start(
        config: &NetworkInterfaceConfig,
        mut communicator: Box<dyn MulticastClientCommunicator>,
        poll_interval: Duration,
    ) -> AppResult<Self> {
        let socket =
            bind_receive_socket(config.host(), config.port(), poll_interval).map_err(|source| {
                AppError::UnableToBindClient {
                    config_name: config.config_name().to_string(),
                    port: config.port(),
                    source,
                }
            })?;

        let slot = DatagramSlot::new();
        communicator.open(Endpoint::Inbound(Box::new(slot.reader())))?;

        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let config_name = config.config_name().to_string();
        let loop_name = config_name.clone();
        let receiver = thread::Builder::new()
            .name(format!("{}-receiver", config_name))
            .spawn(move || receive_loop(&loop_name, socket, slot, communicator, loop_cancel))?;

        info!(
            "local multicast client {} listening on {}:{}",
            config_name,
            config.host(),
            config.port()
        );
        Ok(MulticastClient {
            config_name,
            cancel,
            receiver: Mutex::new(Some(receiver)),
        })
    }

    /// False once stopped, or once the receive loop gave up on an error.
    pub(crate) fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .receiver
                .lock()
                .as_ref()
                .is_some_and(|receiver| !receiver.is_finished())
    }

    /// Cancels the receive loop and waits for it to release the socket.
    pub(crate) fn stop(&self) {
        self.cancel.cancel();
        if let Some(receiver) = self.receiver.lock().take() {
            if receiver.join().is_err() {
                error!("receive thread of {} panicked", self.config_name);
            }
        }
        debug!("local multicast client {} stopped", self.config_name);
    }
}

fn receive_loop(
    config_name: &str,
    socket: UdpSocket,
    slot: DatagramSlot,
    mut communicator: Box<dyn MulticastClientCommunicator>,
    cancel: CancellationToken,
) {
    let mut buffer = [0u8; MULTICAST_PACKET_SIZE];
    while !cancel.is_cancelled() {
        let received = match socket.recv_from(&mut buffer) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => continue,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                error!("receive on {} failed: {}", config_name, e);
                break;
            }
        };
        if cancel.is_cancelled() {
            break;
        }

        let (size, from) = received;
        trace!("{} received {} bytes from {}", config_name, size, from);
        slot.load(&buffer[..size]);
        if let Err(e) = communicator.receive() {
            error!("{} failed to decode datagram from {}: {}", config_name, from, e);
            break;
        }
    }

    if let Err(e) = communicator.close() {
        debug!("closing communicator of {}: {}", config_name, e);
    }
    // a loop that ended on its own must report not running
    cancel.cancel();
    debug!("receive loop of {} exited", config_name);
}
