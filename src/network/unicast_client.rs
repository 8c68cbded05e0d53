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

use std::net::{Shutdown, TcpStream};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use super::{AccessClock, NetworkInterfaceConfig};
use crate::communicator::{Endpoint, NetworkMessage, UnicastClientCommunicator};
use crate::AppResult;

/// An outbound TCP connection with its own communicator.
pub(crate) struct UnicastClientSession {
    id: String,
    stream: TcpStream,
    communicator: Mutex<Box<dyn UnicastClientCommunicator>>,
    clock: AccessClock,
}

impl UnicastClientSession {
    /// Connects and opens the communicator. The socket is shut down again when the
    /// communicator cannot be opened on it.
    pub(crate) fn connect(
        id: String,
        config: &NetworkInterfaceConfig,
        mut communicator: Box<dyn UnicastClientCommunicator>,
    ) -> AppResult<Self> {
        let stream = TcpStream::connect((config.host(), config.port()))?;
        let opened: AppResult<()> = Endpoint::from_tcp(&stream)
            .map_err(Into::into)
            .and_then(|endpoint| communicator.open(endpoint).map_err(Into::into));
        if let Err(e) = opened {
            let _ = stream.shutdown(Shutdown::Both);
            return Err(e);
        }
        debug!(
            "unicast session {} connected to {}:{}",
            id,
            config.host(),
            config.port()
        );
        Ok(UnicastClientSession {
            id,
            stream,
            communicator: Mutex::new(communicator),
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

    /// Stamps the access time, then runs one exchange. Exchanges on a session are serial.
    pub(crate) fn communicate(
        &self,
        message: &dyn NetworkMessage,
    ) -> AppResult<Option<Box<dyn NetworkMessage>>> {
        let mut communicator = self.communicator.lock();
        self.clock.touch();
        Ok(communicator.communicate(message)?)
    }

    pub(crate) fn last_access(&self) -> Instant {
        self.clock.last_access()
    }

    pub(crate) fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        self.clock.is_idle(now, timeout)
    }

    /// Shuts the socket down, then closes the communicator. Failures are logged and
    /// swallowed.
    ///
    /// The socket goes first: an exchange blocked on a silent peer holds the communicator
    /// lock until its read fails.
    pub(crate) fn close(&self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            debug!("closing socket of unicast session {}: {}", self.id, e);
        }
        if let Err(e) = self.communicator.lock().close() {
            debug!("closing communicator of unicast session {}: {}", self.id, e);
        }
    }
}
