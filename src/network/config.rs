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

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::communicator::CommunicatorCapability;

/// The four kinds of named endpoint the network interface manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkInterfaceConfigType {
    /// a TCP listener owned by this process
    LocalUnicastServer,
    /// a TCP server this process connects to
    RemoteUnicastServer,
    /// a UDP group this process listens on
    LocalMulticastClient,
    /// a UDP group this process sends to
    RemoteMulticastClient,
}

impl NetworkInterfaceConfigType {
    /// Role a communicator must play to serve a config of this type.
    pub const fn required_capability(self) -> CommunicatorCapability {
        match self {
            NetworkInterfaceConfigType::LocalUnicastServer => CommunicatorCapability::UnicastServer,
            NetworkInterfaceConfigType::RemoteUnicastServer => CommunicatorCapability::UnicastClient,
            NetworkInterfaceConfigType::LocalMulticastClient => {
                CommunicatorCapability::MulticastClient
            }
            NetworkInterfaceConfigType::RemoteMulticastClient => {
                CommunicatorCapability::MulticastServer
            }
        }
    }
}

impl fmt::Display for NetworkInterfaceConfigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NetworkInterfaceConfigType::LocalUnicastServer => "LOCAL_UNICAST_SERVER",
            NetworkInterfaceConfigType::RemoteUnicastServer => "REMOTE_UNICAST_SERVER",
            NetworkInterfaceConfigType::LocalMulticastClient => "LOCAL_MULTICAST_CLIENT",
            NetworkInterfaceConfigType::RemoteMulticastClient => "REMOTE_MULTICAST_CLIENT",
        };
        f.write_str(name)
    }
}

/// An immutable, named endpoint description. Built only by
/// [`NetworkInterface::configure`](super::NetworkInterface::configure).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterfaceConfig {
    config_type: NetworkInterfaceConfigType,
    config_name: String,
    communicator_name: String,
    host: String,
    port: u16,
    max_threads: usize,
}

impl NetworkInterfaceConfig {
    pub(crate) fn new(
        config_type: NetworkInterfaceConfigType,
        config_name: &str,
        communicator_name: &str,
        host: &str,
        port: u16,
        max_threads: usize,
    ) -> Self {
        NetworkInterfaceConfig {
            config_type,
            config_name: config_name.to_string(),
            communicator_name: communicator_name.to_string(),
            host: host.to_string(),
            port,
            max_threads,
        }
    }

    pub fn config_type(&self) -> NetworkInterfaceConfigType {
        self.config_type
    }

    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    pub fn communicator_name(&self) -> &str {
        &self.communicator_name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn max_threads(&self) -> usize {
        self.max_threads
    }
}
