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

use std::io;

use crate::communicator::CommunicatorError;
use crate::network::NetworkInterfaceConfigType;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// configuration errors
    #[error("network interface configuration already exists: {0}")]
    ConfigExists(String),

    #[error("unknown network interface configuration: {0}")]
    ConfigUnknown(String),

    #[error("network interface configuration {config_name} is {actual}, operation requires {expected}")]
    ConfigIncompatible {
        config_name: String,
        expected: NetworkInterfaceConfigType,
        actual: NetworkInterfaceConfigType,
    },

    #[error("communicator {communicator} is incompatible with configuration type {config_type}")]
    CommunicatorIncompatible {
        communicator: String,
        config_type: NetworkInterfaceConfigType,
    },

    #[error("communicator already registered: {0}")]
    CommunicatorExists(String),

    #[error("communicator could not be resolved: {0}")]
    CommunicatorUnavailable(String),

    /// lifecycle errors
    #[error("unicast session not found: {0}")]
    UnicastSessionNotFound(String),

    #[error("multicast session not found: {0}")]
    MulticastSessionNotFound(String),

    #[error("local unicast server already started: {0}")]
    UnicastServerStarted(String),

    #[error("local unicast server not started: {0}")]
    UnicastServerNotStarted(String),

    #[error("local multicast client already started: {0}")]
    MulticastClientStarted(String),

    #[error("local multicast client not started: {0}")]
    MulticastClientNotStarted(String),

    /// transport setup errors
    #[error("unable to bind local unicast server {config_name} on port {port}: {source}")]
    UnableToBindServer {
        config_name: String,
        port: u16,
        source: io::Error,
    },

    #[error("unable to bind local multicast client {config_name} on port {port}: {source}")]
    UnableToBindClient {
        config_name: String,
        port: u16,
        source: io::Error,
    },

    /// framing errors
    #[error("message of {size} bytes is larger than the maximum packet size of {limit} bytes")]
    MessageTooLarge { limit: usize, size: usize },

    #[error(transparent)]
    Communicator(#[from] CommunicatorError),

    #[error("worker pool {0} is shut down")]
    WorkerPoolClosed(String),

    /// general errors
    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("io error: {0}")]
    IoError(#[from] io::Error),

    #[error("config file error: {0}")]
    ConfigFileError(#[from] config::ConfigError),
}
