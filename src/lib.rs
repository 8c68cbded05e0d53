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

//! Network interface: named unicast and multicast endpoints, the sessions opened on them
//! and the communicators that frame messages over those sessions.

pub mod communicator;
pub mod network;
mod service;
mod utils;

pub use communicator::builtin::register_builtin_communicators;
pub use communicator::{CommunicatorRegistry, CommunicatorResolver, NetworkMessage};
pub use network::{
    NetworkInterface, NetworkInterfaceConfig, NetworkInterfaceConfigType, MULTICAST_PACKET_SIZE,
};
pub use service::{
    run_house_keeping, setup_local_tracing, setup_tracing, AppConfig, AppError, AppResult,
    EndpointConfig, NetworkInterfaceSettings, Shutdown, ENV_PREFIX,
};
pub use utils::WorkerPool;
