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

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{AppError, AppResult};
use crate::network::NetworkInterfaceConfigType;

/// Environment variables with this prefix override file values, e.g.
/// `NETIFACE__NETWORK_INTERFACE__MULTICAST_TTL=4`.
pub const ENV_PREFIX: &str = "NETIFACE";

/// Tunables of the network interface. Durations are whole seconds unless the name says
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkInterfaceSettings {
    pub local_unicast_session_timeout: u64,
    pub min_local_unicast_server_threads: usize,
    pub house_keeping_interval: u64,
    pub connection_queue_capacity: usize,
    pub multicast_receive_poll_interval_ms: u64,
    pub multicast_ttl: u32,
}

impl Default for NetworkInterfaceSettings {
    fn default() -> Self {
        NetworkInterfaceSettings {
            local_unicast_session_timeout: 300,
            min_local_unicast_server_threads: 8,
            house_keeping_interval: 60,
            connection_queue_capacity: 128,
            multicast_receive_poll_interval_ms: 200,
            multicast_ttl: 1,
        }
    }
}

impl NetworkInterfaceSettings {
    pub fn local_unicast_session_timeout(&self) -> Duration {
        Duration::from_secs(self.local_unicast_session_timeout)
    }

    pub fn house_keeping_interval(&self) -> Duration {
        Duration::from_secs(self.house_keeping_interval)
    }

    pub fn multicast_receive_poll_interval(&self) -> Duration {
        Duration::from_millis(self.multicast_receive_poll_interval_ms.max(1))
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// One named endpoint declared in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(rename = "type")]
    pub config_type: NetworkInterfaceConfigType,
    pub name: String,
    pub communicator: String,
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub max_threads: usize,
    /// start local servers and clients right after configuration
    #[serde(default)]
    pub autostart: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network_interface: NetworkInterfaceSettings,
    pub endpoints: Vec<EndpointConfig>,
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> AppResult<AppConfig> {
        let path_str = path.as_ref().to_str().ok_or_else(|| {
            AppError::InvalidValue(format!(
                "config file path: {}",
                path.as_ref().to_string_lossy()
            ))
        })?;
        let config = config::Config::builder()
            .add_source(config::File::with_name(path_str))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        Ok(app_config)
    }
}
