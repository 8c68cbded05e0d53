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

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::multicast_client::MulticastClient;
use super::multicast_server::MulticastServerSession;
use super::unicast_client::UnicastClientSession;
use super::unicast_server::UnicastServer;
use super::{NetworkInterfaceConfig, NetworkInterfaceConfigType};
use crate::communicator::{CommunicatorInstance, CommunicatorResolver, NetworkMessage};
use crate::service::NetworkInterfaceSettings;
use crate::{AppError, AppResult};

/// Manages named endpoint configurations and every session opened from them.
///
/// Configuration and server/client start-stop are serialized; sessions live in concurrent
/// maps so traffic on one session never waits on another. All methods take `&self`, the
/// interface is meant to be shared behind an `Arc`.
pub struct NetworkInterface {
    settings: NetworkInterfaceSettings,
    resolver: Arc<dyn CommunicatorResolver>,
    configs: RwLock<HashMap<String, NetworkInterfaceConfig>>,
    lifecycle: Mutex<()>,
    session_counter: AtomicU64,
    unicast_clients: DashMap<String, Arc<UnicastClientSession>>,
    multicast_servers: DashMap<String, Arc<MulticastServerSession>>,
    unicast_servers: DashMap<String, Arc<UnicastServer>>,
    multicast_clients: DashMap<String, Arc<MulticastClient>>,
}

impl NetworkInterface {
    pub fn new(settings: NetworkInterfaceSettings, resolver: Arc<dyn CommunicatorResolver>) -> Self {
        NetworkInterface {
            settings,
            resolver,
            configs: RwLock::new(HashMap::new()),
            lifecycle: Mutex::new(()),
            session_counter: AtomicU64::new(0),
            unicast_clients: DashMap::new(),
            multicast_servers: DashMap::new(),
            unicast_servers: DashMap::new(),
            multicast_clients: DashMap::new(),
        }
    }

    pub fn settings(&self) -> &NetworkInterfaceSettings {
        &self.settings
    }

    /// Registers a named endpoint.
    ///
    /// The communicator must be able to play the role the config type requires, and
    /// `max_threads` is raised to the configured minimum. A name can be registered once.
    pub fn configure(
        &self,
        config_type: NetworkInterfaceConfigType,
        config_name: &str,
        communicator_name: &str,
        host: &str,
        port: u16,
        max_threads: usize,
    ) -> AppResult<()> {
        let mut configs = self.configs.write();
        if configs.contains_key(config_name) {
            return Err(AppError::ConfigExists(config_name.to_string()));
        }

        let required = config_type.required_capability();
        if self.resolver.capability_of(communicator_name) != Some(required) {
            return Err(AppError::CommunicatorIncompatible {
                communicator: communicator_name.to_string(),
                config_type,
            });
        }

        let max_threads = max_threads.max(self.settings.min_local_unicast_server_threads);
        let config = NetworkInterfaceConfig::new(
            config_type,
            config_name,
            communicator_name,
            host,
            port,
            max_threads,
        );
        info!(
            "configured {} {} -> {}:{} using {}",
            config_type, config_name, host, port, communicator_name
        );
        configs.insert(config_name.to_string(), config);
        Ok(())
    }

    pub fn config(&self, config_name: &str) -> Option<NetworkInterfaceConfig> {
        self.configs.read().get(config_name).cloned()
    }

    fn typed_config(
        &self,
        config_name: &str,
        expected: NetworkInterfaceConfigType,
    ) -> AppResult<NetworkInterfaceConfig> {
        let config = self
            .config(config_name)
            .ok_or_else(|| AppError::ConfigUnknown(config_name.to_string()))?;
        if config.config_type() != expected {
            return Err(AppError::ConfigIncompatible {
                config_name: config_name.to_string(),
                expected,
                actual: config.config_type(),
            });
        }
        Ok(config)
    }

    fn resolve(&self, config: &NetworkInterfaceConfig) -> AppResult<CommunicatorInstance> {
        self.resolver
            .resolve(config.communicator_name())
            .ok_or_else(|| Self::unavailable(config))
    }

    fn unavailable(config: &NetworkInterfaceConfig) -> AppError {
        AppError::CommunicatorUnavailable(config.communicator_name().to_string())
    }

    fn next_session_id(&self, config_name: &str) -> String {
        let n = self.session_counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}{}", config_name, n)
    }

    /// Next id naming no live session of either kind. Distinct config names can render
    /// the same id ("r1" with 1 and "r" with 11), so the counter alone does not do.
    fn vacant_session_id(&self, config_name: &str) -> String {
        loop {
            let id = self.next_session_id(config_name);
            if !self.unicast_clients.contains_key(&id) && !self.multicast_servers.contains_key(&id)
            {
                return id;
            }
            debug!("session id {} is taken, drawing another", id);
        }
    }

    /// Connects to a remote unicast server. Returns the new session id.
    pub fn establish_unicast(&self, config_name: &str) -> AppResult<String> {
        let config =
            self.typed_config(config_name, NetworkInterfaceConfigType::RemoteUnicastServer)?;
        let CommunicatorInstance::UnicastClient(communicator) = self.resolve(&config)? else {
            return Err(Self::unavailable(&config));
        };
        let id = self.vacant_session_id(config_name);
        let mut session = UnicastClientSession::connect(id, &config, communicator)?;
        // a concurrent establish may have taken the id while this one was connecting
        let id = loop {
            let id = session.id().to_string();
            if let Entry::Vacant(slot) = self.unicast_clients.entry(id.clone()) {
                slot.insert(Arc::new(session));
                break id;
            }
            session.reassign_id(self.vacant_session_id(config_name));
        };
        debug!("established unicast session {}", id);
        Ok(id)
    }

    pub fn destroy_unicast(&self, session_id: &str) -> AppResult<()> {
        let (_, session) = self
            .unicast_clients
            .remove(session_id)
            .ok_or_else(|| AppError::UnicastSessionNotFound(session_id.to_string()))?;
        session.close();
        debug!("destroyed unicast session {}", session.id());
        Ok(())
    }

    /// Sends a request on a session and returns the response, if the protocol has one.
    pub fn unicast(
        &self,
        session_id: &str,
        message: &dyn NetworkMessage,
    ) -> AppResult<Option<Box<dyn NetworkMessage>>> {
        let session = self
            .unicast_clients
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::UnicastSessionNotFound(session_id.to_string()))?;
        session.communicate(message)
    }

    pub fn start_local_unicast_server(&self, config_name: &str) -> AppResult<()> {
        let _lifecycle = self.lifecycle.lock();
        let config =
            self.typed_config(config_name, NetworkInterfaceConfigType::LocalUnicastServer)?;
        if let Some(server) = self.unicast_servers.get(config_name) {
            if server.is_running() {
                return Err(AppError::UnicastServerStarted(config_name.to_string()));
            }
        }
        // a server whose accept loop died leaves a stopped entry behind, reclaim it
        if let Some((_, stale)) = self.unicast_servers.remove(config_name) {
            stale.stop();
        }

        let server = UnicastServer::start(
            &config,
            self.resolver.clone(),
            self.settings.connection_queue_capacity,
        )?;
        self.unicast_servers.insert(config_name.to_string(), Arc::new(server));
        Ok(())
    }

    pub fn stop_local_unicast_server(&self, config_name: &str) -> AppResult<()> {
        let _lifecycle = self.lifecycle.lock();
        self.typed_config(config_name, NetworkInterfaceConfigType::LocalUnicastServer)?;
        let (_, server) = self
            .unicast_servers
            .remove(config_name)
            .ok_or_else(|| AppError::UnicastServerNotStarted(config_name.to_string()))?;
        let was_running = server.is_running();
        server.stop();
        if !was_running {
            return Err(AppError::UnicastServerNotStarted(config_name.to_string()));
        }
        Ok(())
    }

    pub fn is_local_unicast_server_running(&self, config_name: &str) -> AppResult<bool> {
        self.typed_config(config_name, NetworkInterfaceConfigType::LocalUnicastServer)?;
        Ok(self
            .unicast_servers
            .get(config_name)
            .is_some_and(|server| server.is_running()))
    }

    /// Connections currently held by a local unicast server, queued ones included.
    pub fn local_unicast_server_connections(&self, config_name: &str) -> AppResult<usize> {
        self.typed_config(config_name, NetworkInterfaceConfigType::LocalUnicastServer)?;
        Ok(self
            .unicast_servers
            .get(config_name)
            .map_or(0, |server| server.connection_count()))
    }

    /// Opens a send path to a remote multicast group. Returns the new session id.
    pub fn establish_multicast(&self, config_name: &str) -> AppResult<String> {
        let config =
            self.typed_config(config_name, NetworkInterfaceConfigType::RemoteMulticastClient)?;
        let CommunicatorInstance::MulticastServer(communicator) = self.resolve(&config)? else {
            return Err(Self::unavailable(&config));
        };
        let id = self.vacant_session_id(config_name);
        let ttl = self.settings.multicast_ttl;
        let mut session = MulticastServerSession::open(id, &config, communicator, ttl)?;
        let id = loop {
            let id = session.id().to_string();
            if let Entry::Vacant(slot) = self.multicast_servers.entry(id.clone()) {
                slot.insert(Arc::new(session));
                break id;
            }
            session.reassign_id(self.vacant_session_id(config_name));
        };
        debug!("established multicast session {}", id);
        Ok(id)
    }

    pub fn destroy_multicast(&self, session_id: &str) -> AppResult<()> {
        let (_, session) = self
            .multicast_servers
            .remove(session_id)
            .ok_or_else(|| AppError::MulticastSessionNotFound(session_id.to_string()))?;
        session.close();
        debug!("destroyed multicast session {}", session.id());
        Ok(())
    }

    /// Sends one message as one datagram.
    pub fn multicast(&self, session_id: &str, message: &dyn NetworkMessage) -> AppResult<()> {
        let session = self
            .multicast_servers
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::MulticastSessionNotFound(session_id.to_string()))?;
        session.send(message)
    }

    pub fn start_local_multicast_client(&self, config_name: &str) -> AppResult<()> {
        let _lifecycle = self.lifecycle.lock();
        let config =
            self.typed_config(config_name, NetworkInterfaceConfigType::LocalMulticastClient)?;
        if let Some(client) = self.multicast_clients.get(config_name) {
            if client.is_running() {
                return Err(AppError::MulticastClientStarted(config_name.to_string()));
            }
        }
        if let Some((_, stale)) = self.multicast_clients.remove(config_name) {
            stale.stop();
        }

        let CommunicatorInstance::MulticastClient(communicator) = self.resolve(&config)? else {
            return Err(Self::unavailable(&config));
        };
        let client = MulticastClient::start(
            &config,
            communicator,
            self.settings.multicast_receive_poll_interval(),
        )?;
        self.multicast_clients.insert(config_name.to_string(), Arc::new(client));
        Ok(())
    }

    pub fn stop_local_multicast_client(&self, config_name: &str) -> AppResult<()> {
        let _lifecycle = self.lifecycle.lock();
        self.typed_config(config_name, NetworkInterfaceConfigType::LocalMulticastClient)?;
        let (_, client) = self
            .multicast_clients
            .remove(config_name)
            .ok_or_else(|| AppError::MulticastClientNotStarted(config_name.to_string()))?;
        let was_running = client.is_running();
        client.stop();
        if !was_running {
            return Err(AppError::MulticastClientNotStarted(config_name.to_string()));
        }
        Ok(())
    }

    pub fn is_local_multicast_client_running(&self, config_name: &str) -> AppResult<bool> {
        self.typed_config(config_name, NetworkInterfaceConfigType::LocalMulticastClient)?;
        Ok(self
            .multicast_clients
            .get(config_name)
            .is_some_and(|client| client.is_running()))
    }

    /// Last time a unicast or multicast session was used.
    pub fn session_last_access(&self, session_id: &str) -> Option<Instant> {
        if let Some(session) = self.unicast_clients.get(session_id) {
            return Some(session.last_access());
        }
        self.multicast_servers
            .get(session_id)
            .map(|session| session.last_access())
    }

    /// Destroys every outbound session idle for longer than the session timeout.
    pub fn perform_house_keeping(&self) {
        let evicted = self.evict_idle_sessions(Instant::now());
        if evicted > 0 {
            info!("house keeping evicted {} idle sessions", evicted);
        }
    }

    /// Housekeeping against an explicit clock. Returns the number of evicted sessions.
    pub fn evict_idle_sessions(&self, now: Instant) -> usize {
        let timeout = self.settings.local_unicast_session_timeout();
        // collect first, destroying while iterating would deadlock the shard
        let idle_unicast: Vec<String> = self
            .unicast_clients
            .iter()
            .filter(|entry| entry.value().is_idle(now, timeout))
            .map(|entry| entry.key().clone())
            .collect();
        let idle_multicast: Vec<String> = self
            .multicast_servers
            .iter()
            .filter(|entry| entry.value().is_idle(now, timeout))
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted = 0;
        for id in idle_unicast {
            match self.destroy_unicast(&id) {
                Ok(()) => evicted += 1,
                Err(e) => debug!("idle unicast session {} already gone: {}", id, e),
            }
        }
        for id in idle_multicast {
            match self.destroy_multicast(&id) {
                Ok(()) => evicted += 1,
                Err(e) => debug!("idle multicast session {} already gone: {}", id, e),
            }
        }
        evicted
    }

    /// Stops every server and client and destroys every session.
    pub fn close_all(&self) {
        {
            let _lifecycle = self.lifecycle.lock();
            let servers: Vec<String> =
                self.unicast_servers.iter().map(|e| e.key().clone()).collect();
            for name in servers {
                if let Some((_, server)) = self.unicast_servers.remove(&name) {
                    server.stop();
                }
            }
            let clients: Vec<String> =
                self.multicast_clients.iter().map(|e| e.key().clone()).collect();
            for name in clients {
                if let Some((_, client)) = self.multicast_clients.remove(&name) {
                    client.stop();
                }
            }
        }

        let unicast: Vec<String> = self.unicast_clients.iter().map(|e| e.key().clone()).collect();
        for id in unicast {
            if let Err(e) = self.destroy_unicast(&id) {
                warn!("closing unicast session {}: {}", id, e);
            }
        }
        let multicast: Vec<String> =
            self.multicast_servers.iter().map(|e| e.key().clone()).collect();
        for id in multicast {
            if let Err(e) = self.destroy_multicast(&id) {
                warn!("closing multicast session {}: {}", id, e);
            }
        }
        info!("network interface closed");
    }
}
