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
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::{
    CommunicatorCapability, MulticastClientCommunicator, MulticastServerCommunicator,
    UnicastClientCommunicator, UnicastServerCommunicator,
};
use crate::{AppError, AppResult};

/// A freshly created communicator, tagged with the role it can play.
pub enum CommunicatorInstance {
    UnicastClient(Box<dyn UnicastClientCommunicator>),
    UnicastServer(Box<dyn UnicastServerCommunicator>),
    MulticastClient(Box<dyn MulticastClientCommunicator>),
    MulticastServer(Box<dyn MulticastServerCommunicator>),
}

impl CommunicatorInstance {
    pub fn capability(&self) -> CommunicatorCapability {
        match self {
            CommunicatorInstance::UnicastClient(_) => CommunicatorCapability::UnicastClient,
            CommunicatorInstance::UnicastServer(_) => CommunicatorCapability::UnicastServer,
            CommunicatorInstance::MulticastClient(_) => CommunicatorCapability::MulticastClient,
            CommunicatorInstance::MulticastServer(_) => CommunicatorCapability::MulticastServer,
        }
    }
}

impl fmt::Debug for CommunicatorInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommunicatorInstance({})", self.capability())
    }
}

/// Looks communicators up by name.
///
/// Every call to [`CommunicatorResolver::resolve`] must hand out a new instance; the
/// network interface binds each instance to exactly one session or connection.
pub trait CommunicatorResolver: Send + Sync {
    fn capability_of(&self, name: &str) -> Option<CommunicatorCapability>;

    fn resolve(&self, name: &str) -> Option<CommunicatorInstance>;
}

type Factory<C> = Arc<dyn Fn() -> Box<C> + Send + Sync>;

#[derive(Clone)]
enum Registration {
    UnicastClient(Factory<dyn UnicastClientCommunicator>),
    UnicastServer(Factory<dyn UnicastServerCommunicator>),
    MulticastClient(Factory<dyn MulticastClientCommunicator>),
    MulticastServer(Factory<dyn MulticastServerCommunicator>),
}

impl Registration {
    fn capability(&self) -> CommunicatorCapability {
        match self {
            Registration::UnicastClient(_) => CommunicatorCapability::UnicastClient,
            Registration::UnicastServer(_) => CommunicatorCapability::UnicastServer,
            Registration::MulticastClient(_) => CommunicatorCapability::MulticastClient,
            Registration::MulticastServer(_) => CommunicatorCapability::MulticastServer,
        }
    }

    fn instantiate(&self) -> CommunicatorInstance {
        match self {
            Registration::UnicastClient(factory) => CommunicatorInstance::UnicastClient(factory()),
            Registration::UnicastServer(factory) => CommunicatorInstance::UnicastServer(factory()),
            Registration::MulticastClient(factory) => {
                CommunicatorInstance::MulticastClient(factory())
            }
            Registration::MulticastServer(factory) => {
                CommunicatorInstance::MulticastServer(factory())
            }
        }
    }
}

/// In-process resolver backed by named factories.
#[derive(Default)]
pub struct CommunicatorRegistry {
    registrations: RwLock<HashMap<String, Registration>>,
}

impl CommunicatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_unicast_client<F>(&self, name: &str, factory: F) -> AppResult<()>
    where
        F: Fn() -> Box<dyn UnicastClientCommunicator> + Send + Sync + 'static,
    {
        self.register(name, Registration::UnicastClient(Arc::new(factory)))
    }

    pub fn register_unicast_server<F>(&self, name: &str, factory: F) -> AppResult<()>
    where
        F: Fn() -> Box<dyn UnicastServerCommunicator> + Send + Sync + 'static,
    {
        self.register(name, Registration::UnicastServer(Arc::new(factory)))
    }

    pub fn register_multicast_client<F>(&self, name: &str, factory: F) -> AppResult<()>
    where
        F: Fn() -> Box<dyn MulticastClientCommunicator> + Send + Sync + 'static,
    {
        self.register(name, Registration::MulticastClient(Arc::new(factory)))
    }

    pub fn register_multicast_server<F>(&self, name: &str, factory: F) -> AppResult<()>
    where
        F: Fn() -> Box<dyn MulticastServerCommunicator> + Send + Sync + 'static,
    {
        self.register(name, Registration::MulticastServer(Arc::new(factory)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registrations.read().contains_key(name)
    }

    fn register(&self, name: &str, registration: Registration) -> AppResult<()> {
        let mut registrations = self.registrations.write();
        if registrations.contains_key(name) {
            return Err(AppError::CommunicatorExists(name.to_string()));
        }
        debug!(
            "registered {} communicator {}",
            registration.capability(),
            name
        );
        registrations.insert(name.to_string(), registration);
        Ok(())
    }
}

impl CommunicatorResolver for CommunicatorRegistry {
    fn capability_of(&self, name: &str) -> Option<CommunicatorCapability> {
        self.registrations
            .read()
            .get(name)
            .map(Registration::capability)
    }

    fn resolve(&self, name: &str) -> Option<CommunicatorInstance> {
        // clone the factory out so user code never runs under the registry lock
        let registration = self.registrations.read().get(name).cloned()?;
        Some(registration.instantiate())
    }
}
