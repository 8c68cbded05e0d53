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
use std::net::{Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::NetworkInterfaceConfig;
use crate::communicator::{
    CommunicatorInstance, CommunicatorResolver, Endpoint, UnicastServerCommunicator,
};
use crate::utils::WorkerPool;
use crate::{AppError, AppResult};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

const WAKE_UP_TIMEOUT: Duration = Duration::from_secs(1);

/// Result of one pass of the accept loop. Cancellation is checked before the socket
/// result, so the wake-up connection made by `stop` is never mistaken for a client and a
/// voluntary stop is never reported as a failure.
#[derive(Debug)]
enum AcceptOutcome {
    Accepted(TcpStream, SocketAddr),
    Stopped,
    Failed(io::Error),
}

fn accept(listener: &TcpListener, cancel: &CancellationToken) -> AcceptOutcome {
    let result = listener.accept();
    if cancel.is_cancelled() {
        return AcceptOutcome::Stopped;
    }
    match result {
        Ok((stream, peer)) => AcceptOutcome::Accepted(stream, peer),
        Err(e) => AcceptOutcome::Failed(e),
    }
}

/// State shared by the server handle, its accept thread and every connection worker.
struct ServerShared {
    config_name: String,
    communicator_name: String,
    cancel: CancellationToken,
    running: AtomicBool,
    pool: WorkerPool,
    connections: DashMap<u64, TcpStream>,
}

impl ServerShared {
    /// Refuses new work and unblocks every connection waiting on a read. Workers finish
    /// the exchange they are in and exit on their own.
    fn wind_down(&self) {
        self.running.store(false, Ordering::Release);
        self.cancel.cancel();
        self.pool.shutdown_now();
    }

    fn release_connections(&self) {
        for connection in self.connections.iter() {
            if let Err(e) = connection.value().shutdown(Shutdown::Read) {
                debug!(
                    "connection {} of {} already closed: {}",
                    connection.key(),
                    self.config_name,
                    e
                );
            }
        }
    }
}

/// A local TCP listener serving each connection from a bounded worker pool.
pub(crate) struct UnicastServer {
    shared: Arc<ServerShared>,
    port: u16,
    acceptor: Mutex<Option<JoinHandle<()>>>,
}

impl UnicastServer {
    pub(crate) fn start(
        config: &NetworkInterfaceConfig,
        resolver: Arc<dyn CommunicatorResolver>,
        queue_capacity: usize,
    ) -> AppResult<Self> {
        let bind_error = |source| AppError::UnableToBindServer {
            config_name: config.config_name().to_string(),
            port: config.port(),
            source,
        };
        let listener =
            TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.port())).map_err(bind_error)?;
        let port = listener.local_addr().map_err(bind_error)?.port();

        let pool = WorkerPool::new(config.config_name(), config.max_threads(), queue_capacity)?;
        let shared = Arc::new(ServerShared {
            config_name: config.config_name().to_string(),
            communicator_name: config.communicator_name().to_string(),
            cancel: CancellationToken::new(),
            running: AtomicBool::new(true),
            pool,
            connections: DashMap::new(),
        });

        let acceptor_shared = shared.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-acceptor", config.config_name()))
            .spawn(move || accept_loop(listener, acceptor_shared, resolver));
        let acceptor = match spawned {
            Ok(acceptor) => acceptor,
            Err(e) => {
                shared.wind_down();
                return Err(e.into());
            }
        };

        info!(
            "local unicast server {} listening on port {} with {} workers",
            config.config_name(),
            port,
            config.max_threads()
        );
        Ok(UnicastServer {
            shared,
            port,
            acceptor: Mutex::new(Some(acceptor)),
        })
    }

    pub(crate) fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub(crate) fn connection_count(&self) -> usize {
        self.shared.connections.len()
    }

    /// Stops accepting, drops queued connections and cancels the live ones.
    pub(crate) fn stop(&self) {
        self.shared.wind_down();

        // the accept thread only sees the cancellation once accept() returns
        let wake_up = SocketAddr::from((Ipv4Addr::LOCALHOST, self.port));
        if let Err(e) = TcpStream::connect_timeout(&wake_up, WAKE_UP_TIMEOUT) {
            debug!("wake up connection to {} failed: {}", self.shared.config_name, e);
        }
        if let Some(acceptor) = self.acceptor.lock().take() {
            if acceptor.join().is_err() {
                error!("accept thread of {} panicked", self.shared.config_name);
            }
        }

        self.shared.release_connections();
        info!("local unicast server {} stopped", self.shared.config_name);
    }
}

fn accept_loop(
    listener: TcpListener,
    shared: Arc<ServerShared>,
    resolver: Arc<dyn CommunicatorResolver>,
) {
    loop {
        let (stream, peer) = match accept(&listener, &shared.cancel) {
            AcceptOutcome::Accepted(stream, peer) => (stream, peer),
            AcceptOutcome::Stopped => {
                debug!("accept loop of {} stopped", shared.config_name);
                break;
            }
            AcceptOutcome::Failed(e)
                if matches!(e.kind(), ErrorKind::ConnectionAborted | ErrorKind::Interrupted) =>
            {
                warn!("{} dropped a connection during accept: {}", shared.config_name, e);
                continue;
            }
            AcceptOutcome::Failed(e) => {
                error!("accept on {} failed: {}", shared.config_name, e);
                shared.wind_down();
                shared.release_connections();
                break;
            }
        };

        let communicator = match resolver.resolve(&shared.communicator_name) {
            Some(CommunicatorInstance::UnicastServer(communicator)) => communicator,
            other => {
                error!(
                    "{} cannot serve connections, communicator {} resolved to {:?}",
                    shared.config_name, shared.communicator_name, other
                );
                shared.wind_down();
                shared.release_connections();
                break;
            }
        };

        let registered = match stream.try_clone() {
            Ok(registered) => registered,
            Err(e) => {
                warn!("{} could not track connection from {}: {}", shared.config_name, peer, e);
                continue;
            }
        };
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        shared.connections.insert(id, registered);
        debug!("{} accepted connection {} from {}", shared.config_name, id, peer);

        let worker = ConnectionWorker {
            id,
            peer,
            stream,
            communicator,
            cancel: shared.cancel.child_token(),
            shared: shared.clone(),
        };
        // blocks while the queue is full; fails once the pool is shut down, which drops
        // the worker and closes its socket
        if shared.pool.submit(move || worker.run()).is_err() {
            debug!("{} stopped while a connection was queued", shared.config_name);
            break;
        }
    }
}

/// Serves one accepted connection until the protocol ends it or the server stops.
struct ConnectionWorker {
    id: u64,
    peer: SocketAddr,
    stream: TcpStream,
    communicator: Box<dyn UnicastServerCommunicator>,
    cancel: CancellationToken,
    shared: Arc<ServerShared>,
}

impl ConnectionWorker {
    fn run(mut self) {
        if self.cancel.is_cancelled() {
            return;
        }
        // opening may exchange a stream header, so it runs here and not on the accept thread
        let opened = Endpoint::from_tcp(&self.stream)
            .map_err(AppError::from)
            .and_then(|endpoint| self.communicator.open(endpoint).map_err(AppError::from));
        if let Err(e) = opened {
            warn!("connection {} from {} failed to open: {}", self.id, self.peer, e);
            return;
        }

        while !self.cancel.is_cancelled() {
            match self.communicator.communicate() {
                Ok(true) => thread::yield_now(),
                Ok(false) => break,
                Err(e) if e.is_disconnect() => {
                    debug!("connection {} from {} closed: {}", self.id, self.peer, e);
                    break;
                }
                Err(e) => {
                    error!("connection {} from {} failed: {}", self.id, self.peer, e);
                    break;
                }
            }
        }
    }
}

impl Drop for ConnectionWorker {
    fn drop(&mut self) {
        if let Err(e) = self.communicator.close() {
            debug!("closing communicator of connection {}: {}", self.id, e);
        }
        self.shared.connections.remove(&self.id);
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            debug!("socket of connection {} already closed: {}", self.id, e);
        }
        debug!("connection {} of {} released", self.id, self.shared.config_name);
    }
}
