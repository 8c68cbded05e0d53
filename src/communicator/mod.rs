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

//! Communicator Module Implementation
//!
//! A communicator frames application messages onto a transport endpoint that the network
//! interface has already opened. It never creates or tears down sockets itself.
//!
//! # Architecture
//!
//! Two independent axes are composed instead of inherited:
//! - the role a communicator plays on the wire: unicast client, unicast server,
//!   multicast client or multicast server (see the role traits below)
//! - the payload framing: [`DataFraming`] (big-endian primitives), [`TextFraming`]
//!   (newline terminated text) or [`ObjectFraming`] (serde objects through bincode)
//!
//! [`Framed`] joins one framing with one role handler and implements the matching role
//! trait, so a new protocol only has to write the handler.
//!
//! # Components
//!
//! - `Endpoint`: the readers and writers a transport hands to a communicator
//! - `CommunicatorRegistry`: resolves communicator names to fresh instances
//! - `builtin`: ready made echo and line communicators

use std::fmt;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::net::TcpStream;

use serde::{Deserialize, Serialize};

pub use error::{CommunicatorError, CommunicatorResult};
pub use framed::{
    Framed, MulticastClientHandler, MulticastServerHandler, UnicastClientHandler,
    UnicastServerHandler,
};
pub use framing::{DataFraming, Framing, ObjectFraming, TextFraming};
pub use message::NetworkMessage;
pub use registry::{CommunicatorInstance, CommunicatorRegistry, CommunicatorResolver};

pub mod builtin;
mod error;
mod framed;
mod framing;
mod message;
mod registry;

/// The four roles a communicator can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicatorCapability {
    UnicastClient,
    UnicastServer,
    MulticastClient,
    MulticastServer,
}

impl fmt::Display for CommunicatorCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommunicatorCapability::UnicastClient => "unicast client",
            CommunicatorCapability::UnicastServer => "unicast server",
            CommunicatorCapability::MulticastClient => "multicast client",
            CommunicatorCapability::MulticastServer => "multicast server",
        };
        f.write_str(name)
    }
}

/// Transport handles given to [`Communicator::open`].
///
/// The transport decides buffering: a TCP endpoint arrives wrapped in `BufReader` and
/// `BufWriter`, datagram endpoints read and write straight into their packet buffers.
pub enum Endpoint {
    Duplex {
        input: Box<dyn BufRead + Send>,
        output: Box<dyn Write + Send>,
    },
    Inbound(Box<dyn BufRead + Send>),
    Outbound(Box<dyn Write + Send>),
}

impl Endpoint {
    /// Buffered duplex endpoint over clones of a connected stream.
    pub fn from_tcp(stream: &TcpStream) -> std::io::Result<Endpoint> {
        Ok(Endpoint::Duplex {
            input: Box::new(BufReader::new(stream.try_clone()?)),
            output: Box::new(BufWriter::new(stream.try_clone()?)),
        })
    }

    pub fn is_duplex(&self) -> bool {
        matches!(self, Endpoint::Duplex { .. })
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Duplex { .. } => f.write_str("Endpoint::Duplex"),
            Endpoint::Inbound(_) => f.write_str("Endpoint::Inbound"),
            Endpoint::Outbound(_) => f.write_str("Endpoint::Outbound"),
        }
    }
}

/// Lifecycle shared by every communicator role.
///
/// An instance moves `closed -> open -> closed`. Opening an open instance fails with
/// [`CommunicatorError::AlreadyOpen`]; closing is always allowed.
pub trait Communicator: Send {
    fn name(&self) -> &str;

    fn open(&mut self, endpoint: Endpoint) -> CommunicatorResult<()>;

    fn close(&mut self) -> CommunicatorResult<()>;

    fn is_open(&self) -> bool;
}

pub trait UnicastClientCommunicator: Communicator {
    /// Writes the request and returns the response, if the protocol has one.
    fn communicate(
        &mut self,
        message: &dyn NetworkMessage,
    ) -> CommunicatorResult<Option<Box<dyn NetworkMessage>>>;
}

pub trait UnicastServerCommunicator: Communicator {
    /// Serves one request. Returns false once the connection should be closed.
    fn communicate(&mut self) -> CommunicatorResult<bool>;
}

pub trait MulticastServerCommunicator: Communicator {
    fn send(&mut self, message: &dyn NetworkMessage) -> CommunicatorResult<()>;
}

pub trait MulticastClientCommunicator: Communicator {
    /// Decodes the message held in the current datagram.
    fn receive(&mut self) -> CommunicatorResult<()>;
}
