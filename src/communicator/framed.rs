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

use super::{
    Communicator, CommunicatorResult, Endpoint, Framing, MulticastClientCommunicator,
    MulticastServerCommunicator, NetworkMessage, UnicastClientCommunicator,
    UnicastServerCommunicator,
};

/// Protocol logic for the client side of a unicast exchange.
pub trait UnicastClientHandler<F: Framing>: Send {
    fn communicate(
        &mut self,
        framing: &mut F,
        message: &dyn NetworkMessage,
    ) -> CommunicatorResult<Option<Box<dyn NetworkMessage>>>;
}

/// Protocol logic for one request/response cycle on an accepted connection.
pub trait UnicastServerHandler<F: Framing>: Send {
    fn communicate(&mut self, framing: &mut F) -> CommunicatorResult<bool>;
}

pub trait MulticastServerHandler<F: Framing>: Send {
    fn send(&mut self, framing: &mut F, message: &dyn NetworkMessage) -> CommunicatorResult<()>;
}

pub trait MulticastClientHandler<F: Framing>: Send {
    fn receive(&mut self, framing: &mut F) -> CommunicatorResult<()>;
}

/// A communicator built from a framing and a role handler.
///
/// The framing owns the lifecycle (open, close, already open checks) and the stream
/// primitives; the handler only decides what to read and write.
///
/// ```ignore
/// registry.register_unicast_server("echo", || {
///     Box::new(Framed::new(DataFraming::new("echo"), DataEchoServer))
/// })?;
/// ```
pub struct Framed<F, H> {
    framing: F,
    handler: H,
}

impl<F: Framing, H> Framed<F, H> {
    pub fn new(framing: F, handler: H) -> Self {
        Framed { framing, handler }
    }
}

impl<F: Framing, H: Send> Communicator for Framed<F, H> {
    fn name(&self) -> &str {
        self.framing.name()
    }

    fn open(&mut self, endpoint: Endpoint) -> CommunicatorResult<()> {
        self.framing.open(endpoint)
    }

    fn close(&mut self) -> CommunicatorResult<()> {
        self.framing.close();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.framing.is_open()
    }
}

impl<F: Framing, H: UnicastClientHandler<F>> UnicastClientCommunicator for Framed<F, H> {
    fn communicate(
        &mut self,
        message: &dyn NetworkMessage,
    ) -> CommunicatorResult<Option<Box<dyn NetworkMessage>>> {
        self.handler.communicate(&mut self.framing, message)
    }
}

impl<F: Framing, H: UnicastServerHandler<F>> UnicastServerCommunicator for Framed<F, H> {
    fn communicate(&mut self) -> CommunicatorResult<bool> {
        self.handler.communicate(&mut self.framing)
    }
}

impl<F: Framing, H: MulticastServerHandler<F>> MulticastServerCommunicator for Framed<F, H> {
    fn send(&mut self, message: &dyn NetworkMessage) -> CommunicatorResult<()> {
        self.handler.send(&mut self.framing, message)
    }
}

impl<F: Framing, H: MulticastClientHandler<F>> MulticastClientCommunicator for Framed<F, H> {
    fn receive(&mut self) -> CommunicatorResult<()> {
        self.handler.receive(&mut self.framing)
    }
}
