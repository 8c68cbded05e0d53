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

//! Ready made communicators for the echo and line protocols.
//!
//! Request messages are plain Rust values: `i32` for the data protocol and `String`
//! (or `&'static str`) for the text protocols.

use async_channel::{Sender, TrySendError};
use tracing::{trace, warn};

use super::{
    CommunicatorError, CommunicatorRegistry, CommunicatorResult, DataFraming, Framed,
    Framing, MulticastClientHandler, MulticastServerHandler, NetworkMessage, TextFraming,
    UnicastClientHandler, UnicastServerHandler,
};
use crate::AppResult;

pub const DATA_ECHO_SERVER: &str = "data-echo-server";
pub const DATA_INT_CLIENT: &str = "data-int-client";
pub const TEXT_ECHO_SERVER: &str = "text-echo-server";
pub const TEXT_LINE_CLIENT: &str = "text-line-client";
pub const TEXT_MULTICAST_SENDER: &str = "text-multicast-sender";
pub const TEXT_MULTICAST_RECEIVER: &str = "text-multicast-receiver";

const INBOX_CAPACITY: usize = 1024;

fn unsupported(framing: &impl Framing, message: &dyn NetworkMessage) -> CommunicatorError {
    CommunicatorError::UnsupportedMessage {
        name: framing.name().to_string(),
        message: message.message_type().to_string(),
    }
}

fn text_of(message: &dyn NetworkMessage) -> Option<&str> {
    message
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| message.downcast_ref::<&'static str>().copied())
}

/// Reads an `i32` and writes it straight back.
#[derive(Debug, Default)]
pub struct DataEchoServer;

impl UnicastServerHandler<DataFraming> for DataEchoServer {
    fn communicate(&mut self, framing: &mut DataFraming) -> CommunicatorResult<bool> {
        let value = framing.read_i32()?;
        framing.write_i32(value)?;
        Ok(true)
    }
}

/// Sends an `i32` and waits for the peer to answer with another one.
#[derive(Debug, Default)]
pub struct DataIntClient;

impl UnicastClientHandler<DataFraming> for DataIntClient {
    fn communicate(
        &mut self,
        framing: &mut DataFraming,
        message: &dyn NetworkMessage,
    ) -> CommunicatorResult<Option<Box<dyn NetworkMessage>>> {
        let value = *message
            .downcast_ref::<i32>()
            .ok_or_else(|| unsupported(framing, message))?;
        framing.write_i32(value)?;
        let response = framing.read_i32()?;
        Ok(Some(Box::new(response)))
    }
}

/// Echoes each line back. The connection ends when the peer closes its side.
#[derive(Debug, Default)]
pub struct TextEchoServer;

impl UnicastServerHandler<TextFraming> for TextEchoServer {
    fn communicate(&mut self, framing: &mut TextFraming) -> CommunicatorResult<bool> {
        match framing.read_line()? {
            Some(line) => {
                framing.write_line(&line)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Writes one line and returns the line the peer answers with, if any.
#[derive(Debug, Default)]
pub struct TextLineClient;

impl UnicastClientHandler<TextFraming> for TextLineClient {
    fn communicate(
        &mut self,
        framing: &mut TextFraming,
        message: &dyn NetworkMessage,
    ) -> CommunicatorResult<Option<Box<dyn NetworkMessage>>> {
        let text = text_of(message).ok_or_else(|| unsupported(framing, message))?;
        framing.write_line(text)?;
        Ok(framing
            .read_line()?
            .map(|line| Box::new(line) as Box<dyn NetworkMessage>))
    }
}

#[derive(Debug, Default)]
pub struct TextMulticastSender;

impl MulticastServerHandler<TextFraming> for TextMulticastSender {
    fn send(
        &mut self,
        framing: &mut TextFraming,
        message: &dyn NetworkMessage,
    ) -> CommunicatorResult<()> {
        let text = text_of(message).ok_or_else(|| unsupported(framing, message))?;
        framing.write_line(text)
    }
}

/// Decodes the line carried by each datagram and forwards it to an inbox.
///
/// The receive thread never blocks on the inbox: when it is full the line is dropped
/// with a warning.
#[derive(Debug)]
pub struct TextMulticastReceiver {
    inbox: Sender<String>,
}

impl TextMulticastReceiver {
    pub fn new(inbox: Sender<String>) -> Self {
        TextMulticastReceiver { inbox }
    }
}

impl MulticastClientHandler<TextFraming> for TextMulticastReceiver {
    fn receive(&mut self, framing: &mut TextFraming) -> CommunicatorResult<()> {
        let Some(line) = framing.read_line()? else {
            return Ok(());
        };
        match self.inbox.try_send(line) {
            Ok(()) => {}
            Err(TrySendError::Full(line)) => {
                warn!("{} inbox is full, dropping line {:?}", framing.name(), line);
            }
            Err(TrySendError::Closed(_)) => {
                trace!("{} inbox is closed", framing.name());
            }
        }
        Ok(())
    }
}

/// Registers every builtin communicator and returns the receiving end of the inbox that
/// [`TEXT_MULTICAST_RECEIVER`] instances forward to.
pub fn register_builtin_communicators(
    registry: &CommunicatorRegistry,
) -> AppResult<async_channel::Receiver<String>> {
    let (inbox_tx, inbox_rx) = async_channel::bounded(INBOX_CAPACITY);

    registry.register_unicast_server(DATA_ECHO_SERVER, || {
        Box::new(Framed::new(DataFraming::new(DATA_ECHO_SERVER), DataEchoServer))
    })?;
    registry.register_unicast_client(DATA_INT_CLIENT, || {
        Box::new(Framed::new(DataFraming::new(DATA_INT_CLIENT), DataIntClient))
    })?;
    registry.register_unicast_server(TEXT_ECHO_SERVER, || {
        Box::new(Framed::new(TextFraming::new(TEXT_ECHO_SERVER), TextEchoServer))
    })?;
    registry.register_unicast_client(TEXT_LINE_CLIENT, || {
        Box::new(Framed::new(TextFraming::new(TEXT_LINE_CLIENT), TextLineClient))
    })?;
    registry.register_multicast_server(TEXT_MULTICAST_SENDER, || {
        Box::new(Framed::new(
            TextFraming::new(TEXT_MULTICAST_SENDER),
            TextMulticastSender,
        ))
    })?;
    registry.register_multicast_client(TEXT_MULTICAST_RECEIVER, move || {
        Box::new(Framed::new(
            TextFraming::new(TEXT_MULTICAST_RECEIVER),
            TextMulticastReceiver::new(inbox_tx.clone()),
        ))
    })?;

    Ok(inbox_rx)
}
