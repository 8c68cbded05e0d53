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

pub type CommunicatorResult<T> = Result<T, CommunicatorError>;

/// Failures raised by a communicator while it frames messages.
///
/// Read primitives report [`CommunicatorError::Receive`], write primitives report
/// [`CommunicatorError::Transmit`]. Both keep the communicator name so a failing
/// connection can be traced back to its configuration.
#[derive(Debug, thiserror::Error)]
pub enum CommunicatorError {
    #[error("communicator {0} is already open")]
    AlreadyOpen(String),

    #[error("communicator {name} failed to receive: {source}")]
    Receive { name: String, source: io::Error },

    #[error("communicator {name} failed to transmit: {source}")]
    Transmit { name: String, source: io::Error },

    #[error("communicator {name} does not support message {message}")]
    UnsupportedMessage { name: String, message: String },
}

impl CommunicatorError {
    pub fn receive(name: &str, source: io::Error) -> Self {
        CommunicatorError::Receive {
            name: name.to_string(),
            source,
        }
    }

    pub fn transmit(name: &str, source: io::Error) -> Self {
        CommunicatorError::Transmit {
            name: name.to_string(),
            source,
        }
    }

    /// True when the peer went away, as opposed to a framing or protocol failure.
    pub fn is_disconnect(&self) -> bool {
        match self {
            CommunicatorError::Receive { source, .. } | CommunicatorError::Transmit { source, .. } => {
                matches!(
                    source.kind(),
                    ErrorKind::UnexpectedEof
                        | ErrorKind::ConnectionReset
                        | ErrorKind::ConnectionAborted
                        | ErrorKind::BrokenPipe
                        | ErrorKind::NotConnected
                )
            }
            _ => false,
        }
    }
}
