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

use std::any::{type_name, Any};
use std::fmt::Debug;

/// An application message carried through a communicator.
///
/// The network interface never looks inside a message; only the communicator bound to a
/// session knows how to encode it. Any `Debug + Send + 'static` type qualifies.
///
/// A `Box<dyn NetworkMessage>` is itself a message, so pass `&*boxed` when handing a boxed
/// message on, otherwise the box gets wrapped a second time.
pub trait NetworkMessage: Any + Debug + Send {
    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    fn message_type(&self) -> &'static str;
}

impl<T: Any + Debug + Send> NetworkMessage for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn message_type(&self) -> &'static str {
        type_name::<T>()
    }
}

impl dyn NetworkMessage {
    pub fn is<T: NetworkMessage>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: NetworkMessage>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast<T: NetworkMessage>(self: Box<Self>) -> Result<Box<T>, Box<dyn NetworkMessage>> {
        if self.is::<T>() {
            // checked above
            Ok(self.into_any().downcast::<T>().unwrap_or_else(|_| unreachable!()))
        } else {
            Err(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Greeting(String);

    #[test]
    fn test_downcast_through_box() {
        let message: Box<dyn NetworkMessage> = Box::new(Greeting("hello".into()));
        assert!(message.is::<Greeting>());
        assert!(!message.is::<i32>());
        assert_eq!(message.downcast_ref::<Greeting>(), Some(&Greeting("hello".into())));

        let message = message.downcast::<i32>().unwrap_err();
        let greeting = message.downcast::<Greeting>().unwrap();
        assert_eq!(greeting.0, "hello");
    }

    #[test]
    fn test_message_type_names_concrete_type() {
        let message: &dyn NetworkMessage = &42i32;
        assert_eq!(message.message_type(), "i32");
    }
}
