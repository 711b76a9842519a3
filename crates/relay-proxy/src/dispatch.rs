use std::sync::Arc;

use relay_protocol::{Arg, DispatchError, Fault, Interface, Invocation};
use serde_json::Value;

/// Name of the designated message-delivery method.
pub const ON_MESSAGE: &str = "onMessage";
pub const MESSAGE_LISTENER: &str = "MessageListener";

/// A target reachable by method name.
///
/// `interfaces` declares the capability set; an empty set means the target
/// cannot be proxied.
pub trait Dispatch: Send + Sync {
    fn interfaces(&self) -> Vec<Interface>;
    fn dispatch(&self, call: &Invocation) -> Result<Value, DispatchError>;
}

impl<T> Dispatch for Arc<T>
where
    T: Dispatch + ?Sized,
{
    fn interfaces(&self) -> Vec<Interface> {
        (**self).interfaces()
    }

    fn dispatch(&self, call: &Invocation) -> Result<Value, DispatchError> {
        (**self).dispatch(call)
    }
}

impl<T> Dispatch for Box<T>
where
    T: Dispatch + ?Sized,
{
    fn interfaces(&self) -> Vec<Interface> {
        (**self).interfaces()
    }

    fn dispatch(&self, call: &Invocation) -> Result<Value, DispatchError> {
        (**self).dispatch(call)
    }
}

pub trait MessageListener: Send + Sync {
    fn on_message(&self, message: &Arg) -> Result<(), Fault>;
}

/// Exposes a typed [`MessageListener`] through [`Dispatch`].
///
/// Faults raised by the listener come back inside a `DispatchError::Envelope`,
/// the same way a reflective call would wrap them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ListenerTarget<L> {
    listener: L,
}

impl<L> ListenerTarget<L> {
    pub fn new(listener: L) -> Self {
        Self { listener }
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }
}

impl<L: MessageListener> Dispatch for ListenerTarget<L> {
    fn interfaces(&self) -> Vec<Interface> {
        vec![Interface::new(MESSAGE_LISTENER, [ON_MESSAGE])]
    }

    fn dispatch(&self, call: &Invocation) -> Result<Value, DispatchError> {
        if call.method != ON_MESSAGE {
            return Err(DispatchError::Envelope {
                message: format!("{MESSAGE_LISTENER} declares no method {}", call.method),
                cause: None,
            });
        }

        let null = Arg::Null;
        let message = call.args.first().unwrap_or(&null);
        self.listener
            .on_message(message)
            .map(|()| Value::Null)
            .map_err(DispatchError::wrapping)
    }
}
