use std::any::type_name;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use relay_capture::{CaptureSink, CaptureStore};
use relay_protocol::{Arg, DispatchError, Fault, Interface, Invocation};
use serde_json::Value;
use tracing::{info, warn};

use crate::dispatch::{Dispatch, MessageListener, ON_MESSAGE};
use crate::summarize::{Summarize, TruncatingSummarizer};

/// Forwarding wrapper that logs and captures designated deliveries.
///
/// Every call reaches the target with its original arguments; the caller sees
/// exactly the target's result or fault. Equality, hashing and formatting
/// forward to the target without logging.
pub struct ListenerProxy<T> {
    target: T,
    interfaces: Vec<Interface>,
    sink: Arc<dyn CaptureSink>,
    summarizer: Arc<dyn Summarize>,
}

impl<T: Dispatch> ListenerProxy<T> {
    /// Wraps `target`, capturing into the process-wide store.
    ///
    /// Hands the target back when it declares no interfaces; the caller
    /// should then use it directly.
    pub fn wrap(target: T) -> Result<Self, T> {
        Self::wrap_with(
            target,
            CaptureStore::global(),
            Arc::new(TruncatingSummarizer::default()),
        )
    }

    pub fn wrap_with(
        target: T,
        sink: Arc<dyn CaptureSink>,
        summarizer: Arc<dyn Summarize>,
    ) -> Result<Self, T> {
        let interfaces = target.interfaces();
        if interfaces.is_empty() {
            warn!(
                "cannot proxy listener: no interfaces exposed on {}",
                type_name::<T>()
            );
            return Err(target);
        }

        info!(
            "creating proxy for listener using interfaces: [{}]",
            interfaces
                .iter()
                .map(|interface| interface.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Self {
            target,
            interfaces,
            sink,
            summarizer,
        })
    }

    pub fn invoke(&self, method: &str, args: Vec<Arg>) -> Result<Value, Fault> {
        self.call(&Invocation::new(method, args))
    }

    pub fn call(&self, call: &Invocation) -> Result<Value, Fault> {
        let designated = call.method == ON_MESSAGE;
        if designated {
            info!(
                "{ON_MESSAGE} args={}",
                self.summarizer.summarize_args(&call.args)
            );
            self.capture(&call.args);
        }

        match self.target.dispatch(call) {
            Ok(result) => {
                if designated {
                    info!(
                        "{ON_MESSAGE} -> {}",
                        self.summarizer.summarize_value(&result)
                    );
                }
                Ok(result)
            }
            Err(err) => {
                let fault = err.into_fault();
                if designated {
                    warn!(
                        "{ON_MESSAGE} threw {}: {}",
                        fault.kind,
                        fault.message.as_deref().unwrap_or("null")
                    );
                }
                Err(fault)
            }
        }
    }

    fn capture(&self, args: &[Arg]) {
        for record in relay_extract::extract(args) {
            self.sink.record(&record);
        }
    }
}

impl<T> ListenerProxy<T> {
    /// Capability set discovered at construction.
    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn implements(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|declared| declared.name == interface)
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn into_inner(self) -> T {
        self.target
    }
}

impl<T: Dispatch> Dispatch for ListenerProxy<T> {
    fn interfaces(&self) -> Vec<Interface> {
        self.interfaces.clone()
    }

    fn dispatch(&self, call: &Invocation) -> Result<Value, DispatchError> {
        self.call(call).map_err(DispatchError::Fault)
    }
}

impl<T: Dispatch> MessageListener for ListenerProxy<T> {
    fn on_message(&self, message: &Arg) -> Result<(), Fault> {
        self.invoke(ON_MESSAGE, vec![message.clone()]).map(|_| ())
    }
}

impl<T: PartialEq> PartialEq for ListenerProxy<T> {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl<T: Eq> Eq for ListenerProxy<T> {}

impl<T: Hash> Hash for ListenerProxy<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.target.hash(state);
    }
}

impl<T: fmt::Display> fmt::Display for ListenerProxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.target, f)
    }
}

impl<T: fmt::Debug> fmt::Debug for ListenerProxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.target, f)
    }
}

/// A target that is proxied when possible and used directly otherwise.
#[derive(Debug)]
pub enum Intercepted<T> {
    Proxied(ListenerProxy<T>),
    Direct(T),
}

pub fn intercept<T: Dispatch>(target: T) -> Intercepted<T> {
    match ListenerProxy::wrap(target) {
        Ok(proxy) => Intercepted::Proxied(proxy),
        Err(target) => Intercepted::Direct(target),
    }
}

impl<T: Dispatch> Intercepted<T> {
    pub fn is_proxied(&self) -> bool {
        matches!(self, Intercepted::Proxied(_))
    }

    pub fn call(&self, call: &Invocation) -> Result<Value, Fault> {
        match self {
            Intercepted::Proxied(proxy) => proxy.call(call),
            Intercepted::Direct(target) => target.dispatch(call).map_err(DispatchError::into_fault),
        }
    }
}
