//! Signal handlers - native-to-host broadcast points.
//!
//! A bound class can declare signals: named event points native code
//! raises without knowing who listens. Host callables connect to a signal
//! on a specific object's binding; emission deserializes the native
//! arguments once and invokes every connected callable in insertion
//! order. When the signal declares a return type, the return value of the
//! last callable invoked wins.

use std::rc::Rc;

use crate::bridge::Bridge;
use crate::host::{HostHandle, HostRuntime, HostSignal, Value};

/// Connected callables of one signal on one object.
#[derive(Default, Clone)]
pub struct SignalHandler {
    targets: Vec<HostHandle>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all connections with a single callable. Nil clears.
    pub fn assign(&mut self, target: Option<HostHandle>) {
        self.targets.clear();
        if let Some(t) = target {
            self.targets.push(t);
        }
    }

    /// Connect a callable; reconnecting the same callable is a no-op.
    pub fn connect(&mut self, target: HostHandle) {
        if !self.targets.contains(&target) {
            self.targets.push(target);
        }
    }

    /// Disconnect a callable. Returns false if it was not connected.
    pub fn disconnect(&mut self, target: HostHandle) -> bool {
        match self.targets.iter().position(|t| *t == target) {
            Some(pos) => {
                self.targets.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Invoke every connected callable with the already-deserialized
    /// arguments. The last return value wins; no connections yield nil.
    /// Listeners get the bridge back and may reenter it.
    ///
    /// A host error or unwind aborts the broadcast mid-way and propagates.
    pub fn call(&self, bridge: &mut Bridge, argv: &[Value]) -> Result<Value, HostSignal> {
        let host = Rc::clone(&bridge.host);
        let mut result = Value::Nil;
        for target in &self.targets {
            result = host.call_callable(bridge, *target, argv)?;
        }
        Ok(result)
    }
}
