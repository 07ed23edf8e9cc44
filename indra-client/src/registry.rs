//! Handler registry for decoded records
//!
//! One handler per command type. Records are routed on the subscriber task,
//! so handlers must return quickly and must not block.

use indra_core::{CmdType, Record, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Callback invoked with `(source_id, value)` for each routed record
pub type Handler = Arc<dyn Fn(u32, &Value) + Send + Sync>;

/// Map from command type to its handler
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<CmdType, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `cmd_type`
    ///
    /// Replaces any handler already registered for that type. Returns `true`
    /// if one was replaced.
    pub fn register<F>(&mut self, cmd_type: CmdType, handler: F) -> bool
    where
        F: Fn(u32, &Value) + Send + Sync + 'static,
    {
        let replaced = self.handlers.insert(cmd_type, Arc::new(handler)).is_some();
        if replaced {
            log::debug!("Replacing handler for {}", cmd_type);
        }
        replaced
    }

    /// Remove the handler for `cmd_type`, returning whether one was registered
    pub fn unregister(&mut self, cmd_type: CmdType) -> bool {
        self.handlers.remove(&cmd_type).is_some()
    }

    pub fn contains(&self, cmd_type: CmdType) -> bool {
        self.handlers.contains_key(&cmd_type)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke the handler registered for the record's type
    ///
    /// Returns `false` if no handler is registered.
    pub fn route(&self, record: &Record) -> bool {
        match self.handlers.get(&record.cmd_type()) {
            Some(handler) => {
                handler(record.source_id(), record.value());
                true
            }
            None => {
                log::debug!("No handler for {} - dropping record from {}", record.cmd_type(), record.source_id());
                false
            }
        }
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.handlers.keys().map(|t| t.as_u8()).collect();
        types.sort_unstable();
        f.debug_struct("HandlerRegistry").field("types", &types).finish()
    }
}
