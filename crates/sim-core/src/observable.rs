//! Read-only state inspection by dotted path.

use std::fmt;

/// A dynamically typed value returned by a state query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Single-bit level or flag.
    Bool(bool),
    /// 8-bit unsigned integer, shown as hex.
    U8(u8),
    /// 16-bit unsigned integer, shown in decimal (beat indices, counts).
    U16(u16),
    /// 32-bit unsigned integer, shown as hex (addresses, counters).
    U32(u32),
    /// 64-bit unsigned integer, shown as hex (data words, cycles).
    U64(u64),
    /// Free-form text such as a phase name.
    String(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v:#04X}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v:#010X}"),
            Value::U64(v) => write!(f, "{v:#018X}"),
            Value::String(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::U8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::U16(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

/// A component whose state can be inspected without side effects.
pub trait Observable {
    /// Query a specific property by path.
    ///
    /// Paths are hierarchical, separated by dots:
    /// - `write.phase` - write controller phase name
    /// - `fifo.len` - words held in the prefetch buffer
    /// - `fault.code` - latched fault cause, zero when clear
    ///
    /// Returns `None` if the path is not recognised.
    fn query(&self, path: &str) -> Option<Value>;

    /// List all available query paths.
    ///
    /// Returns paths that can be passed to `query()`. A composite may list
    /// paths it delegates to its parts under a prefix.
    fn query_paths(&self) -> &'static [&'static str];

    /// Snapshot of every known path in `query_paths` order.
    fn snapshot(&self) -> Vec<(&'static str, Value)> {
        self.query_paths()
            .iter()
            .filter_map(|path| self.query(path).map(|value| (*path, value)))
            .collect()
    }
}
