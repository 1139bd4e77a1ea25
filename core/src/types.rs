//! Shared primitive types used across the replay core.

/// A point on the recording's time axis, in whole seconds.
/// Datetime cells are converted to Unix seconds (UTC).
pub type Timestamp = i64;

/// A sensor / signal column name.
pub type SignalName = String;

/// The canonical run identifier.
pub type RunId = String;
