use std::time::Duration;

use crate::ws::protocol::DataType;

/// Default number of messages the outbound queue can hold before writers block.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
/// Default upper bound on the payload of a single inbound frame.
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;
/// Default time `close` waits for the outbound worker before shutting the transport down.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Per connection settings.
///
/// ```
/// use std::time::Duration;
/// use socketeer::ws::{Config, DataType};
///
/// let config = Config::default()
///     .with_data_type(DataType::Binary)
///     .with_queue_capacity(1024)
///     .with_close_timeout(Duration::from_millis(500));
/// assert_eq!(1024, config.queue_capacity());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    data_type: DataType,
    queue_capacity: usize,
    max_payload_len: usize,
    close_frame: bool,
    close_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_type: DataType::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            close_frame: true,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

impl Config {
    /// Payload classification used for every outbound data frame.
    pub fn with_data_type(self, data_type: DataType) -> Self {
        Self { data_type, ..self }
    }

    /// Outbound queue capacity. Values below one are raised to one.
    pub fn with_queue_capacity(self, queue_capacity: usize) -> Self {
        Self {
            queue_capacity: queue_capacity.max(1),
            ..self
        }
    }

    /// Inbound frames declaring a larger payload are rejected before the payload is read.
    pub fn with_max_payload_len(self, max_payload_len: usize) -> Self {
        Self { max_payload_len, ..self }
    }

    /// Whether `close` sends a protocol close frame before shutting the transport down.
    pub fn with_close_frame(self, close_frame: bool) -> Self {
        Self { close_frame, ..self }
    }

    pub fn with_close_timeout(self, close_timeout: Duration) -> Self {
        Self { close_timeout, ..self }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn max_payload_len(&self) -> usize {
        self.max_payload_len
    }

    pub fn close_frame(&self) -> bool {
        self.close_frame
    }

    pub fn close_timeout(&self) -> Duration {
        self.close_timeout
    }
}
