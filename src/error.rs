//! Error handling for the environment sensor plugin.

/// A specialized `Result` type for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;

/// The main error type for sensor access and metric collection.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The I2C bus could not be opened or a transfer failed
    #[error("Bus error: {0}")]
    Bus(String),

    /// A device answered, but not the way its protocol requires
    #[error("{model} error: {message}")]
    Device {
        model: &'static str,
        message: String,
    },

    /// Status lamp pin could not be claimed or driven
    #[error("GPIO error: {0}")]
    Gpio(String),

    /// Devices could not be brought up; no snapshot was produced
    #[error("Failed to fetch metrics: {0}")]
    Acquisition(Box<PluginError>),

    /// The unit of work finished without handing over its snapshot
    #[error("Collection worker failed: {0}")]
    Worker(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PluginError {
    /// Create a new bus error
    pub fn bus_error(msg: impl Into<String>) -> Self {
        Self::Bus(msg.into())
    }

    /// Create a new device error for the given sensor model
    pub fn device_error(model: &'static str, msg: impl Into<String>) -> Self {
        Self::Device {
            model,
            message: msg.into(),
        }
    }

    /// Create a new GPIO error
    pub fn gpio_error(msg: impl Into<String>) -> Self {
        Self::Gpio(msg.into())
    }

    /// Wrap a device-layer error as a cycle-level acquisition failure
    pub fn acquisition(source: PluginError) -> Self {
        Self::Acquisition(Box::new(source))
    }

    /// Create a new worker error
    pub fn worker_error(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error ended the whole collection cycle.
    pub fn is_acquisition(&self) -> bool {
        matches!(self, Self::Acquisition(_) | Self::Worker(_))
    }
}
