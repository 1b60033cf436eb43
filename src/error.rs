//! Error types for urja-eps

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// urja-eps error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Hardware bus fault reported by an ADC or GPIO driver
    #[error("Hardware fault on {device}: {message}")]
    Hardware {
        /// Device that reported the fault (e.g. "ads1115", "gpio")
        device: &'static str,
        /// Driver-specific detail
        message: String,
    },

    /// Driver returned a voltage that cannot be a real cell reading
    #[error("Invalid reading on {channel}: {value} V")]
    InvalidReading {
        /// Channel the value was read from
        channel: String,
        /// Offending value
        value: f32,
    },

    /// Charge curve could not be fitted from the calibration table
    #[error("Calibration error: {0}")]
    Calibration(String),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Configuration parsed but is not usable
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Host refused or failed a halt/reboot request
    #[error("Privileged action '{action}' failed: {message}")]
    PrivilegedAction {
        /// "halt" or "reboot"
        action: &'static str,
        /// Failure detail
        message: String,
    },

    /// Interrupt registration failed
    #[error("Interrupt setup failed on pin {pin}: {message}")]
    Interrupt {
        /// Pin the interrupt was requested on
        pin: u8,
        /// Failure detail
        message: String,
    },

    /// Raspberry Pi GPIO error
    #[cfg(feature = "rpi")]
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    /// Raspberry Pi I2C error
    #[cfg(feature = "rpi")]
    #[error("I2C error: {0}")]
    I2c(#[from] rppal::i2c::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a hardware fault
    pub fn hardware(device: &'static str, message: impl Into<String>) -> Self {
        Error::Hardware {
            device,
            message: message.into(),
        }
    }

    /// True for faults that only spoil the current tick
    pub fn is_tick_local(&self) -> bool {
        matches!(
            self,
            Error::Hardware { .. } | Error::InvalidReading { .. } | Error::Io(_)
        ) || {
            #[cfg(feature = "rpi")]
            {
                matches!(self, Error::Gpio(_) | Error::I2c(_))
            }
            #[cfg(not(feature = "rpi"))]
            {
                false
            }
        }
    }
}
