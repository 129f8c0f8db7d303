use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum RadioError {
	/// RegVersion did not read back as the expected silicon revision. Wiring
	/// or part fault; not transient, so initialization aborts without retry.
	InvalidVersion(u8),
	/// The requested center frequency is not in the supported table.
	UnsupportedFrequency(u32),
	/// TxDone was not raised within the configured transmit deadline.
	TransmitTimeout,
}

impl fmt::Display for RadioError {
	fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
		match self {
			RadioError::InvalidVersion(version) => write!(out, "invalid chip version 0x{:02x}", version),
			RadioError::UnsupportedFrequency(frequency) => write!(out, "unsupported frequency: {} Hz", frequency),
			RadioError::TransmitTimeout => write!(out, "transmission timed out"),
		}
	}
}

impl Error for RadioError {}
