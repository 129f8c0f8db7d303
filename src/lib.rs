//! Driver for the Semtech SX127x family of LoRa transceivers (including the
//! HopeRF RFM95/96/98 modules), written for Raspberry Pi class hosts where
//! the receive interrupt arrives on its own thread.
//!
//! The chip is driven over a register-addressed bus injected as a
//! [`RegisterBus`]; on real hardware that is [`SpiBus`] on top of `rppal`.
//! All packet and register access is serialized through one mutex inside
//! [`LoRa`], so a foreground send and the RxDone interrupt never mix bus
//! traffic.
//!
//! ```no_run
//! use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
//! use sx127x::{hardware_reset, Dio0Pin, LoRa, Parameters, SpiBus};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//! 	hardware_reset(25)?;
//!
//! 	let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss1, 4_000_000, Mode::Mode0)?;
//! 	let dio0 = Dio0Pin::new(22)?;
//! 	let lora = LoRa::new(SpiBus::new(spi, Some(7)), Some(Box::new(dio0)), Parameters::default());
//! 	lora.init()?;
//!
//! 	lora.on_receive(|lora, payload| {
//! 		println!("received {:?} at {:?} dBm", payload, lora.packet_rssi());
//! 	})?;
//! 	lora.receive(None)?;
//!
//! 	lora.println("NODE 0")?;
//! 	Ok(())
//! }
//! ```

mod config;
mod device;
mod error;
pub mod mock;
pub mod registers;
mod transport;

pub use config::{PaOutput, Parameters, SUPPORTED_FREQUENCIES};
pub use device::LoRa;
pub use registers::{IrqFlags, OpMode};
pub use error::RadioError;
pub use transport::{blink_led, hardware_reset, ChipSelected, Dio0, Dio0Pin, RegisterBus, SpiBus};
