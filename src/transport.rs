//! Hardware capabilities the driver expects from its host: a register bus, a
//! rising-edge-capable DIO0 pin, a reset line, and an LED. The core only
//! depends on the [`RegisterBus`] and [`Dio0`] traits; the types below back
//! them with `rppal` on a Raspberry Pi.

use rppal::gpio::{Gpio, Level, OutputPin, Trigger};
use rppal::spi::{Segment, Spi};
use std::error::Error;
use std::thread;
use std::time::Duration;

/// Half-duplex exchange addressed by a 7-bit register number. The high bit of
/// the address byte selects read (0) vs write (1); implementations apply it.
/// A transport failure is a hardware fault and is surfaced, never retried.
pub trait RegisterBus {
	fn read(&mut self, address: u8) -> Result<u8, Box<dyn Error>>;
	fn write(&mut self, address: u8, value: u8) -> Result<(), Box<dyn Error>>;
}

/// An interrupt-capable input pin wired to the radio's DIO0 line. The handler
/// runs on whatever execution context the platform delivers edges on; with
/// `rppal` that is a dedicated interrupt thread.
pub trait Dio0 {
	fn attach_rising_edge(&mut self, handler: Box<dyn FnMut() + Send>) -> Result<(), Box<dyn Error>>;
	fn detach(&mut self) -> Result<(), Box<dyn Error>>;
}

/// SPI-backed register bus with an optional manually driven chip-select pin.
pub struct SpiBus {
	spi: Spi,
	cs_bcm_pin: Option<u8>,
}

impl SpiBus {
	pub fn new(spi: Spi, cs_bcm_pin: Option<u8>) -> SpiBus {
		SpiBus { spi, cs_bcm_pin }
	}
}

impl RegisterBus for SpiBus {
	fn read(&mut self, address: u8) -> Result<u8, Box<dyn Error>> {
		let selected = ChipSelected::new(self.cs_bcm_pin)?;
		let mut buffer = [0u8; 1];
		self.spi
			.transfer_segments(&[Segment::with_write(&[address & 0x7F]), Segment::with_read(&mut buffer)])?;
		drop(selected);
		Ok(buffer[0])
	}

	fn write(&mut self, address: u8, value: u8) -> Result<(), Box<dyn Error>> {
		let selected = ChipSelected::new(self.cs_bcm_pin)?;
		self.spi.transfer_segments(&[Segment::with_write(&[address | 0x80, value])])?;
		drop(selected);
		Ok(())
	}
}

/// Asserts the chip-select line for the duration of one bus transaction.
pub struct ChipSelected {
	cs_pin: Option<OutputPin>,
}

impl ChipSelected {
	pub fn new(cs_bcm_pin: Option<u8>) -> Result<ChipSelected, Box<dyn Error>> {
		Ok(ChipSelected {
			cs_pin: match cs_bcm_pin {
				Some(cs_pin) => {
					let mut pin = Gpio::new()?.get(cs_pin)?.into_output();
					pin.set_low();
					Some(pin)
				}
				None => None,
			},
		})
	}
}

impl Drop for ChipSelected {
	fn drop(&mut self) {
		if let Some(ref mut pin) = self.cs_pin {
			pin.set_high();
		}
	}
}

/// DIO0 routed to a GPIO pin, delivering rising edges on rppal's interrupt
/// thread.
pub struct Dio0Pin {
	pin: rppal::gpio::InputPin,
}

impl Dio0Pin {
	pub fn new(bcm_pin: u8) -> Result<Dio0Pin, Box<dyn Error>> {
		Ok(Dio0Pin {
			pin: Gpio::new()?.get(bcm_pin)?.into_input(),
		})
	}
}

impl Dio0 for Dio0Pin {
	fn attach_rising_edge(&mut self, mut handler: Box<dyn FnMut() + Send>) -> Result<(), Box<dyn Error>> {
		self.pin.set_async_interrupt(Trigger::RisingEdge, move |_level: Level| handler())?;
		Ok(())
	}

	fn detach(&mut self) -> Result<(), Box<dyn Error>> {
		self.pin.clear_async_interrupt()?;
		Ok(())
	}
}

/// Cycle the radio's reset line. This is a bit weird: first the pin is driven
/// low as an output, then it is changed to be a pull-up input and left
/// floating there; driving it high as an output does not reliably release the
/// line on every board.
pub fn hardware_reset(bcm_pin: u8) -> Result<(), Box<dyn Error>> {
	{
		let mut pin = Gpio::new()?.get(bcm_pin)?.into_output();
		pin.set_low();
		thread::sleep(Duration::from_millis(1));
	}
	let mut pin = Gpio::new()?.get(bcm_pin)?.into_input_pullup();
	pin.set_reset_on_drop(false);
	thread::sleep(Duration::from_millis(500));
	Ok(())
}

/// Blink an on-board LED. Host capability used by the demo receive callbacks.
pub fn blink_led(bcm_pin: u8, times: u8, interval_ms: u64) -> Result<(), Box<dyn Error>> {
	let mut pin = Gpio::new()?.get(bcm_pin)?.into_output();
	for _ in 0..times {
		pin.set_high();
		thread::sleep(Duration::from_millis(interval_ms));
		pin.set_low();
		thread::sleep(Duration::from_millis(interval_ms));
	}
	Ok(())
}
