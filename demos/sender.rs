//! Periodic numbered transmissions, nothing else.

use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use std::error::Error;
use std::thread;
use std::time::Duration;

use sx127x::{hardware_reset, LoRa, Parameters, SpiBus};

fn main() -> Result<(), Box<dyn Error>> {
	env_logger::init();

	hardware_reset(25)?;

	let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss1, 4_000_000, Mode::Mode0)?;
	let lora = LoRa::new(SpiBus::new(spi, Some(7)), None, Parameters::default());
	lora.init()?;

	let mut msg_count: u32 = 0;
	loop {
		let message = format!("NODE 0 {}", msg_count);
		let accepted = lora.println(&message)?;
		println!("sent {} ({} bytes)", message, accepted);
		msg_count += 1;
		thread::sleep(Duration::from_secs(5));
	}
}
