//! Interrupt-free receiver: polls for packets with `received_packet` and
//! prints whatever arrives along with its signal metrics.

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

	loop {
		if lora.received_packet(None)? {
			let payload = lora.read_payload()?;
			println!("*** Received message ***");
			println!("{}", String::from_utf8_lossy(&payload));
			println!("with RSSI {} dBm, SNR {} dB", lora.packet_rssi()?, lora.packet_snr()?);
		}
		thread::sleep(Duration::from_millis(10));
	}
}
