use log::{debug, trace, warn};
use std::error::Error;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{self, PaOutput, Parameters};
use crate::error::RadioError;
use crate::registers::{
	IrqFlags, ModemConfig3Flags, OpMode, Register, CHIP_VERSION, FIFO_RX_BASE_ADDR, FIFO_TX_BASE_ADDR,
	MAX_PACKET_LENGTH, PA_BOOST,
};
use crate::transport::{Dio0, RegisterBus};

type ReceiveHandler<B> = Arc<dyn Fn(&LoRa<B>, &[u8]) + Send + Sync>;

/// Register-level driver state. Every method assumes it has exclusive use of
/// the bus; `LoRa` enforces that with its mutex.
struct Sx127x<B> {
	bus: B,
	parameters: Parameters,
	frequency: u32,
	mode: OpMode,
	// Tri-state: None until the first write, so a redundant header-mode
	// request after init still skips the bus.
	implicit_header: Option<bool>,
}

impl<B: RegisterBus> Sx127x<B> {
	fn new(bus: B, parameters: Parameters) -> Sx127x<B> {
		let frequency = parameters.frequency;
		Sx127x {
			bus,
			parameters,
			frequency,
			mode: OpMode::LORA | OpMode::SLEEP,
			implicit_header: None,
		}
	}

	fn read_register(&mut self, register: Register) -> Result<u8, Box<dyn Error>> {
		self.bus.read(register as u8)
	}

	fn write_register(&mut self, register: Register, value: u8) -> Result<(), Box<dyn Error>> {
		self.bus.write(register as u8, value)
	}

	/// Version gate plus the full modem configuration. The chip must be reset
	/// before this is called (see `transport::hardware_reset`).
	fn init(&mut self) -> Result<(), Box<dyn Error>> {
		let version = self.read_register(Register::Version)?;
		if version != CHIP_VERSION {
			return Err(Box::new(RadioError::InvalidVersion(version)));
		}
		debug!("chip version 0x{:02x}", version);

		let parameters = self.parameters.clone();

		// config registers are only writable outside of active TX/RX
		self.sleep()?;
		self.set_frequency(parameters.frequency)?;
		self.set_signal_bandwidth(parameters.signal_bandwidth)?;

		// LNA boost
		let lna = self.read_register(Register::Lna)?;
		self.write_register(Register::Lna, lna | 0x03)?;

		// auto AGC
		self.write_register(Register::ModemConfig3, ModemConfig3Flags::AGC_AUTO_ON.bits())?;

		self.set_tx_power(parameters.tx_power_level, parameters.pa_output)?;
		self.implicit_header = None;
		self.implicit_header_mode(parameters.implicit_header)?;
		self.set_spreading_factor(parameters.spreading_factor)?;
		self.set_coding_rate(parameters.coding_rate)?;
		self.set_preamble_length(parameters.preamble_length)?;
		self.set_sync_word(parameters.sync_word)?;
		self.enable_crc(parameters.enable_crc)?;

		let spreading_factor = parameters.spreading_factor.clamp(6, 12);
		if config::needs_low_data_rate_optimize(parameters.signal_bandwidth, spreading_factor) {
			let modem_config_3 = self.read_register(Register::ModemConfig3)?;
			self.write_register(
				Register::ModemConfig3,
				modem_config_3 | ModemConfig3Flags::LOW_DATA_RATE_OPTIMIZE.bits(),
			)?;
		}

		self.write_register(Register::FifoTxBaseAddr, FIFO_TX_BASE_ADDR)?;
		self.write_register(Register::FifoRxBaseAddr, FIFO_RX_BASE_ADDR)?;

		self.standby()
	}

	fn set_mode(&mut self, mode: OpMode) -> Result<(), Box<dyn Error>> {
		let value = OpMode::LORA | mode;
		self.write_register(Register::OpMode, value.bits())?;
		self.mode = value;
		trace!("mode set to {:?}", value);
		Ok(())
	}

	fn sleep(&mut self) -> Result<(), Box<dyn Error>> {
		self.set_mode(OpMode::SLEEP)
	}

	fn standby(&mut self) -> Result<(), Box<dyn Error>> {
		self.set_mode(OpMode::STANDBY)
	}

	fn set_frequency(&mut self, frequency: u32) -> Result<(), Box<dyn Error>> {
		let triple = match config::frf_triple(frequency) {
			Some(triple) => triple,
			None => return Err(Box::new(RadioError::UnsupportedFrequency(frequency))),
		};
		self.frequency = frequency;
		self.write_register(Register::FrfMsb, triple[0])?;
		self.write_register(Register::FrfMid, triple[1])?;
		self.write_register(Register::FrfLsb, triple[2])
	}

	fn set_tx_power(&mut self, level: u8, output: PaOutput) -> Result<(), Box<dyn Error>> {
		match output {
			PaOutput::Rfo => {
				let level = level.min(14);
				self.write_register(Register::PaConfig, 0x70 | level)
			}
			PaOutput::PaBoost => {
				let level = level.clamp(2, 17);
				self.write_register(Register::PaConfig, PA_BOOST | (level - 2))
			}
		}
	}

	fn set_signal_bandwidth(&mut self, bandwidth: u32) -> Result<(), Box<dyn Error>> {
		let index = config::bandwidth_index(bandwidth);
		let modem_config_1 = self.read_register(Register::ModemConfig1)?;
		self.write_register(Register::ModemConfig1, (modem_config_1 & 0x0F) | (index << 4))
	}

	fn set_spreading_factor(&mut self, spreading_factor: u8) -> Result<(), Box<dyn Error>> {
		let spreading_factor = spreading_factor.clamp(6, 12);
		// SF6 needs different detection settings than SF7..12
		self.write_register(Register::DetectionOptimize, if spreading_factor == 6 { 0xC5 } else { 0xC3 })?;
		self.write_register(Register::DetectionThreshold, if spreading_factor == 6 { 0x0C } else { 0x0A })?;
		let modem_config_2 = self.read_register(Register::ModemConfig2)?;
		self.write_register(Register::ModemConfig2, (modem_config_2 & 0x0F) | (spreading_factor << 4))
	}

	fn set_coding_rate(&mut self, denominator: u8) -> Result<(), Box<dyn Error>> {
		let denominator = denominator.clamp(5, 8);
		let coding_rate = denominator - 4;
		let modem_config_1 = self.read_register(Register::ModemConfig1)?;
		self.write_register(Register::ModemConfig1, (modem_config_1 & 0xF1) | (coding_rate << 1))
	}

	fn set_preamble_length(&mut self, length: u16) -> Result<(), Box<dyn Error>> {
		self.write_register(Register::PreambleMsb, (length >> 8) as u8)?;
		self.write_register(Register::PreambleLsb, length as u8)
	}

	fn set_sync_word(&mut self, sync_word: u8) -> Result<(), Box<dyn Error>> {
		self.write_register(Register::SyncWord, sync_word)
	}

	fn enable_crc(&mut self, enable: bool) -> Result<(), Box<dyn Error>> {
		let modem_config_2 = self.read_register(Register::ModemConfig2)?;
		let value = if enable { modem_config_2 | 0x04 } else { modem_config_2 & 0xFB };
		self.write_register(Register::ModemConfig2, value)
	}

	fn implicit_header_mode(&mut self, implicit: bool) -> Result<(), Box<dyn Error>> {
		// set only if different
		if self.implicit_header != Some(implicit) {
			self.implicit_header = Some(implicit);
			let modem_config_1 = self.read_register(Register::ModemConfig1)?;
			let value = if implicit { modem_config_1 | 0x01 } else { modem_config_1 & 0xFE };
			self.write_register(Register::ModemConfig1, value)?;
		}
		Ok(())
	}

	fn begin_packet(&mut self, implicit_header: bool) -> Result<(), Box<dyn Error>> {
		self.standby()?;
		self.implicit_header_mode(implicit_header)?;

		// reset FIFO address and payload length
		self.write_register(Register::FifoAddrPtr, FIFO_TX_BASE_ADDR)?;
		self.write_register(Register::PayloadLength, 0)
	}

	/// Appends to the transmit FIFO, truncating at the remaining capacity.
	/// Returns how many bytes were accepted.
	fn write_payload(&mut self, buffer: &[u8]) -> Result<usize, Box<dyn Error>> {
		let current_length = self.read_register(Register::PayloadLength)?;
		let available = usize::from(MAX_PACKET_LENGTH - FIFO_TX_BASE_ADDR - current_length);
		let size = buffer.len().min(available);

		for byte in &buffer[..size] {
			self.write_register(Register::Fifo, *byte)?;
		}

		self.write_register(Register::PayloadLength, current_length + size as u8)?;
		Ok(size)
	}

	/// Starts the transmission and waits for TxDone, which also means the
	/// chip has dropped back to standby on its own.
	fn end_packet(&mut self) -> Result<(), Box<dyn Error>> {
		self.set_mode(OpMode::TX)?;

		let deadline = Instant::now() + self.parameters.tx_timeout;
		loop {
			let flags = IrqFlags::from_bits_truncate(self.read_register(Register::IrqFlags)?);
			if flags.contains(IrqFlags::TX_DONE) {
				break;
			}
			if Instant::now() >= deadline {
				return Err(Box::new(RadioError::TransmitTimeout));
			}
			thread::sleep(Duration::from_millis(1));
		}

		self.write_register(Register::IrqFlags, IrqFlags::TX_DONE.bits())?;
		self.mode = OpMode::LORA | OpMode::STANDBY;
		Ok(())
	}

	/// Reads RegIrqFlags and writes the bits back, which clears them.
	fn irq_flags(&mut self) -> Result<IrqFlags, Box<dyn Error>> {
		let flags = self.read_register(Register::IrqFlags)?;
		self.write_register(Register::IrqFlags, flags)?;
		Ok(IrqFlags::from_bits_truncate(flags))
	}

	fn receive(&mut self, expected_len: Option<u8>) -> Result<(), Box<dyn Error>> {
		self.implicit_header_mode(expected_len.is_some())?;
		if let Some(len) = expected_len {
			self.write_register(Register::PayloadLength, len)?;
		}
		// the last packet always starts at FifoRxCurrentAddr, so there is no
		// need to reset FifoAddrPtr here
		self.set_mode(OpMode::RX_CONTINUOUS)
	}

	fn received_packet(&mut self, expected_len: Option<u8>) -> Result<bool, Box<dyn Error>> {
		let flags = self.irq_flags()?;

		self.implicit_header_mode(expected_len.is_some())?;
		if let Some(len) = expected_len {
			self.write_register(Register::PayloadLength, len)?;
		}

		// RxDone alone; a timeout or CRC error bit means no usable packet
		if flags == IrqFlags::RX_DONE {
			// the chip is back in standby once RxDone is up
			self.mode = OpMode::LORA | OpMode::STANDBY;
			return Ok(true);
		}

		let op_mode = self.read_register(Register::OpMode)?;
		if op_mode != (OpMode::LORA | OpMode::RX_SINGLE).bits() {
			// nothing pending: reset the FIFO pointer and arm single receive
			// for the next poll
			self.write_register(Register::FifoAddrPtr, FIFO_RX_BASE_ADDR)?;
			self.set_mode(OpMode::RX_SINGLE)?;
		}
		Ok(false)
	}

	fn read_payload(&mut self) -> Result<Vec<u8>, Box<dyn Error>> {
		// the last packet starts at the chip-reported current RX address
		let current = self.read_register(Register::FifoRxCurrentAddr)?;
		self.write_register(Register::FifoAddrPtr, current)?;

		let length = if self.implicit_header == Some(true) {
			self.read_register(Register::PayloadLength)?
		} else {
			self.read_register(Register::RxNbBytes)?
		};

		let mut payload = Vec::with_capacity(usize::from(length));
		for _ in 0..length {
			payload.push(self.read_register(Register::Fifo)?);
		}
		Ok(payload)
	}

	fn packet_rssi(&mut self) -> Result<i16, Box<dyn Error>> {
		let raw = self.read_register(Register::PktRssiValue)?;
		let offset = if self.frequency < 868_000_000 { 164 } else { 157 };
		Ok(i16::from(raw) - offset)
	}

	fn packet_snr(&mut self) -> Result<f32, Box<dyn Error>> {
		let raw = self.read_register(Register::PktSnrValue)?;
		Ok(f32::from(raw as i8) * 0.25)
	}
}

struct Inner<B> {
	driver: Mutex<Sx127x<B>>,
	dio0: Mutex<Option<Box<dyn Dio0 + Send>>>,
	on_receive: Mutex<Option<ReceiveHandler<B>>>,
}

/// Handle to one SX127x transceiver. Cloning is cheap and every clone talks
/// to the same chip; all register and FIFO access goes through one mutex, so
/// a foreground send and the receive interrupt can never interleave bus
/// operations. The mutex guard is scoped, so it is released on every exit
/// path, errors included.
pub struct LoRa<B> {
	inner: Arc<Inner<B>>,
}

impl<B> Clone for LoRa<B> {
	fn clone(&self) -> LoRa<B> {
		LoRa {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<B: RegisterBus + Send + 'static> LoRa<B> {
	/// Builds the driver around an injected register bus and, optionally, the
	/// DIO0 pin used for interrupt-driven receive. Call [`LoRa::init`] before
	/// anything else.
	pub fn new(bus: B, dio0: Option<Box<dyn Dio0 + Send>>, parameters: Parameters) -> LoRa<B> {
		LoRa {
			inner: Arc::new(Inner {
				driver: Mutex::new(Sx127x::new(bus, parameters)),
				dio0: Mutex::new(dio0),
				on_receive: Mutex::new(None),
			}),
		}
	}

	/// Checks the chip version and applies the full parameter set, leaving
	/// the chip in standby. Fails fast on a version mismatch: that is a
	/// wiring or part fault, not a transient condition.
	pub fn init(&self) -> Result<(), Box<dyn Error>> {
		self.inner.driver.lock().unwrap().init()
	}

	/// Sends a UTF-8 string as one packet (explicit header). Returns the
	/// number of bytes that fit in the FIFO.
	pub fn println(&self, string: &str) -> Result<usize, Box<dyn Error>> {
		self.send_packet(string.as_bytes(), false)
	}

	/// Frames `payload` into the FIFO and transmits it, blocking until the
	/// chip reports TxDone or the transmit deadline expires. A payload larger
	/// than the remaining FIFO capacity is silently truncated; the accepted
	/// length is returned.
	pub fn send_packet(&self, payload: &[u8], implicit_header: bool) -> Result<usize, Box<dyn Error>> {
		let mut driver = self.inner.driver.lock().unwrap();
		driver.begin_packet(implicit_header)?;
		let size = driver.write_payload(payload)?;
		driver.end_packet()?;
		Ok(size)
	}

	/// Registers `callback` to run for every valid received packet and, if a
	/// DIO0 pin was supplied, attaches it to the chip's RxDone line. The
	/// callback runs on the interrupt context with the driver lock already
	/// released, so it may transmit or re-arm receive itself.
	pub fn on_receive<F>(&self, callback: F) -> Result<(), Box<dyn Error>>
	where
		F: Fn(&LoRa<B>, &[u8]) + Send + Sync + 'static,
	{
		{
			let mut driver = self.inner.driver.lock().unwrap();
			// DIO0 rising edge = RxDone
			driver.write_register(Register::DioMapping1, 0x00)?;
		}
		*self.inner.on_receive.lock().unwrap() = Some(Arc::new(callback));

		let mut dio0 = self.inner.dio0.lock().unwrap();
		if let Some(pin) = dio0.as_mut() {
			let radio = self.clone();
			pin.attach_rising_edge(Box::new(move || radio.handle_rx_done()))?;
		}
		Ok(())
	}

	/// Detaches the RxDone interrupt and drops the registered callback.
	pub fn detach_receive(&self) -> Result<(), Box<dyn Error>> {
		if let Some(pin) = self.inner.dio0.lock().unwrap().as_mut() {
			pin.detach()?;
		}
		self.inner.on_receive.lock().unwrap().take();
		Ok(())
	}

	/// Puts the chip in continuous receive. With `Some(len)` the modem runs
	/// in implicit-header mode expecting fixed `len`-byte packets; `None`
	/// selects explicit headers.
	pub fn receive(&self, expected_len: Option<u8>) -> Result<(), Box<dyn Error>> {
		self.inner.driver.lock().unwrap().receive(expected_len)
	}

	/// Interrupt-free polling check. Returns true when a packet is waiting in
	/// the FIFO (fetch it with [`LoRa::read_payload`]); otherwise re-arms
	/// single receive for the next poll.
	pub fn received_packet(&self, expected_len: Option<u8>) -> Result<bool, Box<dyn Error>> {
		self.inner.driver.lock().unwrap().received_packet(expected_len)
	}

	/// Extracts the most recently received packet from the FIFO.
	pub fn read_payload(&self) -> Result<Vec<u8>, Box<dyn Error>> {
		self.inner.driver.lock().unwrap().read_payload()
	}

	/// RSSI of the latest received packet, in dBm.
	pub fn packet_rssi(&self) -> Result<i16, Box<dyn Error>> {
		self.inner.driver.lock().unwrap().packet_rssi()
	}

	/// SNR of the latest received packet, in dB.
	pub fn packet_snr(&self) -> Result<f32, Box<dyn Error>> {
		self.inner.driver.lock().unwrap().packet_snr()
	}

	/// The most recently commanded operating mode. The chip drops back to
	/// standby on its own after a transmit or a single receive completes;
	/// this reflects that without touching the bus.
	pub fn mode(&self) -> OpMode {
		self.inner.driver.lock().unwrap().mode
	}

	pub fn sleep(&self) -> Result<(), Box<dyn Error>> {
		self.inner.driver.lock().unwrap().sleep()
	}

	pub fn standby(&self) -> Result<(), Box<dyn Error>> {
		self.inner.driver.lock().unwrap().standby()
	}

	/// Retunes to another supported center frequency.
	pub fn set_frequency(&self, frequency: u32) -> Result<(), Box<dyn Error>> {
		self.inner.driver.lock().unwrap().set_frequency(frequency)
	}

	pub fn set_tx_power(&self, level: u8, output: PaOutput) -> Result<(), Box<dyn Error>> {
		self.inner.driver.lock().unwrap().set_tx_power(level, output)
	}

	pub fn set_signal_bandwidth(&self, bandwidth: u32) -> Result<(), Box<dyn Error>> {
		self.inner.driver.lock().unwrap().set_signal_bandwidth(bandwidth)
	}

	pub fn set_spreading_factor(&self, spreading_factor: u8) -> Result<(), Box<dyn Error>> {
		self.inner.driver.lock().unwrap().set_spreading_factor(spreading_factor)
	}

	pub fn set_coding_rate(&self, denominator: u8) -> Result<(), Box<dyn Error>> {
		self.inner.driver.lock().unwrap().set_coding_rate(denominator)
	}

	pub fn set_preamble_length(&self, length: u16) -> Result<(), Box<dyn Error>> {
		self.inner.driver.lock().unwrap().set_preamble_length(length)
	}

	pub fn set_sync_word(&self, sync_word: u8) -> Result<(), Box<dyn Error>> {
		self.inner.driver.lock().unwrap().set_sync_word(sync_word)
	}

	pub fn enable_crc(&self, enable: bool) -> Result<(), Box<dyn Error>> {
		self.inner.driver.lock().unwrap().enable_crc(enable)
	}

	pub fn implicit_header_mode(&self, implicit: bool) -> Result<(), Box<dyn Error>> {
		self.inner.driver.lock().unwrap().implicit_header_mode(implicit)
	}

	/// RxDone dispatcher, invoked on the interrupt context. Holds the driver
	/// lock across flag handling and payload extraction, then releases it
	/// before handing the payload to the registered callback. Bus faults here
	/// have no caller to propagate to, so they are logged and the packet is
	/// dropped.
	fn handle_rx_done(&self) {
		let payload = {
			let mut driver = self.inner.driver.lock().unwrap();
			let flags = match driver.irq_flags() {
				Ok(flags) => flags,
				Err(err) => {
					warn!("receive interrupt: reading IRQ flags failed: {}", err);
					return;
				}
			};
			if flags.contains(IrqFlags::PAYLOAD_CRC_ERROR) {
				debug!("dropping received packet with CRC error");
				return;
			}
			if self.inner.on_receive.lock().unwrap().is_none() {
				return;
			}
			match driver.read_payload() {
				Ok(payload) => payload,
				Err(err) => {
					warn!("receive interrupt: payload extraction failed: {}", err);
					return;
				}
			}
		};

		let callback = self.inner.on_receive.lock().unwrap().clone();
		if let Some(callback) = callback {
			callback(self, &payload);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mock::MockBus;

	fn driver(bus: MockBus) -> Sx127x<MockBus> {
		Sx127x::new(bus, Parameters::default())
	}

	#[test]
	fn init_rejects_wrong_chip_version() {
		let bus = MockBus::new();
		bus.set_register(Register::Version as u8, 0x22);
		let err = driver(bus).init().unwrap_err();
		match err.downcast_ref::<RadioError>() {
			Some(RadioError::InvalidVersion(0x22)) => {}
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[test]
	fn init_applies_parameter_set() {
		let bus = MockBus::new();
		bus.set_register(Register::Lna as u8, 0x20);
		let mut driver = driver(bus.clone());
		driver.init().unwrap();

		// 433 MHz triple
		assert_eq!(bus.register(Register::FrfMsb as u8), 108);
		assert_eq!(bus.register(Register::FrfMid as u8), 64);
		assert_eq!(bus.register(Register::FrfLsb as u8), 0);
		// 125 kHz is bin 7; explicit header, coding rate 4/5
		assert_eq!(bus.register(Register::ModemConfig1 as u8), (7 << 4) | (1 << 1));
		// SF8, CRC off
		assert_eq!(bus.register(Register::ModemConfig2 as u8) >> 4, 8);
		// LNA boost keeps the configured gain bits
		assert_eq!(bus.register(Register::Lna as u8), 0x23);
		// auto AGC, no low-data-rate optimize at SF8/125kHz
		assert_eq!(bus.register(Register::ModemConfig3 as u8), 0x04);
		assert_eq!(bus.register(Register::SyncWord as u8), 0x12);
		assert_eq!(bus.register(Register::PreambleMsb as u8), 0);
		assert_eq!(bus.register(Register::PreambleLsb as u8), 8);
		assert_eq!(bus.register(Register::FifoTxBaseAddr as u8), FIFO_TX_BASE_ADDR);
		assert_eq!(bus.register(Register::FifoRxBaseAddr as u8), FIFO_RX_BASE_ADDR);
		// ends in standby
		assert_eq!(bus.register(Register::OpMode as u8), (OpMode::LORA | OpMode::STANDBY).bits());
	}

	#[test]
	fn init_sets_low_data_rate_optimize_for_slow_symbols() {
		let bus = MockBus::new();
		let mut parameters = Parameters::default();
		parameters.spreading_factor = 12;
		let mut driver = Sx127x::new(bus.clone(), parameters);
		driver.init().unwrap();
		assert_eq!(bus.register(Register::ModemConfig3 as u8), 0x04 | 0x08);
	}

	#[test]
	fn spreading_factor_clamps_and_selects_detection_constants() {
		let bus = MockBus::new();
		let mut driver = driver(bus.clone());

		driver.set_spreading_factor(5).unwrap();
		assert_eq!(bus.register(Register::ModemConfig2 as u8) >> 4, 6);
		assert_eq!(bus.register(Register::DetectionOptimize as u8), 0xC5);
		assert_eq!(bus.register(Register::DetectionThreshold as u8), 0x0C);

		driver.set_spreading_factor(13).unwrap();
		assert_eq!(bus.register(Register::ModemConfig2 as u8) >> 4, 12);
		assert_eq!(bus.register(Register::DetectionOptimize as u8), 0xC3);
		assert_eq!(bus.register(Register::DetectionThreshold as u8), 0x0A);
	}

	#[test]
	fn spreading_factor_preserves_low_nibble() {
		let bus = MockBus::new();
		bus.set_register(Register::ModemConfig2 as u8, 0x07);
		let mut driver = driver(bus.clone());
		driver.set_spreading_factor(9).unwrap();
		assert_eq!(bus.register(Register::ModemConfig2 as u8), 0x97);
	}

	#[test]
	fn coding_rate_clamps_into_bits_3_to_1() {
		let bus = MockBus::new();
		bus.set_register(Register::ModemConfig1 as u8, 0x71);
		let mut driver = driver(bus.clone());

		driver.set_coding_rate(4).unwrap(); // clamped to 5 -> 4/5 -> 0b001
		assert_eq!(bus.register(Register::ModemConfig1 as u8), 0x71 | (1 << 1));

		driver.set_coding_rate(9).unwrap(); // clamped to 8 -> 4/8 -> 0b100
		assert_eq!(bus.register(Register::ModemConfig1 as u8), 0x71 | (4 << 1));
	}

	#[test]
	fn tx_power_encodings() {
		let bus = MockBus::new();
		let mut driver = driver(bus.clone());

		driver.set_tx_power(20, PaOutput::Rfo).unwrap();
		assert_eq!(bus.register(Register::PaConfig as u8), 0x70 | 14);

		driver.set_tx_power(1, PaOutput::PaBoost).unwrap();
		assert_eq!(bus.register(Register::PaConfig as u8), 0x80);

		driver.set_tx_power(17, PaOutput::PaBoost).unwrap();
		assert_eq!(bus.register(Register::PaConfig as u8), 0x80 | 15);
	}

	#[test]
	fn preamble_length_splits_across_two_registers() {
		let bus = MockBus::new();
		let mut driver = driver(bus.clone());
		driver.set_preamble_length(0x0102).unwrap();
		assert_eq!(bus.register(Register::PreambleMsb as u8), 0x01);
		assert_eq!(bus.register(Register::PreambleLsb as u8), 0x02);
	}

	#[test]
	fn crc_enable_toggles_one_bit_only() {
		let bus = MockBus::new();
		bus.set_register(Register::ModemConfig2 as u8, 0x83);
		let mut driver = driver(bus.clone());

		driver.enable_crc(true).unwrap();
		assert_eq!(bus.register(Register::ModemConfig2 as u8), 0x87);

		driver.enable_crc(false).unwrap();
		assert_eq!(bus.register(Register::ModemConfig2 as u8), 0x83);
	}

	#[test]
	fn header_mode_write_is_idempotent() {
		let bus = MockBus::new();
		let mut driver = driver(bus.clone());

		driver.implicit_header_mode(true).unwrap();
		driver.implicit_header_mode(true).unwrap();
		let writes = bus
			.writes()
			.into_iter()
			.filter(|(address, _)| *address == Register::ModemConfig1 as u8)
			.count();
		assert_eq!(writes, 1);

		driver.implicit_header_mode(false).unwrap();
		let writes = bus
			.writes()
			.into_iter()
			.filter(|(address, _)| *address == Register::ModemConfig1 as u8)
			.count();
		assert_eq!(writes, 2);
	}

	#[test]
	fn received_packet_arms_single_receive_once() {
		let bus = MockBus::new();
		let mut driver = driver(bus.clone());
		driver.implicit_header_mode(false).unwrap();
		bus.clear_ops();

		assert!(!driver.received_packet(None).unwrap());
		assert_eq!(bus.register(Register::OpMode as u8), (OpMode::LORA | OpMode::RX_SINGLE).bits());
		assert_eq!(bus.register(Register::FifoAddrPtr as u8), FIFO_RX_BASE_ADDR);

		// already armed: the second poll must not rewrite the mode
		bus.clear_ops();
		assert!(!driver.received_packet(None).unwrap());
		let mode_writes = bus
			.writes()
			.into_iter()
			.filter(|(address, _)| *address == Register::OpMode as u8)
			.count();
		assert_eq!(mode_writes, 0);
	}

	#[test]
	fn received_packet_reports_rx_done_and_clears_flags() {
		let bus = MockBus::new();
		let mut driver = driver(bus.clone());
		driver.implicit_header_mode(false).unwrap();

		bus.raise_irq(IrqFlags::RX_DONE.bits());
		assert!(driver.received_packet(None).unwrap());
		assert_eq!(bus.register(Register::IrqFlags as u8), 0);

		// RxDone plus CRC error is not a usable packet
		bus.raise_irq((IrqFlags::RX_DONE | IrqFlags::PAYLOAD_CRC_ERROR).bits());
		assert!(!driver.received_packet(None).unwrap());
	}

	#[test]
	fn packet_metrics_follow_frequency_and_sign() {
		let bus = MockBus::new();
		bus.set_register(Register::PktRssiValue as u8, 100);
		bus.set_register(Register::PktSnrValue as u8, 0xFC); // -4 in two's complement
		let mut driver = driver(bus.clone());

		assert_eq!(driver.packet_rssi().unwrap(), 100 - 164);
		assert!((driver.packet_snr().unwrap() + 1.0).abs() < f32::EPSILON);

		driver.set_frequency(915_000_000).unwrap();
		assert_eq!(driver.packet_rssi().unwrap(), 100 - 157);
	}
}
