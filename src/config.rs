//! Modem parameter set and the fixed physical-layer encoding tables.

use std::time::Duration;

/// Which power-amplifier output pin the board wires up. Most LoRa modules
/// (RFM95/96/98) route the antenna through PA_BOOST.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PaOutput {
	Rfo,
	PaBoost,
}

/// Supported center frequencies, each with its precomputed FRF register
/// triple (MSB, MID, LSB). Arbitrary frequencies are not supported; requests
/// outside this table fail with `RadioError::UnsupportedFrequency`.
pub const SUPPORTED_FREQUENCIES: [(u32, [u8; 3]); 6] = [
	(169_000_000, [42, 64, 0]),
	(433_000_000, [108, 64, 0]),
	(434_000_000, [108, 128, 0]),
	(866_000_000, [216, 128, 0]),
	(868_000_000, [217, 0, 0]),
	(915_000_000, [228, 192, 0]),
];

pub(crate) fn frf_triple(frequency: u32) -> Option<[u8; 3]> {
	SUPPORTED_FREQUENCIES
		.iter()
		.find(|(supported, _)| *supported == frequency)
		.map(|(_, triple)| *triple)
}

/// Bandwidth bins in Hz, ordered. A requested bandwidth snaps to the first
/// bin that is >= the request; anything above the top bin selects index 9
/// (500 kHz).
pub(crate) const BANDWIDTH_BINS: [u32; 9] = [
	7_800, 10_400, 15_600, 20_800, 31_250, 41_700, 62_500, 125_000, 250_000,
];

pub(crate) fn bandwidth_index(bandwidth: u32) -> u8 {
	for (index, bin) in BANDWIDTH_BINS.iter().enumerate() {
		if bandwidth <= *bin {
			return index as u8;
		}
	}
	9
}

/// LowDataRateOptimize must be set when the symbol time exceeds 16 ms.
pub(crate) fn needs_low_data_rate_optimize(bandwidth: u32, spreading_factor: u8) -> bool {
	let symbol_time_ms = 1000.0 / (bandwidth as f64 / f64::from(1u32 << u32::from(spreading_factor)));
	symbol_time_ms > 16.0
}

/// Everything the radio is configured with at initialization. Out-of-range
/// values are clamped by the individual setters rather than rejected here.
#[derive(Clone, Debug)]
pub struct Parameters {
	/// Center frequency in Hz; must be one of `SUPPORTED_FREQUENCIES`.
	pub frequency: u32,
	/// 0..=14 for the RFO output, 2..=17 for PA_BOOST.
	pub tx_power_level: u8,
	pub pa_output: PaOutput,
	/// Requested bandwidth in Hz, snapped to the nearest-or-larger bin.
	pub signal_bandwidth: u32,
	/// 6..=12.
	pub spreading_factor: u8,
	/// Coding-rate denominator, 5..=8 (4/5 .. 4/8).
	pub coding_rate: u8,
	pub preamble_length: u16,
	pub implicit_header: bool,
	pub sync_word: u8,
	pub enable_crc: bool,
	/// Deadline for the TxDone flag after entering transmit mode.
	pub tx_timeout: Duration,
}

impl Default for Parameters {
	fn default() -> Parameters {
		Parameters {
			frequency: 433_000_000,
			tx_power_level: 2,
			pa_output: PaOutput::PaBoost,
			signal_bandwidth: 125_000,
			spreading_factor: 8,
			coding_rate: 5,
			preamble_length: 8,
			implicit_header: false,
			sync_word: 0x12,
			enable_crc: false,
			tx_timeout: Duration::from_millis(1000),
		}
	}
}
