use bitflags::bitflags;

#[allow(dead_code)]
#[derive(Copy, Clone, Debug)]
#[repr(u8)]
pub enum Register {
	/** Taken from the LoRa register map (6.4, p. 102) in the SX127x data sheet. Only accessible in LoRa mode */
	Fifo = 0x00,
	OpMode = 0x01,
	/* 0x02 - 0x05 RESERVED */
	FrfMsb = 0x06,
	FrfMid = 0x07,
	FrfLsb = 0x08,
	PaConfig = 0x09,
	Lna = 0x0C,
	FifoAddrPtr = 0x0D,
	FifoTxBaseAddr = 0x0E,
	FifoRxBaseAddr = 0x0F,
	FifoRxCurrentAddr = 0x10,
	IrqFlagsMask = 0x11,
	IrqFlags = 0x12,
	RxNbBytes = 0x13, // Number of payload bytes of latest packet received
	PktSnrValue = 0x19, // Estimation of SNR on last packet received. In two's complement format multiplied by 4.
	PktRssiValue = 0x1A, // RSSI of the latest packet received (dBm)
	ModemConfig1 = 0x1D,
	ModemConfig2 = 0x1E,
	PreambleMsb = 0x20,
	PreambleLsb = 0x21,
	PayloadLength = 0x22, // Needs to be set in implicit header mode for the expected packet length. A 0 value is not permitted
	FifoRxByteAddr = 0x25, // Current value of RX data buffer pointer (address of last byte written by the receiver)
	ModemConfig3 = 0x26,
	RssiWideband = 0x2C,
	DetectionOptimize = 0x31,
	DetectionThreshold = 0x37,
	SyncWord = 0x39,

	/** Taken from Table 85, available in either mode */
	DioMapping1 = 0x40,
	Version = 0x42,
}

bitflags! {
	// See p. 102, RegOpMode. The low three bits select the device mode; bit 7
	// keeps the modem in LoRa mode and must be set on every mode write.
	#[derive(Copy, Clone, Debug, PartialEq, Eq)]
	pub struct OpMode: u8 {
		const SLEEP = 0b000;
		const STANDBY = 0b001;
		const TX = 0b011;
		const RX_CONTINUOUS = 0b101;
		const RX_SINGLE = 0b110;

		const LORA = 0b1000_0000;
	}
}

bitflags! {
	// RegIrqFlags: event bits, cleared by writing back the bits read
	#[derive(Copy, Clone, Debug, PartialEq, Eq)]
	pub struct IrqFlags: u8 {
		const CAD_DETECTED = 0b0000_0001;
		const FHSS_CHANGE_CHANNEL = 0b0000_0010;
		const CAD_DONE = 0b0000_0100;
		const TX_DONE = 0b0000_1000;
		const VALID_HEADER = 0b0001_0000;
		const PAYLOAD_CRC_ERROR = 0b0010_0000;
		const RX_DONE = 0b0100_0000;
		const RX_TIMEOUT = 0b1000_0000;
	}
}

bitflags! {
	#[derive(Copy, Clone, Debug, PartialEq, Eq)]
	pub struct ModemConfig3Flags: u8 {
		const LOW_DATA_RATE_OPTIMIZE = 0b0000_1000;
		const AGC_AUTO_ON = 0b0000_0100;
	}
}

/// Value of RegVersion for the SX127x silicon this driver supports.
pub const CHIP_VERSION: u8 = 0x12;

/// PaSelect bit in RegPaConfig: routes the output to the PA_BOOST pin.
pub const PA_BOOST: u8 = 0x80;

/// The FIFO holds at most this many payload bytes.
pub const MAX_PACKET_LENGTH: u8 = 255;

pub const FIFO_TX_BASE_ADDR: u8 = 0x00;
pub const FIFO_RX_BASE_ADDR: u8 = 0x00;
