//! In-memory double for the register bus, used by the test suite. Simulates
//! the register file, the 256-byte FIFO with its address pointer, the
//! write-to-clear IRQ flag register, and keeps a thread-tagged log of every
//! bus operation so tests can assert exact traces and mutual exclusion.

use std::io;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crate::registers::{IrqFlags, OpMode, Register, CHIP_VERSION, FIFO_TX_BASE_ADDR};
use crate::transport::{Dio0, RegisterBus};

const REG_FIFO: u8 = Register::Fifo as u8;
const REG_OP_MODE: u8 = Register::OpMode as u8;
const REG_FIFO_ADDR_PTR: u8 = Register::FifoAddrPtr as u8;
const REG_FIFO_RX_CURRENT_ADDR: u8 = Register::FifoRxCurrentAddr as u8;
const REG_IRQ_FLAGS: u8 = Register::IrqFlags as u8;
const REG_RX_NB_BYTES: u8 = Register::RxNbBytes as u8;
const REG_PAYLOAD_LENGTH: u8 = Register::PayloadLength as u8;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusOp {
	Read(u8),
	Write(u8, u8),
}

struct MockState {
	regs: [u8; 0x80],
	fifo: [u8; 256],
	ops: Vec<(ThreadId, BusOp)>,
	auto_tx_done: bool,
	op_delay: Duration,
	next_error: Option<String>,
}

/// Clonable handle onto one simulated chip; all clones share state, so the
/// test harness can poke registers while the driver owns another handle.
#[derive(Clone)]
pub struct MockBus {
	state: Arc<Mutex<MockState>>,
}

impl Default for MockBus {
	fn default() -> Self {
		Self::new()
	}
}

impl MockBus {
	pub fn new() -> MockBus {
		let mut regs = [0u8; 0x80];
		regs[Register::Version as usize] = CHIP_VERSION;
		MockBus {
			state: Arc::new(Mutex::new(MockState {
				regs,
				fifo: [0u8; 256],
				ops: Vec::new(),
				auto_tx_done: true,
				op_delay: Duration::from_millis(0),
				next_error: None,
			})),
		}
	}

	/// Harness poke: set a register without logging a bus operation.
	pub fn set_register(&self, address: u8, value: u8) {
		self.state.lock().unwrap().regs[usize::from(address)] = value;
	}

	pub fn register(&self, address: u8) -> u8 {
		self.state.lock().unwrap().regs[usize::from(address)]
	}

	/// Harness poke: OR bits into the IRQ flag register, as the modem would.
	pub fn raise_irq(&self, mask: u8) {
		self.state.lock().unwrap().regs[usize::from(REG_IRQ_FLAGS)] |= mask;
	}

	/// Harness poke: place packet bytes directly into the FIFO.
	pub fn load_fifo(&self, offset: u8, data: &[u8]) {
		let mut state = self.state.lock().unwrap();
		for (i, byte) in data.iter().enumerate() {
			state.fifo[usize::from(offset) + i] = *byte;
		}
	}

	pub fn fifo(&self, offset: u8, len: usize) -> Vec<u8> {
		let state = self.state.lock().unwrap();
		state.fifo[usize::from(offset)..usize::from(offset) + len].to_vec()
	}

	pub fn ops(&self) -> Vec<(ThreadId, BusOp)> {
		self.state.lock().unwrap().ops.clone()
	}

	/// The logged writes only, in order, as (address, value) pairs.
	pub fn writes(&self) -> Vec<(u8, u8)> {
		self.state
			.lock()
			.unwrap()
			.ops
			.iter()
			.filter_map(|(_, op)| match op {
				BusOp::Write(address, value) => Some((*address, *value)),
				BusOp::Read(_) => None,
			})
			.collect()
	}

	pub fn clear_ops(&self) {
		self.state.lock().unwrap().ops.clear();
	}

	/// When enabled (the default), entering transmit mode immediately raises
	/// TxDone and mirrors the framed packet into the receive-side registers,
	/// so a follow-up payload extraction sees exactly what was sent.
	pub fn set_auto_tx_done(&self, enabled: bool) {
		self.state.lock().unwrap().auto_tx_done = enabled;
	}

	/// Slow every bus operation down, to widen race windows in concurrency
	/// tests.
	pub fn set_op_delay(&self, delay: Duration) {
		self.state.lock().unwrap().op_delay = delay;
	}

	/// Makes the next bus operation fail, simulating a hardware fault.
	pub fn set_next_error(&self, message: &str) {
		self.state.lock().unwrap().next_error = Some(message.to_string());
	}

	fn delay(&self) {
		let delay = self.state.lock().unwrap().op_delay;
		if delay > Duration::from_millis(0) {
			thread::sleep(delay);
		}
	}
}

impl RegisterBus for MockBus {
	fn read(&mut self, address: u8) -> Result<u8, Box<dyn std::error::Error>> {
		self.delay();
		let mut state = self.state.lock().unwrap();
		if let Some(message) = state.next_error.take() {
			return Err(io::Error::new(io::ErrorKind::Other, message).into());
		}
		state.ops.push((thread::current().id(), BusOp::Read(address)));

		let value = match address {
			REG_FIFO => {
				let ptr = state.regs[usize::from(REG_FIFO_ADDR_PTR)];
				let value = state.fifo[usize::from(ptr)];
				state.regs[usize::from(REG_FIFO_ADDR_PTR)] = ptr.wrapping_add(1);
				value
			}
			_ => state.regs[usize::from(address)],
		};
		Ok(value)
	}

	fn write(&mut self, address: u8, value: u8) -> Result<(), Box<dyn std::error::Error>> {
		self.delay();
		let mut state = self.state.lock().unwrap();
		if let Some(message) = state.next_error.take() {
			return Err(io::Error::new(io::ErrorKind::Other, message).into());
		}
		state.ops.push((thread::current().id(), BusOp::Write(address, value)));

		match address {
			REG_FIFO => {
				let ptr = state.regs[usize::from(REG_FIFO_ADDR_PTR)];
				state.fifo[usize::from(ptr)] = value;
				state.regs[usize::from(REG_FIFO_ADDR_PTR)] = ptr.wrapping_add(1);
			}
			REG_IRQ_FLAGS => {
				// write-1-to-clear
				state.regs[usize::from(REG_IRQ_FLAGS)] &= !value;
			}
			REG_OP_MODE => {
				state.regs[usize::from(REG_OP_MODE)] = value;
				if state.auto_tx_done && value == (OpMode::LORA | OpMode::TX).bits() {
					state.regs[usize::from(REG_IRQ_FLAGS)] |= IrqFlags::TX_DONE.bits();
					state.regs[usize::from(REG_FIFO_RX_CURRENT_ADDR)] = FIFO_TX_BASE_ADDR;
					let length = state.regs[usize::from(REG_PAYLOAD_LENGTH)];
					state.regs[usize::from(REG_RX_NB_BYTES)] = length;
				}
			}
			_ => state.regs[usize::from(address)] = value,
		}
		Ok(())
	}
}

type EdgeHandler = Box<dyn FnMut() + Send>;

/// Test double for the DIO0 line: `fire` behaves like a rising edge and runs
/// the attached handler on the calling thread.
#[derive(Clone, Default)]
pub struct MockDio0 {
	handler: Arc<Mutex<Option<EdgeHandler>>>,
}

impl MockDio0 {
	pub fn new() -> MockDio0 {
		MockDio0 {
			handler: Arc::new(Mutex::new(None)),
		}
	}

	pub fn attached(&self) -> bool {
		self.handler.lock().unwrap().is_some()
	}

	pub fn fire(&self) {
		if let Some(handler) = self.handler.lock().unwrap().as_mut() {
			handler();
		}
	}
}

impl Dio0 for MockDio0 {
	fn attach_rising_edge(&mut self, handler: EdgeHandler) -> Result<(), Box<dyn std::error::Error>> {
		*self.handler.lock().unwrap() = Some(handler);
		Ok(())
	}

	fn detach(&mut self) -> Result<(), Box<dyn std::error::Error>> {
		self.handler.lock().unwrap().take();
		Ok(())
	}
}
