pub mod assembler;
pub mod bus;
pub mod config;
pub mod driver;
pub mod encoding;
pub mod error;
pub mod model;
pub mod semantics;
pub mod sequencer;
#[cfg(feature = "verilator")]
pub mod simulator;
pub mod testbench;

pub use assembler::{instr, words, AluOp, InstructionWord, Instr, Port};
pub use bus::{Bus, Dut, Edge, Pins, ResetRequest, Signals};
pub use config::{Config, EmptyQueuePolicy, ModelConfig};
pub use driver::ProgramDriver;
pub use error::DriverError;
pub use model::HovaModel;
pub use sequencer::{Execution, IoQueues, Sequencer, SequencerState};
#[cfg(feature = "verilator")]
pub use simulator::*;
pub use testbench::Testbench;
