use std::path::PathBuf;

use thiserror::Error;

use crate::assembler::Port;
use crate::sequencer::Execution;

#[derive(Debug, Error)]
pub enum DriverError {
    /// Raised after every phase ran, so `execution` still reflects the device.
    #[error("device consumed from input port {port} but the queue is empty")]
    QueueUnderflow { port: Port, execution: Execution },

    #[error("program counter {pc} is outside the {len}-word program image")]
    PcOutsideProgram { pc: u8, len: usize },

    #[error("instruction limit of {limit} reached with {produced} of {target} outputs")]
    InstructionLimit {
        limit: u64,
        produced: usize,
        target: usize,
    },

    #[error("failed to read config {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl DriverError {
    /// The completed execution behind an error raised after the bus transfer.
    pub fn execution(&self) -> Option<&Execution> {
        match self {
            DriverError::QueueUnderflow { execution, .. } => Some(execution),
            _ => None,
        }
    }
}

pub type Result<T, E = DriverError> = std::result::Result<T, E>;
