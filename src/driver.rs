//! Runs a program image against the device until enough output arrives.

use crate::assembler::words;
use crate::bus::Dut;
use crate::config::Config;
use crate::error::{DriverError, Result};
use crate::sequencer::{Execution, IoQueues};
use crate::testbench::Testbench;

pub struct ProgramDriver<D> {
    tb: Testbench<D>,
    program: Vec<u32>,
    instruction_limit: Option<u64>,
    executed: u64,
}

impl<D: Dut> ProgramDriver<D> {
    /// Reset the device and stage the input queues.
    pub fn new(
        dut: D,
        config: &Config,
        program: Vec<u32>,
        in1: impl IntoIterator<Item = i16>,
        in2: impl IntoIterator<Item = i16>,
    ) -> Self {
        Self::with_queues(dut, config, program, IoQueues::new(in1, in2))
    }

    /// Like [`ProgramDriver::new`] for programs without a second input:
    /// whatever they write to port 2 is read back from input port 2.
    pub fn with_loopback(
        dut: D,
        config: &Config,
        program: Vec<u32>,
        in1: impl IntoIterator<Item = i16>,
    ) -> Self {
        Self::with_queues(dut, config, program, IoQueues::looped(in1))
    }

    fn with_queues(dut: D, config: &Config, program: Vec<u32>, io: IoQueues) -> Self {
        let mut tb = Testbench::start(dut, config);
        tb.io = io;
        Self {
            tb,
            program,
            instruction_limit: config.instruction_limit,
            executed: 0,
        }
    }

    /// Execute the instruction the device's PC currently selects.
    pub fn execute_one(&mut self) -> Result<Execution> {
        let pc = self.tb.pc();
        let word = *self
            .program
            .get(pc as usize)
            .ok_or(DriverError::PcOutsideProgram {
                pc,
                len: self.program.len(),
            })?;
        self.executed += 1;
        self.tb.execute(word)
    }

    /// Prime the inputs with `JMP 0`, then run until `out1` holds `target`
    /// values.
    pub fn run_until(&mut self, target: usize) -> Result<(&[i16], &[i16])> {
        log::info!(
            "running {}-word program until {} outputs",
            self.program.len(),
            target
        );
        self.tb.execute(words::jump(0))?;
        while self.tb.io.out1.len() < target {
            if let Some(limit) = self.instruction_limit {
                if self.executed >= limit {
                    return Err(DriverError::InstructionLimit {
                        limit,
                        produced: self.tb.io.out1.len(),
                        target,
                    });
                }
            }
            self.execute_one()?;
        }
        log::info!("program produced {} outputs in {} instructions", target, self.executed);
        Ok((self.tb.io.out1.as_slice(), self.tb.io.out2.as_slice()))
    }

    pub fn io(&self) -> &IoQueues {
        &self.tb.io
    }

    /// Program instructions executed so far, not counting the priming jump.
    pub fn executed(&self) -> u64 {
        self.executed
    }

    pub fn testbench(&self) -> &Testbench<D> {
        &self.tb
    }
}
