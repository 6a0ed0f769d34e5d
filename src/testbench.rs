//! Directed stimulus on top of the sequencer: reset, register loads and
//! single instructions with their observed PC and outputs.

use crate::assembler::{words, Port};
use crate::bus::{Bus, Dut};
use crate::config::Config;
use crate::error::Result;
use crate::sequencer::{Execution, IoQueues, Sequencer};

pub struct Testbench<D> {
    sequencer: Sequencer<D>,
    pub io: IoQueues,
    reset_cycles: u32,
    pc: u8,
}

impl<D: Dut> Testbench<D> {
    pub fn new(dut: D, config: &Config) -> Self {
        Self {
            sequencer: Sequencer::new(Bus::new(dut), config.empty_queue),
            io: IoQueues::default(),
            reset_cycles: config.reset_cycles,
            pc: 0,
        }
    }

    /// Build and immediately apply a full reset.
    pub fn start(dut: D, config: &Config) -> Self {
        let mut tb = Self::new(dut, config);
        tb.reset();
        tb
    }

    pub fn reset(&mut self) {
        self.sequencer.reset(self.reset_cycles);
        self.pc = 0;
    }

    /// Execute one word. The PC mirror follows the device even when the
    /// execution is reported as an error.
    pub fn execute(&mut self, word: u32) -> Result<Execution> {
        let outcome = self.sequencer.execute(word, &mut self.io);
        let execution = match &outcome {
            Ok(execution) => Some(execution),
            Err(e) => e.execution(),
        };
        if let Some(execution) = execution {
            self.pc = execution.pc;
        }
        outcome
    }

    /// PC reported by the last execution.
    pub fn pc(&self) -> u8 {
        self.pc
    }

    /// Most recent value written to output port 1, or 0.
    pub fn out1(&self) -> i16 {
        self.io.out1.last().copied().unwrap_or(0)
    }

    pub fn out2(&self) -> i16 {
        self.io.out2.last().copied().unwrap_or(0)
    }

    /// A <= `value`, fed through input port 1 ahead of anything already
    /// queued there.
    pub fn load_a(&mut self, value: i16) -> Result<()> {
        log::debug!("A <= {}", value);
        self.io.in1.push_front(value);
        // One instruction to shift the value in, one to consume it.
        self.execute(words::NOP)?;
        self.execute(words::load_a_from(Port::One))?;
        Ok(())
    }

    pub fn load_b(&mut self, value: i16) -> Result<()> {
        log::debug!("B <= {}", value);
        self.execute(words::load_b_immediate(value))?;
        Ok(())
    }

    /// C <= `value` via B. Clobbers B.
    pub fn load_c(&mut self, value: i16) -> Result<()> {
        log::debug!("C <= {}", value);
        self.load_b(value)?;
        self.execute(words::copy_b_to_c())?;
        Ok(())
    }

    pub fn set_random_enabled(&mut self, enabled: bool) {
        self.sequencer.set_random_enabled(enabled);
    }

    pub fn sequencer(&self) -> &Sequencer<D> {
        &self.sequencer
    }

    pub fn sequencer_mut(&mut self) -> &mut Sequencer<D> {
        &mut self.sequencer
    }

    pub fn dut(&self) -> &D {
        self.sequencer.bus().dut()
    }
}
