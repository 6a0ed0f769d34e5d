//! Clocked access to the device's narrow bus.
//!
//! The device sees three inputs (`clk`, `rst`, `data_in`) and one output
//! (`data_out`). [`Bus`] owns the clock: callers describe the `rst`/`data_in`
//! levels to hold and which edge to advance to, and get back whatever the
//! device drives on `data_out` after that edge.

use crate::encoding::NIBBLE_MASK;

/// Pin levels applied to the device on one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pins {
    pub clk: bool,
    pub rst: bool,
    pub data_in: u8,
}

/// The device under test, as seen from its pins.
pub trait Dut {
    /// Apply pin levels and evaluate. A change in `clk` is a clock edge.
    fn apply(&mut self, pins: Pins);

    fn data_out(&self) -> u8;
}

impl<T: Dut + ?Sized> Dut for Box<T> {
    fn apply(&mut self, pins: Pins) {
        (**self).apply(pins)
    }

    fn data_out(&self) -> u8 {
        (**self).data_out()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

impl Edge {
    fn level(self) -> bool {
        matches!(self, Edge::Rising)
    }
}

/// Reset and data levels held on the bus through one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Signals {
    pub rst: bool,
    pub data_in: u8,
}

impl Signals {
    pub fn data(value: u8) -> Self {
        Self {
            rst: false,
            data_in: value & NIBBLE_MASK,
        }
    }

    pub fn reset(request: ResetRequest) -> Self {
        Self {
            rst: true,
            data_in: request.code(),
        }
    }

    pub fn idle() -> Self {
        Self::default()
    }
}

pub const RESET_FULL: u8 = 0x1;
pub const RESET_ADDRESS: u8 = 0x2;
pub const RESET_RANDOM_ENABLE: u8 = 0x4;

/// Control code carried on `data_in` while `rst` is high.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetRequest {
    /// Clear all architectural state. Leaves the random generator disabled.
    Full,
    /// Restart instruction transfer without touching registers.
    AddressCounter,
    EnableRandom,
    /// Address-counter reset with the enable bit clear.
    DisableRandom,
}

impl ResetRequest {
    pub fn code(self) -> u8 {
        match self {
            ResetRequest::Full => RESET_FULL,
            ResetRequest::AddressCounter | ResetRequest::DisableRandom => RESET_ADDRESS,
            ResetRequest::EnableRandom => RESET_ADDRESS | RESET_RANDOM_ENABLE,
        }
    }

    pub fn for_random(enabled: bool) -> Self {
        if enabled {
            ResetRequest::EnableRandom
        } else {
            ResetRequest::DisableRandom
        }
    }
}

pub struct Bus<D> {
    dut: D,
    clk: bool,
    signals: Signals,
    edges: u64,
}

impl<D: Dut> Bus<D> {
    /// Take ownership of `dut` and drive every input low.
    pub fn new(mut dut: D) -> Self {
        dut.apply(Pins::default());
        Self {
            dut,
            clk: false,
            signals: Signals::idle(),
            edges: 0,
        }
    }

    /// Hold `signals` and advance to the next `edge`, passing through the
    /// opposite edge first if the clock already sits at that level.
    pub fn transfer(&mut self, signals: Signals, edge: Edge) -> u8 {
        self.signals = signals;
        if self.clk == edge.level() {
            self.toggle();
        }
        self.toggle();
        self.dut.data_out()
    }

    /// Hold `signals` for `count` full clock periods, ending on a rising edge.
    pub fn cycles(&mut self, signals: Signals, count: u32) -> u8 {
        for _ in 0..count {
            self.transfer(signals, Edge::Rising);
        }
        self.dut.data_out()
    }

    /// Change the held levels without a clock edge.
    pub fn hold(&mut self, signals: Signals) {
        self.signals = signals;
        self.dut.apply(self.pins());
    }

    /// Assert `rst` with the request's code for `count` periods, then release.
    pub fn pulse_reset(&mut self, request: ResetRequest, count: u32) {
        log::trace!("reset pulse {:?} (code {}) x{}", request, request.code(), count);
        self.cycles(Signals::reset(request), count);
        self.hold(Signals::idle());
    }

    pub fn clock_level(&self) -> bool {
        self.clk
    }

    /// Clock edges generated since construction.
    pub fn edges(&self) -> u64 {
        self.edges
    }

    pub fn data_out(&self) -> u8 {
        self.dut.data_out()
    }

    pub fn dut(&self) -> &D {
        &self.dut
    }

    pub fn dut_mut(&mut self) -> &mut D {
        &mut self.dut
    }

    pub fn into_inner(self) -> D {
        self.dut
    }

    fn toggle(&mut self) {
        self.clk = !self.clk;
        self.edges += 1;
        self.dut.apply(self.pins());
    }

    fn pins(&self) -> Pins {
        Pins {
            clk: self.clk,
            rst: self.signals.rst,
            data_in: self.signals.data_in,
        }
    }
}
