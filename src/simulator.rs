use camino::Utf8Path;
use eyre::Result;
use marlin::{
    verilator::{VerilatorRuntime, VerilatorRuntimeOptions},
    verilog::prelude::*,
};

use crate::bus::{Dut, Pins};
use crate::config::{RtlConfig, RTL_TOP};

// Testbench wrapper exposing clk, rst, data_in[5:0] and data_out[7:0]
#[verilog(src = "hova_tb.sv", name = "hova_tb")]
pub struct HovaTestbench;

pub fn create_hova_runtime(rtl: &RtlConfig) -> Result<VerilatorRuntime> {
    let src_files: Vec<&Utf8Path> = rtl.sources.iter().map(|p| p.as_path()).collect();
    let include_paths: Vec<&Utf8Path> = rtl.include_paths.iter().map(|p| p.as_path()).collect();
    if rtl.top != RTL_TOP {
        log::warn!("rtl.top = {:?} ignored, bindings are built for {}", rtl.top, RTL_TOP);
    }
    log::info!(
        "building {} from {} sources into {}",
        RTL_TOP,
        src_files.len(),
        rtl.artifacts
    );

    VerilatorRuntime::new(
        &rtl.artifacts,
        &src_files,
        &include_paths,
        [],
        VerilatorRuntimeOptions::default_logging(),
    )
    .map_err(|e| eyre::eyre!("Failed to create runtime: {}", e))
}

impl Dut for HovaTestbench<'_> {
    fn apply(&mut self, pins: Pins) {
        self.clk = pins.clk as u8;
        self.rst = pins.rst as u8;
        self.data_in = pins.data_in & 0x3F;
        self.eval();
    }

    fn data_out(&self) -> u8 {
        self.data_out
    }
}
