use eyre::Result;
use hova_sim::{
    assembler::{ASource, BSource, WSource},
    instr, AluOp, Config, Dut, HovaModel, Port, ProgramDriver,
};

/// in1[i] * 8, looping from address 2 once primed.
fn times_eight() -> Vec<u32> {
    let add_both = instr().alu(AluOp::Add).a(ASource::Alu).b(BSource::Alu);
    vec![
        instr().a(ASource::Input).assemble(),
        instr().b(BSource::A).assemble(),
        add_both.clone().assemble(),
        add_both.assemble(),
        instr().alu(AluOp::Add).w(WSource::Alu).a(ASource::Input).assemble(),
        instr()
            .out(Port::One)
            .b(BSource::A)
            .pc(hova_sim::assembler::PcControl::Jump)
            .target(2)
            .assemble(),
    ]
}

fn run<D: Dut>(dut: D, config: &Config, inputs: &[i16]) -> Result<()> {
    let mut staged = inputs.to_vec();
    // The loop reads one value ahead.
    staged.push(0);
    let mut driver = ProgramDriver::new(dut, config, times_eight(), staged, []);
    let (out1, _) = driver.run_until(inputs.len())?;
    for (input, output) in inputs.iter().zip(out1) {
        println!("{:>6} * 8 = {:>6}", input, output);
    }
    println!("{} instructions executed", driver.executed());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let config = Config::load();

    let mut rtl = false;
    let mut inputs = Vec::new();
    for arg in std::env::args().skip(1) {
        if arg == "--rtl" {
            rtl = true;
        } else {
            let value: i16 = arg
                .parse()
                .map_err(|e| eyre::eyre!("bad input value {:?}: {}", arg, e))?;
            inputs.push(value);
        }
    }
    if inputs.is_empty() {
        inputs = vec![1, -2, 37, 255, -256];
    }

    if rtl {
        #[cfg(feature = "verilator")]
        {
            let runtime = hova_sim::create_hova_runtime(&config.rtl)?;
            let dut = runtime
                .create_model_simple::<hova_sim::HovaTestbench>()
                .map_err(|e| eyre::eyre!("Failed to create HoVa model: {:?}", e))?;
            println!("Running on RTL ({})", hova_sim::config::RTL_TOP);
            return run(dut, &config, &inputs);
        }
        #[cfg(not(feature = "verilator"))]
        eyre::bail!("--rtl needs a build with the `verilator` feature");
    }

    println!("Running on the behavioural model");
    run(HovaModel::new(&config.model), &config, &inputs)
}
