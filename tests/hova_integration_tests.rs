use hova_sim::assembler::{ASource, FlagSelect, PcControl, WSource};
use hova_sim::semantics::FlagTiming;
use hova_sim::sequencer::EDGES_PER_INSTRUCTION;
use hova_sim::encoding;
use hova_sim::{
    instr, words, AluOp, Config, DriverError, Edge, EmptyQueuePolicy, HovaModel, Port,
    ProgramDriver, ResetRequest, Signals, Testbench,
};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn start_with(config: &Config) -> Testbench<HovaModel> {
    Testbench::start(HovaModel::new(&config.model), config)
}

fn start() -> Testbench<HovaModel> {
    start_with(&Config::default())
}

/// Load A and B, compute W = ALU(op) with F = NEG, then output W on port 1.
fn check_alu_op(
    tb: &mut Testbench<HovaModel>,
    op: AluOp,
    a: i16,
    b: i16,
    expected: i16,
) -> TestResult {
    tb.load_a(a)?;
    tb.load_b(b)?;
    tb.execute(words::alu_to_w(op))?;
    tb.execute(words::output(Port::One))?;
    assert_eq!(tb.out1(), expected, "{:?} with A={} B={}", op, a, b);
    Ok(())
}

#[test]
fn test_alu() -> TestResult {
    let mut tb = start();

    check_alu_op(&mut tb, AluOp::Zero, 7, 35, 0)?;
    check_alu_op(&mut tb, AluOp::Negate, 7, 35, -7)?;
    check_alu_op(&mut tb, AluOp::PassB, 7, 35, 35)?;

    //                     ALU- A- B- C- D W- F- PC O I X K----- L-----
    tb.execute(0b0010_00_00_10_0_00_00_00_0_0_0_000000_000000)?; // DEC
    check_alu_op(&mut tb, AluOp::PassC, 7, 35, -1)?;

    tb.load_c(23)?;
    check_alu_op(&mut tb, AluOp::PassC, 7, 35, 23)?;

    check_alu_op(&mut tb, AluOp::ShiftRight, 7, 35, 3)?;
    check_alu_op(&mut tb, AluOp::Add, 7, 35, 42)?;
    check_alu_op(&mut tb, AluOp::Sub, 7, 35, 28)?;
    check_alu_op(&mut tb, AluOp::AddFlag, 7, 35, 42)?;
    check_alu_op(&mut tb, AluOp::SubFlag, 7, 35, 28)?;

    // B-A going negative sets F for the next flag-consuming op.
    check_alu_op(&mut tb, AluOp::Sub, 35, 7, -28)?;
    check_alu_op(&mut tb, AluOp::AddFlag, 7, 35, 43)?;
    check_alu_op(&mut tb, AluOp::Sub, 35, 7, -28)?;
    check_alu_op(&mut tb, AluOp::SubFlag, 7, 35, 27)?;

    check_alu_op(&mut tb, AluOp::Or, 7, 35, 7 | 35)?;
    check_alu_op(&mut tb, AluOp::And, 7, 35, 7 & 35)?;
    check_alu_op(&mut tb, AluOp::Xor, 7, 35, 7 ^ 35)?;
    check_alu_op(&mut tb, AluOp::Not, 7, 35, !7)?;
    check_alu_op(&mut tb, AluOp::PassA, 7, 35, 7)?;
    check_alu_op(&mut tb, AluOp::Random, 8, 35, 0)?; // disabled
    check_alu_op(&mut tb, AluOp::One, 9, 42, 1)?;
    Ok(())
}

#[test]
fn test_alu_negative_results_sign_extend() -> TestResult {
    let mut tb = start();
    check_alu_op(&mut tb, AluOp::Negate, 2047, 0, -2047)?;
    check_alu_op(&mut tb, AluOp::Sub, 1000, -1000, -2000)?;
    check_alu_op(&mut tb, AluOp::Add, -2048, 0, -2048)?;
    check_alu_op(&mut tb, AluOp::Not, 0, 0, -1)?;
    Ok(())
}

#[test]
fn test_random_generator() -> TestResult {
    let mut tb = start();
    tb.set_random_enabled(true);

    for _ in 0..2 {
        //                     ALU- A- B- C- D W- F- PC O I X K----- L-----
        tb.execute(0b1110_00_00_00_0_01_00_00_0_0_0_000000_000000)?; // W=RND
        tb.execute(0b1110_00_00_00_0_01_00_00_1_0_0_000000_000000)?; // OUT1=W, W=RND
        tb.execute(0b1110_00_00_00_0_00_00_00_1_1_0_000000_000000)?; // OUT2=W
        assert_ne!(tb.out1(), tb.out2());
    }

    // The enable survives the per-instruction reset pulses.
    assert!(tb.sequencer().random_enabled());
    assert!(tb.dut().machine().random_enabled());

    // Ordinary ops are unaffected.
    check_alu_op(&mut tb, AluOp::Sub, 35, 7, -28)?;
    check_alu_op(&mut tb, AluOp::AddFlag, 7, 35, 43)?;
    check_alu_op(&mut tb, AluOp::Xor, 7, 35, 7 ^ 35)?;

    tb.set_random_enabled(false);
    check_alu_op(&mut tb, AluOp::Random, 0, 0, 0)?;
    Ok(())
}

#[test]
fn test_unconditional_jumps() -> TestResult {
    let mut tb = start();
    assert_eq!(tb.execute(words::jump(8))?.pc, 8);
    assert_eq!(tb.execute(words::jump(255))?.pc, 255);
    assert_eq!(tb.execute(words::NOP)?.pc, 0);
    Ok(())
}

/// DEC, F=ZERO(C), JMPT 0
fn dec_zero_jmpt() -> u32 {
    //  ALU- A- B- C- D W- F- PC O I X K----- L-----
    0b0011_00_00_10_0_00_01_10_0_0_0_000000_000000
}

#[test]
fn test_dec_jmpt_loop_previous_flag() -> TestResult {
    let mut config = Config::default();
    config.model.flag_timing = FlagTiming::PreviousInstruction;
    let mut tb = start_with(&config);

    tb.load_c(4)?;
    let pc_start = tb.pc();

    // F only becomes true once C has read as zero, and the jump sees it one
    // instruction later.
    for i in 1..=5 {
        tb.execute(dec_zero_jmpt())?;
        assert_eq!(tb.pc(), pc_start + i);
    }
    tb.execute(dec_zero_jmpt())?;
    assert_eq!(tb.pc(), 0);
    Ok(())
}

#[test]
fn test_dec_jmpt_loop_same_instruction_flag() -> TestResult {
    let mut tb = start();
    tb.load_c(4)?;
    let pc_start = tb.pc();

    for i in 1..=4 {
        tb.execute(dec_zero_jmpt())?;
        assert_eq!(tb.pc(), pc_start + i);
    }
    tb.execute(dec_zero_jmpt())?;
    assert_eq!(tb.pc(), 0);
    Ok(())
}

#[test]
fn test_decnz_and_conditional_jumps() -> TestResult {
    let mut tb = start();
    //                   ALU- A- B- C- D W- F- PC O I X K----- L-----
    let decnz_16: u32 = 0b0000_00_00_11_0_00_00_00_0_0_0_000000_010000;

    tb.load_c(4)?;
    for _ in 0..3 {
        assert_eq!(tb.execute(decnz_16)?.pc, 16);
    }
    assert_eq!(tb.execute(decnz_16)?.pc, 17);

    // DECNZ falls through but the JMP is taken.
    tb.load_c(1)?;
    tb.execute(0b0000_00_00_11_0_00_10_01_0_0_0_000000_010000)?;
    assert_eq!(tb.pc(), 16);

    // DECNZ takes the branch regardless of the JMPT condition.
    tb.load_c(2)?;
    tb.execute(0b0000_00_00_00_0_00_10_00_0_0_0_000000_000000)?; // F=NEG(0)
    tb.execute(0b0000_00_00_11_0_00_00_10_0_0_0_000000_010000)?; // DECNZ,JMPT 16
    assert_eq!(tb.pc(), 16);

    // F=ZERO(0) sets the flag: JMPF falls through, JMPT jumps.
    tb.execute(0b0000_00_00_00_0_00_01_00_0_0_0_000000_000000)?;
    tb.execute(0b0000_00_00_00_0_00_00_11_0_0_0_000000_000000)?;
    assert_eq!(tb.pc(), 18);
    tb.execute(0b0000_00_00_00_0_00_00_10_0_0_0_000000_000000)?;
    assert_eq!(tb.pc(), 0);
    Ok(())
}

#[test]
fn test_single_instruction_flag_and_branch() -> TestResult {
    let mut tb = start();
    let word = instr()
        .alu(AluOp::Zero)
        .flag(FlagSelect::Zero)
        .pc(PcControl::JumpIfTrue)
        .target(99)
        .assemble();
    assert_eq!(tb.execute(word)?.pc, 99);
    Ok(())
}

#[test]
fn test_io() -> TestResult {
    let mut tb = start();

    // NOP to prime the inputs
    tb.io.in1.push_back(23);
    tb.io.in2.push_back(42);
    tb.execute(words::NOP)?;

    //                     ALU- A- B- C- D W- F- PC O I X K----- L-----
    tb.execute(0b0000_11_00_00_0_00_00_00_0_0_0_000000_000000)?; // A=IN1
    assert!(tb.io.in1.is_empty());

    tb.execute(0b0000_11_00_00_1_11_00_00_0_1_0_111011_000000)?; // D=A, A=IN2, W=-5
    assert!(tb.io.in2.is_empty());
    assert_eq!(tb.out1(), 0);
    assert_eq!(tb.out2(), 0);

    tb.execute(0b0000_10_00_00_0_10_00_00_1_0_0_000000_000000)?; // W=A, OUT1=W, A=D
    assert_eq!(tb.out1(), -5);
    assert_eq!(tb.out2(), 0);

    tb.execute(0b0000_00_00_00_0_10_00_00_1_1_0_000000_000000)?; // W=A, OUT2=W
    assert_eq!(tb.out2(), 42);
    assert_eq!(tb.out1(), -5);

    let exec = tb.execute(0b0001_00_00_00_0_01_00_00_1_0_0_000000_000000)?; // OUT1=W, W=-A
    assert_eq!(exec.out1, Some(23));
    assert_eq!(exec.out2, None);
    assert_eq!(tb.out2(), 42);
    assert_eq!(tb.out1(), 23);

    tb.execute(0b0000_00_00_00_0_00_00_00_1_1_0_000000_000000)?; // OUT2=W
    assert_eq!(tb.out2(), -23);
    assert_eq!(tb.out1(), 23);

    assert_eq!(tb.io.out1, vec![-5, 23]);
    assert_eq!(tb.io.out2, vec![42, -23]);
    Ok(())
}

#[test]
fn test_every_instruction_takes_the_same_edges() -> TestResult {
    let mut tb = start();
    tb.io.in1.extend([1, 2, 3]);
    let program = [
        words::NOP,
        words::jump(200),
        words::load_a_from(Port::One),
        words::alu_to_w(AluOp::Add),
        words::output(Port::Two),
        u32::MAX,
    ];
    for word in program {
        let before = tb.sequencer().bus().edges();
        tb.execute(word)?;
        assert_eq!(tb.sequencer().bus().edges() - before, EDGES_PER_INSTRUCTION);
    }
    Ok(())
}

#[test]
fn test_debug_capture_holds_status() -> TestResult {
    let mut tb = start();
    let exec = tb.execute(words::output(Port::Two))?;
    assert_eq!(exec.debug[4], 0b1000);
    assert!(exec.status.out2_valid);
    Ok(())
}

#[test]
fn test_empty_queue_tolerant() -> TestResult {
    let mut tb = start();
    let exec = tb.execute(words::load_a_from(Port::One))?;
    assert!(exec.status.consume_in1);
    assert!(tb.io.in1.is_empty());
    Ok(())
}

#[test]
fn test_empty_queue_strict() -> TestResult {
    let config = Config {
        empty_queue: EmptyQueuePolicy::Strict,
        ..Config::default()
    };
    let mut tb = start_with(&config);
    let err = tb.execute(words::load_a_from(Port::Two)).unwrap_err();
    assert!(matches!(err, DriverError::QueueUnderflow { port: Port::Two, .. }));

    // The failed execution still ran every phase.
    assert_eq!(tb.execute(words::jump(8))?.pc, 8);
    Ok(())
}

#[test]
fn test_strict_underflow_keeps_pc_in_step() -> TestResult {
    let config = Config {
        empty_queue: EmptyQueuePolicy::Strict,
        ..Config::default()
    };
    let mut tb = start_with(&config);
    tb.execute(words::jump(5))?;

    let err = tb.execute(words::load_a_from(Port::Two)).unwrap_err();
    assert_eq!(err.execution().map(|e| e.pc), Some(6));
    assert_eq!(tb.pc(), 6);
    assert_eq!(tb.execute(words::NOP)?.pc, 7);
    Ok(())
}

#[test]
fn test_load_a_ignores_queued_inputs() -> TestResult {
    let mut tb = start();
    tb.io.in1.extend([1, 2]);
    tb.load_a(-77)?;
    assert_eq!(tb.dut().machine().regs.a, -77);
    assert_eq!(tb.io.in1, [1, 2]);
    Ok(())
}

#[test]
fn test_pc_wraps_through_nop_memory() -> TestResult {
    let mut tb = start();
    for i in 1..512u32 {
        let exec = tb.execute(words::NOP)?;
        assert_eq!(u32::from(exec.pc), i % 256);
        assert_eq!(exec.status.to_nibble(), 0);
        assert_eq!(exec.result, 0);
    }
    Ok(())
}

#[test]
fn test_address_reset_abandons_partial_instruction() -> TestResult {
    let mut tb = start();
    tb.execute(words::jump(8))?;

    // Would jump and write port 1 if it ever completed.
    let abandoned = instr().out(Port::One).pc(PcControl::Jump).target(100).assemble();
    let nibbles = encoding::encode(abandoned);

    for groups in 1..=5 {
        let pc = tb.pc();
        let bus = tb.sequencer_mut().bus_mut();
        for (i, &nibble) in nibbles.iter().take(groups).enumerate() {
            let edge = if i % 2 == 0 { Edge::Rising } else { Edge::Falling };
            bus.transfer(Signals::data(nibble), edge);
        }
        bus.pulse_reset(ResetRequest::AddressCounter, 1);

        let exec = tb.execute(words::NOP)?;
        assert_eq!(exec.pc, pc + 1, "after {} groups", groups);
        assert_eq!(exec.status.to_nibble(), 0);
        assert_eq!(exec.result, 0);
    }
    assert!(tb.io.out1.is_empty());
    assert_eq!(tb.dut().instructions(), 6);
    Ok(())
}

/// in1[i] * 8, restarting from address 0.
fn loop1() -> Vec<u32> {
    //   ALU- A- B- C- D W- F- PC O I X K----- L-----
    vec![
        0b0000_11_00_00_0_00_00_00_0_0_0_000000_000000, // A=IN1
        0b0000_00_10_00_0_00_00_00_0_0_0_000000_000000, // B=A
        0b0101_01_01_00_0_00_00_00_0_0_0_000000_000000, // A=B=A+B
        0b0101_01_01_00_0_00_00_00_0_0_0_000000_000000, // A=B=A+B
        0b0101_00_00_00_0_01_00_00_0_0_0_000000_000000, // W=A+B
        0b0000_00_00_00_0_00_00_00_1_0_0_000000_000000, // OUT1=W
        0b0000_00_00_00_0_00_00_01_0_0_0_000000_000000, // JMP 0
    ]
}

/// in1[i] * 8, reading the next input while the current result goes out.
fn loop5() -> Vec<u32> {
    //   ALU- A- B- C- D W- F- PC O I X K----- L-----
    vec![
        0b0000_11_00_00_0_00_00_00_0_0_0_000000_000000, // A=IN1
        0b0000_00_10_00_0_00_00_00_0_0_0_000000_000000, // B=A
        0b0101_01_01_00_0_00_00_00_0_0_0_000000_000000, // A=B=A+B
        0b0101_01_01_00_0_00_00_00_0_0_0_000000_000000, // A=B=A+B
        0b0101_11_00_00_0_01_00_00_0_0_0_000000_000000, // W=A+B,A=IN1
        0b0000_00_10_00_0_00_00_01_1_0_0_000000_000010, // OUT1=W,B=A,JMP 2
    ]
}

#[test]
fn test_example_loop1() -> TestResult {
    let config = Config::default();
    let in1: Vec<i16> = vec![23, 42, -7, 255, -256, 0, 1, -1, 100, -100];
    let mut driver = ProgramDriver::new(
        HovaModel::new(&config.model),
        &config,
        loop1(),
        in1.clone(),
        [],
    );
    let (out1, out2) = driver.run_until(in1.len())?;
    let expected: Vec<i16> = in1.iter().map(|v| v * 8).collect();
    assert_eq!(out1, expected.as_slice());
    assert!(out2.is_empty());
    assert!(driver.io().in1.is_empty());
    Ok(())
}

#[test]
fn test_example_loop5() -> TestResult {
    let config = Config::default();
    let values: Vec<i16> = vec![5, -17, 200, -255, 31];
    let mut in1 = values.clone();
    in1.push(0);
    let mut driver = ProgramDriver::new(HovaModel::new(&config.model), &config, loop5(), in1, []);
    let (out1, _) = driver.run_until(values.len())?;
    let expected: Vec<i16> = values.iter().map(|v| v * 8).collect();
    assert_eq!(out1, expected.as_slice());
    Ok(())
}

#[test]
fn test_queue_ordering_across_ports() -> TestResult {
    let config = Config::default();
    // out1 <- in1, out2 <- in2, alternating.
    let program = vec![
        instr().a(ASource::Input).input(Port::One).assemble(),
        instr().w(WSource::A).a(ASource::Input).input(Port::Two).assemble(),
        instr().w(WSource::A).out(Port::One).assemble(),
        instr().out(Port::Two).pc(PcControl::Jump).target(0).assemble(),
    ];
    let mut driver = ProgramDriver::new(
        HovaModel::new(&config.model),
        &config,
        program,
        [23, 42, 5],
        [-1, -2, -3],
    );
    let (out1, out2) = driver.run_until(3)?;
    assert_eq!(out1, &[23, 42, 5]);
    assert_eq!(out2, &[-1, -2]);
    Ok(())
}

/// Finds the two entries of in1 summing to 2020. Uses port 2 as a scratch
/// queue holding the values already seen.
fn aoc2020_1_1() -> Vec<u32> {
    vec![
        0x0f0017e4, 0x6d001000, 0x60127000, 0x0c001000, 0x10031011, 0x60137007, 0x0c009004,
        0x0c003000, 0x0c003000, 0x030017e4, 0x6d183000, 0x60127000, 0x0c013011, 0x10021000,
        0x6c137009, 0x10031011, 0x0000900e, 0x270057e4, 0x60081000, 0x00005000,
    ]
}

#[test]
fn test_pair_sum_with_port2_loopback() -> TestResult {
    let mut config = Config::default();
    config.model.flag_timing = FlagTiming::PreviousInstruction;
    let in1: Vec<i16> = vec![
        2000, 50, 1984, 1648, 32, 1612, 1992, 1671, 1955, 1658, 1592, 1596, 1888, 1540, 239, 1677,
        1602, 1877, 1481, 2004, 1985, 1829, 1980, 1500, 1120, 1849, 1941, 1403, 1515, 1915, 1862,
        2002, 1952, 1893, 1494, 1610, 1432, 1547, 1488, 1642, 1982, 1666, 1856, 1889, 1691, 1976,
        1962, 2005, 1611, 1665, 1816, 1880, 1896, 1552, 1809, 1844, 1553, 1841, 1785, 1968, 1491,
        1498, 1995, 1748, 1533, 1988, 2001, 1917, 0,
    ];
    let mut driver = ProgramDriver::with_loopback(
        HovaModel::new(&config.model),
        &config,
        aoc2020_1_1(),
        in1,
    );
    let (out1, out2) = driver.run_until(2)?;
    assert_eq!(out1.len(), 2);
    assert_eq!(out1[0] + out1[1], 2020);
    assert!(out2.is_empty());
    Ok(())
}

#[test]
fn test_pc_outside_program() {
    let config = Config::default();
    let mut driver = ProgramDriver::new(
        HovaModel::new(&config.model),
        &config,
        vec![words::NOP],
        [],
        [],
    );
    let err = driver.run_until(1).unwrap_err();
    assert!(matches!(err, DriverError::PcOutsideProgram { pc: 1, len: 1 }));
}

#[test]
fn test_instruction_limit() {
    let config = Config {
        instruction_limit: Some(10),
        ..Config::default()
    };
    let mut driver = ProgramDriver::new(
        HovaModel::new(&config.model),
        &config,
        vec![words::jump(0)],
        [],
        [],
    );
    let err = driver.run_until(1).unwrap_err();
    assert!(matches!(
        err,
        DriverError::InstructionLimit {
            limit: 10,
            produced: 0,
            target: 1
        }
    ));
    assert_eq!(driver.executed(), 10);
}
