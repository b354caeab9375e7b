use crate::breakpoint::Breakpoints;
use crate::decode::{decode, BranchKind, Destination, Instruction, Operand};
use crate::error::{Error, LookupKind, Result};
use crate::memory::{Cell, Memory};
use crate::preprocess::preprocess;
use crate::symbol::{Flag, Labels, Register, Sections};
use crate::value::Word;

/// Represents complete machine state during runtime.
///
/// There is no way to reset a machine in place: build a new one from the same source instead.
#[derive(Clone, Debug)]
pub struct Machine {
    memory: Memory,
    sections: Sections,
    labels: Labels,
    breakpoints: Breakpoints,
    /// `GR0`..`GR7`, `PC`, `SP`
    registers: [i64; Register::COUNT],
    /// `Z`, `N`, `C`, `V`
    flags: [u8; Flag::COUNT],
}

/// Why [`Machine::continue_for`] returned.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Stop {
    /// Program counter reached the breakpoint at this address.
    Breakpoint(usize),
    /// Step limit was used up before any breakpoint was reached.
    StepLimit,
}

/// State change of a single instruction. Computed in full before anything is written.
#[derive(Clone, Copy, Debug)]
enum Effect {
    Nothing,
    Jump(usize),
    SetRegister(Register, i64),
    /// ALU result, which also decides the `Z` flag.
    AluResult(Register, i64),
    Store(usize, Word),
}

impl Machine {
    /// Assemble `src` into memory and zero every register and flag.
    pub fn new(src: &str) -> Result<Machine> {
        let image = preprocess(src)?;
        let breakpoints = Breakpoints::from_lines(&image.lines);

        let mut memory = Memory::new();
        for (address, line) in image.lines.iter().enumerate() {
            memory.set(address, Cell::from_line(line))?;
        }

        Ok(Machine {
            memory,
            sections: image.sections,
            labels: image.labels,
            breakpoints,
            registers: [0; Register::COUNT],
            flags: [0; Flag::COUNT],
        })
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn sections(&self) -> &Sections {
        &self.sections
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    pub fn register(&self, register: Register) -> i64 {
        self.registers[register as usize]
    }

    /// Every register with its value, in display order.
    pub fn registers(&self) -> impl Iterator<Item = (Register, i64)> + '_ {
        Register::ALL
            .into_iter()
            .map(|register| (register, self.register(register)))
    }

    pub fn flag(&self, flag: Flag) -> u8 {
        self.flags[flag as usize]
    }

    /// Every flag with its value, in display order.
    pub fn flags(&self) -> impl Iterator<Item = (Flag, u8)> + '_ {
        Flag::ALL.into_iter().map(|flag| (flag, self.flag(flag)))
    }

    pub fn pc(&self) -> i64 {
        self.register(Register::Pc)
    }

    pub fn at_breakpoint(&self) -> bool {
        usize::try_from(self.pc()).is_ok_and(|pc| self.breakpoints.contains(pc))
    }

    /// Cells within `radius` of `center`, with `None` for addresses outside of memory.
    pub fn nearest_lines(
        &self,
        center: i64,
        radius: i64,
    ) -> impl Iterator<Item = (i64, Option<&Cell>)> + '_ {
        (center.saturating_sub(radius)..=center.saturating_add(radius)).map(|address| {
            let cell = usize::try_from(address)
                .ok()
                .and_then(|address| self.memory.get(address).ok());
            (address, cell)
        })
    }

    /// Execute the instruction at `PC`.
    ///
    /// On error nothing is changed, including `PC`.
    pub fn step(&mut self) -> Result<()> {
        let pc = Memory::address(self.pc())?;
        let instruction = self.fetch(pc)?;
        let effect = self.execute(&instruction)?;

        // PC incremented before instruction is performed
        self.registers[Register::Pc as usize] = pc as i64 + 1;
        self.apply(effect);
        Ok(())
    }

    /// Step until `PC` lands on a breakpoint. Always executes at least one instruction.
    ///
    /// Never returns if no breakpoint is reached and no error occurs.
    pub fn continue_to_breakpoint(&mut self) -> Result<usize> {
        loop {
            self.step()?;
            if let Some(address) = self.current_breakpoint() {
                return Ok(address);
            }
        }
    }

    /// Like [`Machine::continue_to_breakpoint`], giving up after `limit` instructions.
    pub fn continue_for(&mut self, limit: u64) -> Result<Stop> {
        for _ in 0..limit {
            self.step()?;
            if let Some(address) = self.current_breakpoint() {
                return Ok(Stop::Breakpoint(address));
            }
        }
        Ok(Stop::StepLimit)
    }

    fn current_breakpoint(&self) -> Option<usize> {
        let pc = usize::try_from(self.pc()).ok()?;
        self.breakpoints.contains(pc).then_some(pc)
    }

    fn fetch(&self, address: usize) -> Result<Instruction> {
        match self.memory.get(address)? {
            Cell::Instruction(line) => decode(line),
            Cell::Empty => Err(Error::unsupported(format!(
                "no instruction at address {}",
                address
            ))),
            Cell::Data { text, .. } => Err(Error::unsupported(format!(
                "data `{}` at address {} is not an instruction",
                text, address
            ))),
        }
    }

    fn execute(&self, instruction: &Instruction) -> Result<Effect> {
        match instruction {
            Instruction::Branch { kind, destination } => {
                let target = self.resolve(destination)?;
                let taken = match kind {
                    BranchKind::Bra => true,
                    BranchKind::Bne => self.flag(Flag::Z) == 0,
                    BranchKind::Beq => self.flag(Flag::Z) == 1,
                    BranchKind::Jsr => {
                        return Err(Error::unsupported("`JSR` is not implemented"));
                    }
                };
                Ok(if taken {
                    Effect::Jump(target)
                } else {
                    Effect::Nothing
                })
            }
            Instruction::Load { register, operand } => {
                Ok(Effect::SetRegister(*register, self.operand_value(operand)?))
            }
            Instruction::Store { register, address } => {
                Ok(Effect::Store(*address, Word::store(self.register(*register))))
            }
            Instruction::Alu {
                op,
                register,
                operand,
            } => {
                let result = op.apply(self.register(*register), self.operand_value(operand)?);
                Ok(Effect::AluResult(*register, result))
            }
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Nothing => (),
            Effect::Jump(address) => {
                self.registers[Register::Pc as usize] = address as i64;
            }
            Effect::SetRegister(register, value) => {
                self.registers[register as usize] = value;
            }
            Effect::AluResult(register, value) => {
                self.registers[register as usize] = value;
                // TODO: compute N, C and V once their semantics for unbounded registers are settled
                self.flags[Flag::Z as usize] = u8::from(value == 0);
            }
            Effect::Store(address, word) => {
                // Address was bounds-checked when decoded
                self.memory[address] = Cell::stored(word);
            }
        }
    }

    fn operand_value(&self, operand: &Operand) -> Result<i64> {
        match operand {
            Operand::Immediate(value) => Ok(*value),
            Operand::Address(address) => self.memory.get(*address)?.value(),
        }
    }

    /// Decimal address, or the address of a label.
    fn resolve(&self, destination: &Destination) -> Result<usize> {
        match destination {
            Destination::Address(address) => Memory::address(*address),
            Destination::Label(name) => self
                .labels
                .get(name)
                .ok_or_else(|| Error::lookup(LookupKind::Destination, name.as_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::parse_value;

    /// Guard for tests that continue to a breakpoint.
    const STEP_LIMIT: u64 = 10_000;

    fn assemble(src: &str) -> Machine {
        Machine::new(src).expect("source should assemble")
    }

    fn step_n(machine: &mut Machine, count: usize) {
        for _ in 0..count {
            machine.step().expect("step should succeed");
        }
    }

    #[test]
    fn starts_zeroed() {
        let machine = assemble("%CODE 0,4\nBRA 0\n");
        assert!(machine.registers().all(|(_, value)| value == 0));
        assert!(machine.flags().all(|(_, value)| value == 0));
        assert_eq!(machine.pc(), 0);
    }

    #[test]
    fn data_before_code_layout() {
        let machine = assemble("%DATA 0,1\n%CODE 1,10\nLD GR0, 5I\nADD GR0, 3I\nST GR0, 0\n");
        let data = machine.sections().get("DATA").expect("DATA is declared");
        let code = machine.sections().get("CODE").expect("CODE is declared");
        assert_eq!((data.start, data.length), (0, 1));
        assert_eq!((code.start, code.length), (1, 10));
        assert!(machine.memory()[0].is_empty());
        assert_eq!(machine.memory()[1].to_string(), "LD GR0, 5I");
        assert_eq!(machine.memory()[3].to_string(), "ST GR0, 0");
    }

    #[test]
    fn load_add_store() {
        let mut machine =
            assemble("%CODE 0,10\nLD GR0, 5I\nADD GR0, 3I\nST GR0, DATA\n%DATA 10,1\n");
        step_n(&mut machine, 3);

        let stored = machine.memory()[10].to_string();
        assert_eq!(parse_value(&stored), Ok(8));
        assert_eq!(machine.memory()[0].to_string(), "LD GR0, 5I");
        assert_eq!(machine.register(Register::Gr0), 8);
        assert_eq!(machine.flag(Flag::Z), 0);
        assert_eq!(machine.pc(), 3);
    }

    #[test]
    fn store_then_load_round_trips() {
        for value in [0, 1, 42, 0xABCDE, (1 << 24) - 1] {
            let src = format!(
                "%CODE 0,8\nLD GR1, {value}I\nST GR1, 7\nLD GR2, 7\n%SCRATCH 8,1\n"
            );
            let mut machine = assemble(&src);
            step_n(&mut machine, 3);
            assert_eq!(machine.register(Register::Gr2), value);
        }
    }

    #[test]
    fn loads_from_data_section() {
        let src = "\
%CODE 0,4
    LD GR3, TABLE
    MUL GR3, 5
%TABLE 4,2
    0b110
    7
";
        let mut machine = assemble(src);
        step_n(&mut machine, 2);
        assert_eq!(machine.register(Register::Gr3), 42);
    }

    #[test]
    fn alu_sets_zero_flag_only() {
        #[rustfmt::skip]
        let cases: &[(&str, i64, i64, i64)] = &[
            // (op, lhs, rhs, result)
            ("ADD", 0, 0, 0),
            ("ADD", 2, -2, 0),
            ("ADD", 2, 3, 5),
            ("SUB", 3, 3, 0),
            ("SUB", 3, 5, -2),
            ("AND", 0b1010, 0b0101, 0),
            ("AND", 0b1110, 0b0111, 0b0110),
            ("OR", 0, 0, 0),
            ("OR", 0b100, 0b001, 0b101),
            ("MUL", 7, 0, 0),
            ("MUL", -3, 4, -12),
        ];
        for (op, lhs, rhs, result) in cases {
            let src = format!("%CODE 0,4\nLD GR4, {lhs}I\n{op} GR4, {rhs}I\n");
            let mut machine = assemble(&src);
            step_n(&mut machine, 2);
            assert_eq!(machine.register(Register::Gr4), *result, "{op} {lhs} {rhs}");
            let z = u8::from(*result == 0);
            assert_eq!(machine.flag(Flag::Z), z, "Z after {op} {lhs} {rhs}");
            for flag in [Flag::N, Flag::C, Flag::V] {
                assert_eq!(machine.flag(flag), 0, "{flag} after {op} {lhs} {rhs}");
            }
        }
    }

    #[test]
    fn load_does_not_touch_flags() {
        let mut machine = assemble("%CODE 0,4\nADD GR0, 0I\nLD GR0, 9I\n");
        step_n(&mut machine, 2);
        assert_eq!(machine.flag(Flag::Z), 1);
    }

    #[test]
    fn conditional_branches() {
        let src = "\
%CODE 0,16
    ADD GR0, {operand}I
    BNE target
    BEQ target
    BRA 0
target:
    BRA target
";
        // Z == 0: BNE taken
        let mut machine = assemble(&src.replace("{operand}", "1"));
        step_n(&mut machine, 2);
        assert_eq!(machine.pc() as usize, machine.labels().get("target").unwrap());

        // Z == 1: BNE falls through, BEQ taken
        let mut machine = assemble(&src.replace("{operand}", "0"));
        step_n(&mut machine, 2);
        assert_eq!(machine.pc(), 2);
        machine.step().unwrap();
        assert_eq!(machine.pc(), 4);

        // Z == 0: BEQ falls through
        let mut machine = assemble(&src.replace("{operand}", "1"));
        step_n(&mut machine, 1);
        machine.registers[Register::Pc as usize] = 2;
        machine.step().unwrap();
        assert_eq!(machine.pc(), 3);
    }

    #[test]
    fn branch_to_decimal_address() {
        let mut machine = assemble("%CODE 0,8\nBRA 5\n");
        machine.step().unwrap();
        assert_eq!(machine.pc(), 5);
    }

    #[test]
    fn load_into_pc_jumps() {
        let mut machine = assemble("%CODE 0,8\nLD PC, 6I\n");
        machine.step().unwrap();
        assert_eq!(machine.pc(), 6);
    }

    #[test]
    fn unknown_destination_changes_nothing() {
        let mut machine = assemble("%CODE 0,4\nLD GR0, 1I\nBRA nowhere\n");
        machine.step().unwrap();
        let before = machine.clone();

        let error = machine.step().unwrap_err();
        assert_eq!(error, Error::lookup(LookupKind::Destination, "nowhere"));
        assert_eq!(machine.pc(), 1);
        assert_eq!(machine.registers, before.registers);
        assert_eq!(machine.flags, before.flags);
        assert_eq!(machine.memory, before.memory);
    }

    #[test]
    fn jsr_is_not_implemented() {
        let mut machine = assemble("%CODE 0,4\nJSR sub\nsub:\nBRA sub\n");
        assert!(matches!(
            machine.step(),
            Err(Error::UnsupportedInstruction { .. })
        ));
        assert_eq!(machine.pc(), 0);

        let mut machine = assemble("%CODE 0,4\nJSR missing\n");
        assert!(matches!(machine.step(), Err(Error::Lookup { .. })));
    }

    #[test]
    fn executing_non_instructions_fails() {
        let mut machine = assemble("%CODE 0,4\nBRA 3\n0b1\n");
        machine.step().unwrap();
        assert!(matches!(
            machine.step(),
            Err(Error::UnsupportedInstruction { .. })
        ));

        let mut machine = assemble("%CODE 0,4\nBRA 1\n0b1\n");
        machine.step().unwrap();
        assert!(matches!(
            machine.step(),
            Err(Error::UnsupportedInstruction { .. })
        ));
    }

    #[test]
    fn reading_uninitialized_memory_fails() {
        let mut machine = assemble("%CODE 0,4\nLD GR0, 100\n");
        assert!(matches!(machine.step(), Err(Error::Parse { .. })));
        assert_eq!(machine.pc(), 0);
    }

    #[test]
    fn pc_out_of_memory() {
        let mut machine = assemble("%CODE 0,4\nLD PC, 5000I\n");
        machine.step().unwrap();
        assert_eq!(machine.step(), Err(Error::Bounds { address: 5000 }));
    }

    #[test]
    fn continue_stops_before_breakpoint() {
        let src = "\
%CODE 0,16
    LD GR0, 0I
    ADD GR0, 1I
    ADD GR0, 1I
    ADD GR0, 1I
    ADD GR0, 1I
    ADD GR0, 1I
    ADD GR0, 1I
    ADD GR0, 100I ;b
    BRA 0
";
        let mut machine = assemble(src);
        assert!(machine.breakpoints().contains(7));
        assert_eq!(machine.continue_for(STEP_LIMIT), Ok(Stop::Breakpoint(7)));
        assert_eq!(machine.pc(), 7);
        assert_eq!(machine.register(Register::Gr0), 6);

        // Continuing again passes the current breakpoint
        assert_eq!(machine.continue_for(STEP_LIMIT), Ok(Stop::Breakpoint(7)));
        assert_eq!(machine.register(Register::Gr0), 6);
    }

    #[test]
    fn continue_to_breakpoint_loops() {
        let src = "\
%CODE 0,8
loop:
    ADD GR1, 1I
    BRA loop ;b
";
        let mut machine = assemble(src);
        assert_eq!(machine.continue_to_breakpoint(), Ok(1));
        assert_eq!(machine.continue_to_breakpoint(), Ok(1));
        assert_eq!(machine.register(Register::Gr1), 2);
    }

    #[test]
    fn continue_gives_up_at_step_limit() {
        let mut machine = assemble("%CODE 0,2\nloop:\nBRA loop\n");
        assert_eq!(machine.continue_for(50), Ok(Stop::StepLimit));
        assert_eq!(machine.pc(), 0);
    }

    #[test]
    fn continue_surfaces_errors() {
        let mut machine = assemble("%CODE 0,4\nLD GR0, 1I\nADD GR0, 1I\n");
        assert!(matches!(
            machine.continue_for(STEP_LIMIT),
            Err(Error::UnsupportedInstruction { .. })
        ));
        assert_eq!(machine.pc(), 2);
        assert_eq!(machine.register(Register::Gr0), 2);
    }

    #[test]
    fn nearest_lines_clip_at_memory_edges() {
        let machine = assemble("%CODE 0,4\nLD GR0, 1I\nBRA 0 ;b\n");
        let lines: Vec<_> = machine.nearest_lines(0, 2).collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], (-2, None));
        assert_eq!(lines[2], (0, Some(&Cell::Instruction("LD GR0, 1I".into()))));
        assert_eq!(lines[3].1.map(|cell| cell.to_string()), Some("BRA 0 ;b".into()));
        assert_eq!(lines[4], (2, Some(&Cell::Empty)));

        let last = machine.nearest_lines(4095, 1).last();
        assert_eq!(last, Some((4096, None)));
    }

    #[test]
    fn nearest_lines_at_integer_limits() {
        let machine = assemble("%CODE 0,4\nBRA 0\n");
        let high: Vec<_> = machine.nearest_lines(i64::MAX, 4).collect();
        assert_eq!(high.len(), 5);
        assert!(high.iter().all(|(_, cell)| cell.is_none()));
        assert_eq!(high.last(), Some(&(i64::MAX, None)));

        let low: Vec<_> = machine.nearest_lines(i64::MIN, 4).collect();
        assert_eq!(low.len(), 5);
        assert_eq!(low.first(), Some(&(i64::MIN, None)));
    }

    #[test]
    fn pc_can_hold_any_integer() {
        let mut machine = assemble("%CODE 0,4\nLD PC, 9223372036854775807I\n");
        machine.step().unwrap();
        assert_eq!(machine.pc(), i64::MAX);
        assert_eq!(machine.nearest_lines(machine.pc(), 4).count(), 5);
        assert!(matches!(machine.step(), Err(Error::Bounds { .. })));
    }
}
