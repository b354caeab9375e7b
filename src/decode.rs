use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};
use crate::memory::Memory;
use crate::source::strip_comment;
use crate::symbol::Register;
use crate::value::parse_value;

lazy_static! {
    /// Operands are separated by commas and/or whitespace.
    static ref SEPARATOR: Regex = Regex::new(r"\s*,\s*|\s+").unwrap();
}

/// Suffix selecting immediate address mode, on the mnemonic or on the operand.
const IMMEDIATE_SUFFIX: char = 'I';

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mnemonic {
    Bra,
    Bne,
    Beq,
    Jsr,
    Ld,
    St,
    Add,
    Sub,
    And,
    Or,
    Mul,
}

impl Mnemonic {
    fn from_name(name: &str) -> Option<Self> {
        let mnemonic = match name {
            "BRA" => Mnemonic::Bra,
            "BNE" => Mnemonic::Bne,
            "BEQ" => Mnemonic::Beq,
            "JSR" => Mnemonic::Jsr,
            "LD" => Mnemonic::Ld,
            "ST" => Mnemonic::St,
            "ADD" => Mnemonic::Add,
            "SUB" => Mnemonic::Sub,
            "AND" => Mnemonic::And,
            "OR" => Mnemonic::Or,
            "MUL" => Mnemonic::Mul,
            _ => return None,
        };
        Some(mnemonic)
    }

    pub fn name(self) -> &'static str {
        match self {
            Mnemonic::Bra => "BRA",
            Mnemonic::Bne => "BNE",
            Mnemonic::Beq => "BEQ",
            Mnemonic::Jsr => "JSR",
            Mnemonic::Ld => "LD",
            Mnemonic::St => "ST",
            Mnemonic::Add => "ADD",
            Mnemonic::Sub => "SUB",
            Mnemonic::And => "AND",
            Mnemonic::Or => "OR",
            Mnemonic::Mul => "MUL",
        }
    }

    fn is_branch(self) -> bool {
        matches!(
            self,
            Mnemonic::Bra | Mnemonic::Bne | Mnemonic::Beq | Mnemonic::Jsr
        )
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Whether an operand names a memory address or is the value itself.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum AddressMode {
    #[default]
    Address,
    Immediate,
}

/// Resolved operand of a load, store or ALU instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operand {
    /// Memory address, checked to be in bounds.
    Address(usize),
    Immediate(i64),
}

/// Branch target, resolved against the label table at execution time.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Destination {
    Address(i64),
    Label(String),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BranchKind {
    /// Always
    Bra,
    /// Z == 0
    Bne,
    /// Z == 1
    Beq,
    /// Jump to subroutine. Not implemented.
    Jsr,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AluOp {
    Add,
    Sub,
    And,
    Or,
    Mul,
}

impl AluOp {
    /// Arithmetic wraps on the full register width.
    pub fn apply(self, lhs: i64, rhs: i64) -> i64 {
        match self {
            AluOp::Add => lhs.wrapping_add(rhs),
            AluOp::Sub => lhs.wrapping_sub(rhs),
            AluOp::And => lhs & rhs,
            AluOp::Or => lhs | rhs,
            AluOp::Mul => lhs.wrapping_mul(rhs),
        }
    }
}

/// Decoded form of an instruction line.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Instruction {
    Branch {
        kind: BranchKind,
        destination: Destination,
    },
    Load {
        register: Register,
        operand: Operand,
    },
    /// The address mode of a store is ignored; the operand is always where to write.
    Store { register: Register, address: usize },
    Alu {
        op: AluOp,
        register: Register,
        operand: Operand,
    },
}

/// Split the operation token into mnemonic and address mode.
///
/// `LDI` is read as `LD` in immediate mode. Branches take no address mode.
pub fn parse_operation(token: &str) -> Result<(Mnemonic, Option<AddressMode>)> {
    if let Some(mnemonic) = Mnemonic::from_name(token) {
        return Ok((mnemonic, None));
    }
    token
        .strip_suffix(IMMEDIATE_SUFFIX)
        .and_then(Mnemonic::from_name)
        .filter(|mnemonic| !mnemonic.is_branch())
        .map(|mnemonic| (mnemonic, Some(AddressMode::Immediate)))
        .ok_or_else(|| Error::unsupported(format!("unknown mnemonic `{}`", token)))
}

/// Split a numeric operand into its body and an optional address mode suffix.
fn split_address_mode(token: &str) -> Result<(&str, Option<AddressMode>)> {
    let mut chars = token.chars();
    let Some(last) = chars.next_back() else {
        return Ok((token, None));
    };
    let body = chars.as_str();
    // A suffix only counts after a number, so `GR0` or a stray name reports a malformed value
    if !last.is_ascii_alphabetic() || !body.ends_with(|c: char| c.is_ascii_digit()) {
        return Ok((token, None));
    }
    if last == IMMEDIATE_SUFFIX {
        Ok((body, Some(AddressMode::Immediate)))
    } else {
        Err(Error::unsupported(format!(
            "unknown address mode `{}` in operand `{}`",
            last, token
        )))
    }
}

fn parse_operand(token: &str, mnemonic_mode: Option<AddressMode>) -> Result<Operand> {
    let (body, operand_mode) = split_address_mode(token)?;
    let value = parse_value(body)?;
    match mnemonic_mode.or(operand_mode).unwrap_or_default() {
        AddressMode::Address => Ok(Operand::Address(Memory::address(value)?)),
        AddressMode::Immediate => Ok(Operand::Immediate(value)),
    }
}

fn parse_destination(token: &str) -> Result<Destination> {
    if token.starts_with(|c: char| c.is_ascii_digit()) {
        let address = token
            .parse::<i64>()
            .map_err(|_| Error::parse(format!("malformed destination `{}`", token)))?;
        Ok(Destination::Address(address))
    } else {
        Ok(Destination::Label(token.to_string()))
    }
}

fn expect_operands(mnemonic: Mnemonic, operands: &[&str], count: usize) -> Result<()> {
    if operands.len() == count {
        return Ok(());
    }
    Err(Error::parse(format!(
        "`{}` expects {} operand{}, found {}",
        mnemonic,
        count,
        if count == 1 { "" } else { "s" },
        operands.len()
    )))
}

/// Split an instruction line into tokens, ignoring any inline comment.
pub fn tokenize(line: &str) -> Vec<&str> {
    let line = strip_comment(line).trim();
    if line.is_empty() {
        return Vec::new();
    }
    SEPARATOR.split(line).collect()
}

/// Decode one instruction line.
pub fn decode(line: &str) -> Result<Instruction> {
    let tokens = tokenize(line);
    let Some((operation, operands)) = tokens.split_first() else {
        return Err(Error::parse("expected an instruction, found nothing"));
    };
    let (mnemonic, mode) = parse_operation(operation)?;

    let branch = |kind| -> Result<Instruction> {
        expect_operands(mnemonic, operands, 1)?;
        Ok(Instruction::Branch {
            kind,
            destination: parse_destination(operands[0])?,
        })
    };
    let alu = |op| -> Result<Instruction> {
        expect_operands(mnemonic, operands, 2)?;
        Ok(Instruction::Alu {
            op,
            register: operands[0].parse()?,
            operand: parse_operand(operands[1], mode)?,
        })
    };

    match mnemonic {
        Mnemonic::Bra => branch(BranchKind::Bra),
        Mnemonic::Bne => branch(BranchKind::Bne),
        Mnemonic::Beq => branch(BranchKind::Beq),
        Mnemonic::Jsr => branch(BranchKind::Jsr),
        Mnemonic::Ld => {
            expect_operands(mnemonic, operands, 2)?;
            Ok(Instruction::Load {
                register: operands[0].parse()?,
                operand: parse_operand(operands[1], mode)?,
            })
        }
        Mnemonic::St => {
            expect_operands(mnemonic, operands, 2)?;
            let (body, _) = split_address_mode(operands[1])?;
            Ok(Instruction::Store {
                register: operands[0].parse()?,
                address: Memory::address(parse_value(body)?)?,
            })
        }
        Mnemonic::Add => alu(AluOp::Add),
        Mnemonic::Sub => alu(AluOp::Sub),
        Mnemonic::And => alu(AluOp::And),
        Mnemonic::Or => alu(AluOp::Or),
        Mnemonic::Mul => alu(AluOp::Mul),
    }
}
