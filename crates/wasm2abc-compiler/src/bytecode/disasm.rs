//! Opcode-table driven decoder for emitted method bodies.
//!
//! Used by the instruction trace and by tests to check generated sequences
//! without hand-decoding variable-length operands.

use std::fmt;

use wasm2abc_core::{ByteReader, ConstantPool, EncodeError};

use super::{OpCode, Operand};

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub offset: usize,
    pub op: OpCode,
    /// Decoded operand values in layout order. For `lookupswitch` this is the
    /// default displacement, the case count minus one, then every case.
    pub operands: Vec<i64>,
}

impl Instruction {
    /// Byte offset of the first byte after this instruction.
    pub fn end(&self, code: &[u8]) -> usize {
        let mut reader = ByteReader::new(&code[self.offset..]);
        // Re-decoding a successfully decoded instruction cannot fail.
        match decode_one(&mut reader, self.offset) {
            Ok(_) => self.offset + reader.position(),
            Err(_) => code.len(),
        }
    }

    /// Absolute branch targets of this instruction.
    ///
    /// Ordinary branches are relative to the end of the instruction,
    /// `lookupswitch` to its first byte.
    pub fn branch_targets(&self, end: usize) -> Vec<i64> {
        match self.op {
            OpCode::LookupSwitch => {
                let base = self.offset as i64;
                let mut targets = vec![base + self.operands[0]];
                targets.extend(self.operands[2..].iter().map(|d| base + d));
                targets
            }
            op if op.is_branch() => vec![end as i64 + self.operands[0]],
            _ => Vec::new(),
        }
    }

    /// Operands popped and results pushed, resolving operand-dependent
    /// effects through the pool.
    pub fn stack_effect(&self, pool: &ConstantPool) -> (u32, u32) {
        let operand = |i: usize| self.operands.get(i).map_or(0, |&v| v as u32);
        let runtime = |i: usize| {
            pool.multiname(operand(i))
                .map_or(0, |name| name.runtime_operands())
        };
        match self.op {
            OpCode::Call => (2 + operand(0), 1),
            OpCode::Construct => (1 + operand(0), 1),
            OpCode::ConstructSuper => (1 + operand(0), 0),
            OpCode::NewArray => (operand(0), 1),
            OpCode::NewObject => (2 * operand(0), 1),
            OpCode::CallMethod => (1 + operand(1), 1),
            OpCode::CallProperty | OpCode::CallPropLex | OpCode::ConstructProp => {
                (1 + runtime(0) + operand(1), 1)
            }
            OpCode::CallPropVoid => (1 + runtime(0) + operand(1), 0),
            OpCode::GetProperty => (1 + runtime(0), 1),
            OpCode::SetProperty | OpCode::InitProperty => (2 + runtime(0), 0),
            OpCode::FindPropStrict => (runtime(0), 1),
            op => op.stack_effect().unwrap_or((0, 0)),
        }
    }

    /// Render with pool lookups for named operands.
    pub fn render(&self, pool: &ConstantPool) -> String {
        let mut out = format!("{:>5}: {}", self.offset, self.op.name());
        let layout = self.op.operands();
        for (i, &value) in self.operands.iter().enumerate() {
            let kind = layout.get(i).copied().unwrap_or(Operand::S24);
            let rendered = match kind {
                Operand::Multiname => pool.describe_multiname(value as u32),
                Operand::String => format!("{:?}", pool.string(value as u32).unwrap_or("")),
                Operand::Int => pool
                    .int(value as u32)
                    .map_or_else(|| format!("#{value}"), |v| v.to_string()),
                Operand::UInt => pool
                    .uint(value as u32)
                    .map_or_else(|| format!("#{value}"), |v| v.to_string()),
                Operand::Double => pool
                    .double(value as u32)
                    .map_or_else(|| "NaN".to_owned(), |v| v.to_string()),
                _ => value.to_string(),
            };
            out.push(' ');
            out.push_str(&rendered);
        }
        out
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>5}: {}", self.offset, self.op.name())?;
        for value in &self.operands {
            write!(f, " {value}")?;
        }
        Ok(())
    }
}

fn decode_one(reader: &mut ByteReader<'_>, base: usize) -> Result<Instruction, EncodeError> {
    let offset = base + reader.position();
    let byte = reader.read_u8()?;
    let op = OpCode::from_u8(byte).ok_or(EncodeError::UnknownOpcode { byte, offset })?;

    let mut operands = Vec::with_capacity(op.operands().len());
    for operand in op.operands() {
        let value = match operand {
            Operand::U8 if op == OpCode::PushByte => i64::from(reader.read_u8()? as i8),
            Operand::U8 => i64::from(reader.read_u8()?),
            Operand::S24 => i64::from(reader.read_s24()?),
            Operand::U30 if op == OpCode::PushShort => i64::from(reader.read_u30()? as u16 as i16),
            _ => i64::from(reader.read_u30()?),
        };
        operands.push(value);
    }

    if op == OpCode::LookupSwitch {
        let cases = operands[1] + 1;
        for _ in 0..cases {
            operands.push(i64::from(reader.read_s24()?));
        }
    }

    Ok(Instruction {
        offset,
        op,
        operands,
    })
}

/// Decode a whole method body.
pub fn disassemble(code: &[u8]) -> Result<Vec<Instruction>, EncodeError> {
    let mut reader = ByteReader::new(code);
    let mut instructions = Vec::new();
    while !reader.is_at_end() {
        instructions.push(decode_one(&mut reader, 0)?);
    }
    Ok(instructions)
}

/// Highest operand stack depth seen replaying a body in byte order.
///
/// Joins are not modeled: every instruction applies its effect to the depth
/// left by the previous one, clamped at zero.
pub fn stack_peak(code: &[u8], pool: &ConstantPool) -> Result<u32, EncodeError> {
    let mut depth = 0u32;
    let mut peak = 0u32;
    for inst in disassemble(code)? {
        let (pops, pushes) = inst.stack_effect(pool);
        depth = depth.saturating_sub(pops) + pushes;
        peak = peak.max(depth);
    }
    Ok(peak)
}

/// Extract all opcodes from a body, skipping operands.
///
/// Undecodable input yields the opcodes decoded before the failure.
pub fn opcodes(code: &[u8]) -> Vec<OpCode> {
    let mut reader = ByteReader::new(code);
    let mut ops = Vec::new();
    while !reader.is_at_end() {
        match decode_one(&mut reader, 0) {
            Ok(inst) => ops.push(inst.op),
            Err(_) => break,
        }
    }
    ops
}

/// Check that a body contains exactly the given opcode sequence.
///
/// Ignores operand values. Panics with both sequences on mismatch.
#[track_caller]
pub fn assert_opcodes(code: &[u8], expected: &[OpCode]) {
    let actual = opcodes(code);
    assert_eq!(
        actual,
        expected,
        "Bytecode mismatch.\nExpected: {:?}\nActual:   {:?}",
        expected.iter().map(|op| op.name()).collect::<Vec<_>>(),
        actual.iter().map(|op| op.name()).collect::<Vec<_>>(),
    );
}

/// Check that a body contains the given opcodes in order, not necessarily
/// contiguous.
#[track_caller]
pub fn assert_contains_opcodes(code: &[u8], expected: &[OpCode]) {
    let actual = opcodes(code);
    let mut expected_iter = expected.iter().peekable();

    for op in &actual {
        if expected_iter.peek() == Some(&op) {
            expected_iter.next();
        }
    }

    if expected_iter.peek().is_some() {
        let remaining: Vec<_> = expected_iter.map(|op| op.name()).collect();
        panic!(
            "Missing opcodes in sequence.\nExpected to find: {:?}\nActual bytecode:  {:?}",
            remaining,
            actual.iter().map(|op| op.name()).collect::<Vec<_>>(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_mixed_operands() {
        // getlocal1, pushbyte -2, pushshort 300, ifne +0, returnvoid
        let code = [0xd1, 0x24, 0xfe, 0x25, 0xac, 0x02, 0x14, 0, 0, 0, 0x47];
        let insts = disassemble(&code).unwrap();
        assert_eq!(insts.len(), 5);
        assert_eq!(insts[1].operands, vec![-2]);
        assert_eq!(insts[2].operands, vec![300]);
        assert_eq!(insts[3].offset, 6);
        assert_eq!(insts[3].end(&code), 10);
        assert_eq!(insts[3].branch_targets(10), vec![10]);
    }

    #[test]
    fn decodes_lookupswitch_cases() {
        // lookupswitch default +9, 2 cases (+13, +17)
        let code = [0x1b, 9, 0, 0, 1, 13, 0, 0, 17, 0, 0];
        let insts = disassemble(&code).unwrap();
        assert_eq!(insts[0].operands, vec![9, 1, 13, 17]);
        assert_eq!(insts[0].branch_targets(11), vec![9, 13, 17]);
    }

    #[test]
    fn negative_pushshort() {
        let code = [0x25, 0xff, 0xff, 0x03];
        assert_eq!(disassemble(&code).unwrap()[0].operands, vec![-1]);
    }

    #[test]
    fn stack_peak_resolves_variable_effects() {
        use wasm2abc_core::Multiname;

        let mut pool = ConstantPool::new();
        let set = pool.public_ns_set();
        let late = pool.intern_multiname(Multiname::MultinameL { ns_set: set }) as u8;
        // getlocal0, pushbyte 1, pushbyte 2, callproperty late 1, newarray 1, returnvalue
        let code = [0xd0, 0x24, 1, 0x24, 2, 0x46, late, 1, 0x56, 1, 0x48];
        let insts = disassemble(&code).unwrap();
        assert_eq!(insts[3].stack_effect(&pool), (3, 1));
        assert_eq!(insts[4].stack_effect(&pool), (1, 1));
        assert_eq!(stack_peak(&code, &pool).unwrap(), 3);
    }

    #[test]
    fn stack_peak_ignores_joins() {
        // pushbyte 1, jump +2, pushbyte 2, label, returnvalue
        let code = [0x24, 1, 0x10, 2, 0, 0, 0x24, 2, 0x09, 0x48];
        assert_eq!(stack_peak(&code, &ConstantPool::new()).unwrap(), 2);
    }

    #[test]
    fn unknown_opcode_is_an_error() {
        assert_eq!(
            disassemble(&[0x02, 0xff]),
            Err(EncodeError::UnknownOpcode {
                byte: 0xff,
                offset: 1
            })
        );
        assert_eq!(opcodes(&[0x02, 0xff]), vec![OpCode::Nop]);
    }

    #[test]
    fn assert_helpers() {
        let code = [0xd0, 0x30, 0x47];
        assert_opcodes(&code, &[OpCode::GetLocal0, OpCode::PushScope, OpCode::ReturnVoid]);
        assert_contains_opcodes(&code, &[OpCode::GetLocal0, OpCode::ReturnVoid]);
    }

    #[test]
    #[should_panic(expected = "Bytecode mismatch")]
    fn assert_opcodes_failure() {
        assert_opcodes(&[0x47], &[OpCode::ReturnValue]);
    }
}
