//! Machine-level instruction vocabulary produced by instruction selection.

use std::collections::BTreeMap;
use std::fmt;

use tta_ir::Value;

/// A physical register, indexing the plugin's register table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysReg(pub u32);

/// Operand of a machine instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineOperand {
    /// Virtual register awaiting allocation.
    VReg(u32),
    /// Physical register.
    Phys(PhysReg),
    /// Immediate value.
    Imm(i64),
    /// Basic block label within the same function.
    Label(String),
    /// Global symbol (call target).
    Symbol(String),
    /// Stack frame object, resolved to an offset by prolog/epilog insertion.
    Frame(u32),
    /// The control unit's return-address port.
    ReturnAddress,
}

impl MachineOperand {
    pub fn as_vreg(&self) -> Option<u32> {
        match self {
            MachineOperand::VReg(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for MachineOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineOperand::VReg(v) => write!(f, "%v{v}"),
            MachineOperand::Phys(r) => write!(f, "$r{}", r.0),
            MachineOperand::Imm(i) => write!(f, "{i}"),
            MachineOperand::Label(l) => write!(f, ".{l}"),
            MachineOperand::Symbol(s) => write!(f, "@{s}"),
            MachineOperand::Frame(i) => write!(f, "frame#{i}"),
            MachineOperand::ReturnAddress => write!(f, "$ra"),
        }
    }
}

/// What an instruction does beyond computing its definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstRole {
    /// Pure computation or move.
    Plain,
    /// Memory write.
    Store,
    Call,
    /// Unconditional jump to a label.
    Jump,
    /// Conditional jump to a label.
    Branch,
    Return,
}

impl InstRole {
    /// Whether the instruction must be kept even when its results are dead.
    pub fn has_side_effects(self) -> bool {
        !matches!(self, InstRole::Plain)
    }

    pub fn is_control_transfer(self) -> bool {
        matches!(
            self,
            InstRole::Call | InstRole::Jump | InstRole::Branch | InstRole::Return
        )
    }
}

/// A target instruction before scheduling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineInst {
    pub opcode: String,
    pub defs: Vec<MachineOperand>,
    pub uses: Vec<MachineOperand>,
    pub role: InstRole,
}

impl MachineInst {
    pub fn new(opcode: &str, defs: Vec<MachineOperand>, uses: Vec<MachineOperand>) -> Self {
        Self {
            opcode: opcode.to_string(),
            defs,
            uses,
            role: InstRole::Plain,
        }
    }

    pub fn with_role(mut self, role: InstRole) -> Self {
        self.role = role;
        self
    }

    /// Register move `dst <- src`.
    pub fn mov(dst: MachineOperand, src: MachineOperand) -> Self {
        Self::new("mov", vec![dst], vec![src])
    }

    /// Every operand, definitions first.
    pub fn operands(&self) -> impl Iterator<Item = &MachineOperand> {
        self.defs.iter().chain(self.uses.iter())
    }

    pub fn operands_mut(&mut self) -> impl Iterator<Item = &mut MachineOperand> {
        self.defs.iter_mut().chain(self.uses.iter_mut())
    }
}

impl fmt::Display for MachineInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        let operands: Vec<String> = self.operands().map(|o| o.to_string()).collect();
        if !operands.is_empty() {
            write!(f, " {}", operands.join(", "))?;
        }
        Ok(())
    }
}

/// Per-function state shared between the selector and the plugin:
/// value-to-virtual-register mapping and stack frame objects.
#[derive(Debug, Default)]
pub struct SelectionContext {
    values: BTreeMap<Value, u32>,
    next_vreg: u32,
    frame_objects: Vec<u32>,
}

impl SelectionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual register holding an IR value, created on first use.
    pub fn vreg_for(&mut self, value: Value) -> MachineOperand {
        if let Some(v) = self.values.get(&value) {
            return MachineOperand::VReg(*v);
        }
        let v = self.next_vreg;
        self.next_vreg += 1;
        self.values.insert(value, v);
        MachineOperand::VReg(v)
    }

    /// A fresh temporary virtual register.
    pub fn fresh_vreg(&mut self) -> MachineOperand {
        let v = self.next_vreg;
        self.next_vreg += 1;
        MachineOperand::VReg(v)
    }

    /// Reserve a stack frame object of `size` bytes.
    pub fn frame_object(&mut self, size: u32) -> MachineOperand {
        self.frame_objects.push(size);
        MachineOperand::Frame(self.frame_objects.len() as u32 - 1)
    }

    pub fn vreg_count(&self) -> u32 {
        self.next_vreg
    }

    /// Sizes of the reserved frame objects, by index.
    pub fn into_frame_objects(self) -> Vec<u32> {
        self.frame_objects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vreg_mapping_is_stable() {
        let mut ctx = SelectionContext::new();
        let a = ctx.vreg_for(Value(5));
        let t = ctx.fresh_vreg();
        let b = ctx.vreg_for(Value(5));
        assert_eq!(a, b);
        assert_ne!(a, t);
        assert_eq!(ctx.vreg_count(), 2);
    }

    #[test]
    fn frame_objects_are_indexed() {
        let mut ctx = SelectionContext::new();
        assert_eq!(ctx.frame_object(8), MachineOperand::Frame(0));
        assert_eq!(ctx.frame_object(4), MachineOperand::Frame(1));
        assert_eq!(ctx.into_frame_objects(), vec![8, 4]);
    }

    #[test]
    fn display_instruction() {
        let inst = MachineInst::new(
            "add",
            vec![MachineOperand::VReg(0)],
            vec![MachineOperand::Phys(PhysReg(1)), MachineOperand::Imm(4)],
        );
        assert_eq!(inst.to_string(), "add %v0, $r1, 4");
        assert!(!inst.role.has_side_effects());
    }
}
