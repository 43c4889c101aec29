//! Programmatic construction of IR functions.
//!
//! # Example
//!
//! ```rust
//! use tta_ir::builder::FunctionBuilder;
//!
//! let mut func = FunctionBuilder::new("square", 1);
//! let mut entry = func.block("entry");
//! let x = func.param(0);
//! let sq = entry.op("mul", &[x, x]);
//! entry.ret(Some(sq));
//! func.finish_block(entry);
//!
//! let square = func.build();
//! assert_eq!(square.instruction_count(), 1);
//! ```

use std::cell::Cell;
use std::rc::Rc;

use crate::module::{Block, Function, InstKind, Instruction, Linkage, Terminator, Value};

/// Builds one function, handing out fresh values to its blocks.
pub struct FunctionBuilder {
    name: String,
    params: u32,
    linkage: Linkage,
    next_value: Rc<Cell<u32>>,
    blocks: Vec<Block>,
}

impl FunctionBuilder {
    pub fn new(name: &str, params: u32) -> Self {
        Self {
            name: name.to_string(),
            params,
            linkage: Linkage::External,
            next_value: Rc::new(Cell::new(params)),
            blocks: Vec::new(),
        }
    }

    /// Mark the function as internal to its module.
    pub fn internal(mut self) -> Self {
        self.linkage = Linkage::Internal;
        self
    }

    /// The value of parameter `index`.
    pub fn param(&self, index: u32) -> Value {
        assert!(index < self.params, "parameter index out of range");
        Value(index)
    }

    /// Start a new block. Blocks are appended in the order they are finished.
    pub fn block(&self, label: &str) -> BlockBuilder {
        BlockBuilder {
            label: label.to_string(),
            instructions: Vec::new(),
            terminator: None,
            next_value: Rc::clone(&self.next_value),
        }
    }

    /// Append a finished block.
    pub fn finish_block(&mut self, block: BlockBuilder) {
        self.blocks.push(Block {
            label: block.label,
            instructions: block.instructions,
            terminator: block.terminator.unwrap_or(Terminator::Unreachable),
        });
    }

    pub fn build(self) -> Function {
        Function {
            name: self.name,
            linkage: self.linkage,
            params: self.params,
            blocks: self.blocks,
        }
    }
}

/// Builds one block of a [`FunctionBuilder`].
pub struct BlockBuilder {
    label: String,
    instructions: Vec<Instruction>,
    terminator: Option<Terminator>,
    next_value: Rc<Cell<u32>>,
}

impl BlockBuilder {
    fn fresh(&self) -> Value {
        let v = self.next_value.get();
        self.next_value.set(v + 1);
        Value(v)
    }

    fn push(&mut self, kind: InstKind) -> Value {
        let result = self.fresh();
        self.instructions.push(Instruction {
            result: Some(result),
            kind,
        });
        result
    }

    pub fn constant(&mut self, value: i64) -> Value {
        self.push(InstKind::Const { value })
    }

    pub fn op(&mut self, opcode: &str, args: &[Value]) -> Value {
        self.push(InstKind::Op {
            opcode: opcode.to_string(),
            args: args.to_vec(),
        })
    }

    /// An operation without a result (e.g., a store).
    pub fn effect(&mut self, opcode: &str, args: &[Value]) {
        self.instructions.push(Instruction {
            result: None,
            kind: InstKind::Op {
                opcode: opcode.to_string(),
                args: args.to_vec(),
            },
        });
    }

    pub fn call(&mut self, callee: &str, args: &[Value]) -> Value {
        self.push(InstKind::Call {
            callee: callee.to_string(),
            args: args.to_vec(),
        })
    }

    pub fn alloca(&mut self, size: u32) -> Value {
        self.push(InstKind::Alloca { size })
    }

    pub fn ret(&mut self, value: Option<Value>) {
        self.terminator = Some(Terminator::Ret { value });
    }

    pub fn jump(&mut self, target: &str) {
        self.terminator = Some(Terminator::Jump {
            target: target.to_string(),
        });
    }

    pub fn branch(&mut self, cond: Value, then_block: &str, else_block: &str) {
        self.terminator = Some(Terminator::Branch {
            cond,
            then_block: then_block.to_string(),
            else_block: else_block.to_string(),
        });
    }
}
