//! Program module, functions, blocks, and instructions.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An SSA value. Function parameters are `0..params`; instruction results
/// follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Value(pub u32);

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Symbol visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Linkage {
    /// Visible outside the module; kept alive by global dead-code elimination.
    #[default]
    External,
    /// Private to the module.
    Internal,
}

/// Instruction payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum InstKind {
    /// Materialize an integer constant.
    Const { value: i64 },
    /// Apply a named machine-level operation (e.g., "add", "ldw").
    Op { opcode: String, args: Vec<Value> },
    /// Call a function by symbol name.
    Call { callee: String, args: Vec<Value> },
    /// Reserve `size` bytes in the stack frame; yields the slot address.
    Alloca { size: u32 },
}

/// One instruction, optionally defining a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub kind: InstKind,
}

impl Instruction {
    /// Values read by this instruction.
    pub fn uses(&self) -> Vec<Value> {
        match &self.kind {
            InstKind::Op { args, .. } | InstKind::Call { args, .. } => args.clone(),
            InstKind::Const { .. } | InstKind::Alloca { .. } => Vec::new(),
        }
    }

    /// Whether removing this instruction could change program behavior
    /// even when its result is unused.
    pub fn has_side_effects(&self) -> bool {
        match &self.kind {
            InstKind::Call { .. } => true,
            InstKind::Op { opcode, .. } => opcode.starts_with("st"),
            InstKind::Const { .. } | InstKind::Alloca { .. } => false,
        }
    }
}

/// Block terminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Terminator {
    Ret {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },
    Jump {
        target: String,
    },
    Branch {
        cond: Value,
        then_block: String,
        else_block: String,
    },
    Unreachable,
}

impl Terminator {
    /// Labels of successor blocks.
    pub fn successors(&self) -> Vec<&str> {
        match self {
            Terminator::Jump { target } => vec![target.as_str()],
            Terminator::Branch {
                then_block,
                else_block,
                ..
            } => vec![then_block.as_str(), else_block.as_str()],
            Terminator::Ret { .. } | Terminator::Unreachable => Vec::new(),
        }
    }

    /// Values read by the terminator.
    pub fn uses(&self) -> Vec<Value> {
        match self {
            Terminator::Ret { value: Some(v) } => vec![*v],
            Terminator::Branch { cond, .. } => vec![*cond],
            _ => Vec::new(),
        }
    }
}

/// A labelled straight-line sequence of instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub label: String,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    pub terminator: Terminator,
}

/// A function definition, or a declaration when it has no blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    #[serde(default)]
    pub linkage: Linkage,
    #[serde(default)]
    pub params: u32,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Function {
    /// A declaration of an externally defined function.
    pub fn declaration(name: impl Into<String>, params: u32) -> Self {
        Self {
            name: name.into(),
            linkage: Linkage::External,
            params,
            blocks: Vec::new(),
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The entry block (first block), if defined.
    pub fn entry_block(&self) -> Option<&Block> {
        self.blocks.first()
    }

    pub fn block(&self, label: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.label == label)
    }

    /// Names of every function this function calls.
    pub fn callees(&self) -> BTreeSet<&str> {
        self.blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .filter_map(|inst| match &inst.kind {
                InstKind::Call { callee, .. } => Some(callee.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Number of instructions across all blocks (terminators excluded).
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.instructions.len()).sum()
    }
}

fn default_entry() -> String {
    "main".to_string()
}

/// A compilation unit: function definitions and declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramModule {
    pub name: String,
    /// Symbol of the program entry point.
    #[serde(default = "default_entry")]
    pub entry: String,
    #[serde(default)]
    pub functions: Vec<Function>,
}

impl ProgramModule {
    /// Create an empty module with the default entry symbol.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: default_entry(),
            functions: Vec::new(),
        }
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    /// Functions that have a body.
    pub fn defined_functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(|f| !f.is_declaration())
    }

    /// Names of functions that are declared but not defined here.
    pub fn undefined_symbols(&self) -> BTreeSet<String> {
        self.functions
            .iter()
            .filter(|f| f.is_declaration())
            .map(|f| f.name.clone())
            .collect()
    }

    /// Add a declaration unless the symbol already exists.
    pub fn declare(&mut self, name: &str, params: u32) {
        if self.function(name).is_none() {
            self.functions.push(Function::declaration(name, params));
        }
    }

    /// Check structural consistency: unique symbols and labels, branch
    /// targets exist, values are defined before use within the function,
    /// and every called symbol is at least declared.
    pub fn verify(&self) -> Result<(), String> {
        let mut names = BTreeSet::new();
        for func in &self.functions {
            if !names.insert(func.name.as_str()) {
                return Err(format!("duplicate function '{}'", func.name));
            }
        }

        for func in self.defined_functions() {
            let mut labels = BTreeSet::new();
            for block in &func.blocks {
                if !labels.insert(block.label.as_str()) {
                    return Err(format!(
                        "duplicate block '{}' in function '{}'",
                        block.label, func.name
                    ));
                }
            }

            let mut defined: BTreeSet<Value> = (0..func.params).map(Value).collect();
            for block in &func.blocks {
                for inst in &block.instructions {
                    if let Some(result) = inst.result {
                        if !defined.insert(result) {
                            return Err(format!(
                                "value {result} defined twice in function '{}'",
                                func.name
                            ));
                        }
                    }
                }
            }

            for block in &func.blocks {
                let uses = block
                    .instructions
                    .iter()
                    .flat_map(|i| i.uses())
                    .chain(block.terminator.uses());
                for used in uses {
                    if !defined.contains(&used) {
                        return Err(format!(
                            "use of undefined value {used} in function '{}'",
                            func.name
                        ));
                    }
                }
                for succ in block.terminator.successors() {
                    if !labels.contains(succ) {
                        return Err(format!(
                            "block '{}' in function '{}' branches to unknown block '{succ}'",
                            block.label, func.name
                        ));
                    }
                }
            }

            for callee in func.callees() {
                if !names.contains(callee) {
                    return Err(format!(
                        "function '{}' calls undeclared symbol '{callee}'",
                        func.name
                    ));
                }
            }
        }
        Ok(())
    }
}
