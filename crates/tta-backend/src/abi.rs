//! C ABI of generated plugins.
//!
//! A plugin exports one function, [`ENTRY_SYMBOL`], returning a pointer to
//! a static [`RawPluginDescriptor`]. The descriptor and everything it points
//! to must stay valid while the library is loaded; the loader copies it
//! into owned tables immediately.

use std::collections::BTreeMap;
use std::ffi::{c_char, CStr};

use crate::mir::PhysReg;
use crate::plugin::RegisterInfo;
use crate::table::{CallingConvention, TableDrivenPlugin};

/// Symbol name of the plugin entry point, NUL-terminated.
pub const ENTRY_SYMBOL: &[u8] = b"create_tta_backend_plugin\0";

/// Descriptor layout version. Bumped on any layout change.
pub const PLUGIN_ABI_VERSION: u32 = 1;

/// Signature of the entry point.
pub type EntryPoint = unsafe extern "C" fn() -> *const RawPluginDescriptor;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawRegister {
    pub register_file: *const c_char,
    pub index: u32,
    /// Non-zero when the allocator may use the register.
    pub allocatable: u8,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawPattern {
    pub ir_opcode: *const c_char,
    pub machine_opcode: *const c_char,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawPluginDescriptor {
    pub abi_version: u32,
    pub machine_name: *const c_char,
    pub word_bits: u32,
    pub registers: *const RawRegister,
    pub register_count: u32,
    pub patterns: *const RawPattern,
    pub pattern_count: u32,
    pub stack_pointer: u32,
    pub return_value: u32,
    pub arguments: *const u32,
    pub argument_count: u32,
}

unsafe fn string(ptr: *const c_char, what: &str) -> Result<String, String> {
    if ptr.is_null() {
        return Err(format!("null {what}"));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(str::to_string)
        .map_err(|e| format!("{what} is not UTF-8: {e}"))
}

unsafe fn slice<'a, T>(ptr: *const T, len: u32, what: &str) -> Result<&'a [T], String> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(format!("null {what} table with {len} entries"));
    }
    Ok(std::slice::from_raw_parts(ptr, len as usize))
}

/// Copy a descriptor into an owned plugin.
///
/// # Safety
///
/// `desc` must be null or point to a descriptor whose pointers are valid
/// for the advertised lengths and whose strings are NUL-terminated.
pub unsafe fn read_descriptor(desc: *const RawPluginDescriptor) -> Result<TableDrivenPlugin, String> {
    let desc = desc.as_ref().ok_or("entry point returned null")?;
    if desc.abi_version != PLUGIN_ABI_VERSION {
        return Err(format!(
            "plugin ABI version {} does not match expected {PLUGIN_ABI_VERSION}",
            desc.abi_version
        ));
    }

    let machine_name = string(desc.machine_name, "machine name")?;

    let mut registers = Vec::new();
    let mut allocatable = Vec::new();
    for (i, raw) in slice(desc.registers, desc.register_count, "register")?
        .iter()
        .enumerate()
    {
        registers.push(RegisterInfo {
            register_file: string(raw.register_file, "register file name")?,
            index: raw.index,
        });
        if raw.allocatable != 0 {
            allocatable.push(PhysReg(i as u32));
        }
    }

    let mut patterns = BTreeMap::new();
    for raw in slice(desc.patterns, desc.pattern_count, "pattern")? {
        patterns.insert(
            string(raw.ir_opcode, "pattern opcode")?,
            string(raw.machine_opcode, "pattern opcode")?,
        );
    }

    let arguments = slice(desc.arguments, desc.argument_count, "argument")?
        .iter()
        .map(|&r| PhysReg(r))
        .collect();

    TableDrivenPlugin::from_tables(
        machine_name,
        desc.word_bits,
        registers,
        patterns,
        CallingConvention {
            stack_pointer: PhysReg(desc.stack_pointer),
            return_value: PhysReg(desc.return_value),
            arguments,
            allocatable,
        },
    )
    .map_err(|e| e.to_string())
}
