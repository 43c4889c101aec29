//! Structural validation of machine descriptions.
//!
//! Code generation assumes a handful of structural facts about the target
//! (a control unit exists, it has program-counter and return-address ports,
//! every operand is transported through some port). [`validate`] checks a
//! caller-selected subset of those facts without touching the machine.

use std::collections::BTreeSet;
use std::fmt;

use crate::machine::{MachineDescription, OperationBinding, Port};

/// A structural check that a machine description can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    /// The machine has no global control unit.
    GcuMissing,
    /// The control unit has no (or an unknown) instruction address space.
    GcuAddressSpaceMissing,
    /// An operand of some operation is not bound to any port.
    UsedIoNotBound,
    /// The control unit lacks a program-counter port.
    PcPortMissing,
    /// The control unit lacks a return-address port.
    RaPortMissing,
    /// Operand 1 of `jump` and `call` are bound to different ports.
    DifferentPortForJumpAndCall,
    /// Program-counter and return-address ports differ in width.
    PcAndRaPortsUnequalWidth,
    /// A function unit implements no operations.
    FuNoValidOperations,
}

impl ErrorCode {
    /// The checks a machine must pass before it is handed to the compiler.
    pub const REQUIRED: [ErrorCode; 5] = [
        ErrorCode::GcuMissing,
        ErrorCode::GcuAddressSpaceMissing,
        ErrorCode::UsedIoNotBound,
        ErrorCode::PcPortMissing,
        ErrorCode::RaPortMissing,
    ];

    /// Every known check.
    pub const ALL: [ErrorCode; 8] = [
        ErrorCode::GcuMissing,
        ErrorCode::GcuAddressSpaceMissing,
        ErrorCode::UsedIoNotBound,
        ErrorCode::PcPortMissing,
        ErrorCode::RaPortMissing,
        ErrorCode::DifferentPortForJumpAndCall,
        ErrorCode::PcAndRaPortsUnequalWidth,
        ErrorCode::FuNoValidOperations,
    ];

    /// The required subset as a set, ready to pass to [`validate`].
    pub fn required() -> BTreeSet<ErrorCode> {
        Self::REQUIRED.into_iter().collect()
    }

    /// Short, stable identifier (used in CLI output).
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::GcuMissing => "GCU_MISSING",
            ErrorCode::GcuAddressSpaceMissing => "GCU_AS_MISSING",
            ErrorCode::UsedIoNotBound => "USED_IO_NOT_BOUND",
            ErrorCode::PcPortMissing => "PC_PORT_MISSING",
            ErrorCode::RaPortMissing => "RA_PORT_MISSING",
            ErrorCode::DifferentPortForJumpAndCall => "DIFFERENT_PORT_FOR_JUMP_AND_CALL",
            ErrorCode::PcAndRaPortsUnequalWidth => "PC_AND_RA_PORTS_HAVE_UNEQUAL_WIDTH",
            ErrorCode::FuNoValidOperations => "FU_NO_VALID_OPERATIONS",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of validating a machine: violated checks in check order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    errors: Vec<(ErrorCode, String)>,
}

impl ValidationResult {
    /// Whether the machine passed every requested check.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// The `(code, message)` pairs in the order they were found.
    pub fn errors(&self) -> &[(ErrorCode, String)] {
        &self.errors
    }

    /// Distinct violated codes.
    pub fn codes(&self) -> BTreeSet<ErrorCode> {
        self.errors.iter().map(|(code, _)| *code).collect()
    }

    /// Convert into an error carrying every violation, or `Ok` if clean.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                errors: self.errors,
            })
        }
    }

    fn push(&mut self, code: ErrorCode, message: String) {
        self.errors.push((code, message));
    }
}

/// A machine failed one or more required structural checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("target machine failed validation:\n{}", self.message())]
pub struct ValidationError {
    pub errors: Vec<(ErrorCode, String)>,
}

impl ValidationError {
    /// All messages concatenated, one per line.
    pub fn message(&self) -> String {
        self.errors
            .iter()
            .map(|(_, msg)| msg.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Run the requested checks against a machine.
///
/// Checks that inspect the control unit report nothing when the unit is
/// absent; that case is covered by [`ErrorCode::GcuMissing`] alone.
pub fn validate(machine: &MachineDescription, checks: &BTreeSet<ErrorCode>) -> ValidationResult {
    let mut result = ValidationResult::default();
    for code in checks {
        match code {
            ErrorCode::GcuMissing => check_gcu_present(machine, &mut result),
            ErrorCode::GcuAddressSpaceMissing => check_gcu_address_space(machine, &mut result),
            ErrorCode::UsedIoNotBound => check_used_io_bound(machine, &mut result),
            ErrorCode::PcPortMissing => check_pc_port(machine, &mut result),
            ErrorCode::RaPortMissing => check_ra_port(machine, &mut result),
            ErrorCode::DifferentPortForJumpAndCall => check_jump_call_port(machine, &mut result),
            ErrorCode::PcAndRaPortsUnequalWidth => check_pc_ra_width(machine, &mut result),
            ErrorCode::FuNoValidOperations => check_fu_operations(machine, &mut result),
        }
    }
    result
}

fn check_gcu_present(machine: &MachineDescription, result: &mut ValidationResult) {
    if machine.control_unit.is_none() {
        result.push(
            ErrorCode::GcuMissing,
            format!("Machine '{}' has no global control unit.", machine.name),
        );
    }
}

fn check_gcu_address_space(machine: &MachineDescription, result: &mut ValidationResult) {
    let Some(gcu) = &machine.control_unit else {
        return;
    };
    match &gcu.address_space {
        None => result.push(
            ErrorCode::GcuAddressSpaceMissing,
            format!("Control unit '{}' is not bound to an address space.", gcu.name),
        ),
        Some(name) if machine.address_space(name).is_none() => result.push(
            ErrorCode::GcuAddressSpaceMissing,
            format!(
                "Control unit '{}' refers to unknown address space '{name}'.",
                gcu.name
            ),
        ),
        Some(_) => {}
    }
}

fn check_used_io_bound(machine: &MachineDescription, result: &mut ValidationResult) {
    for fu in &machine.function_units {
        check_unit_bindings(&fu.name, &fu.ports, &fu.operations, result);
    }
    if let Some(gcu) = &machine.control_unit {
        check_unit_bindings(&gcu.name, &gcu.ports, &gcu.operations, result);
    }
}

/// Unbound operands reported individually per operation; the rest are
/// summarized in one message.
const REPORTED_OPERANDS: usize = 16;

fn check_unit_bindings(
    unit: &str,
    ports: &[Port],
    operations: &[OperationBinding],
    result: &mut ValidationResult,
) {
    for op in operations {
        let count = op.operand_count();
        let bound: BTreeSet<u32> = op
            .bindings
            .iter()
            .filter(|b| (1..=count).contains(&b.io) && ports.iter().any(|p| p.name == b.port))
            .map(|b| b.io)
            .collect();

        for io in (1..=count).filter(|io| !bound.contains(io)).take(REPORTED_OPERANDS) {
            result.push(
                ErrorCode::UsedIoNotBound,
                format!(
                    "Operand {io} of operation '{}' in unit '{unit}' is not bound to any port.",
                    op.name
                ),
            );
        }

        let unbound = u64::from(count) - bound.len() as u64;
        if unbound > REPORTED_OPERANDS as u64 {
            result.push(
                ErrorCode::UsedIoNotBound,
                format!(
                    "{} more operands of operation '{}' in unit '{unit}' are not bound to any port.",
                    unbound - REPORTED_OPERANDS as u64,
                    op.name
                ),
            );
        }
    }
}

fn check_pc_port(machine: &MachineDescription, result: &mut ValidationResult) {
    let Some(gcu) = &machine.control_unit else {
        return;
    };
    let present = gcu
        .program_counter_port
        .as_deref()
        .is_some_and(|name| gcu.port(name).is_some());
    if !present {
        result.push(
            ErrorCode::PcPortMissing,
            format!("Control unit '{}' has no program counter port.", gcu.name),
        );
    }
}

fn check_ra_port(machine: &MachineDescription, result: &mut ValidationResult) {
    let Some(gcu) = &machine.control_unit else {
        return;
    };
    let present = gcu
        .return_address_port
        .as_deref()
        .is_some_and(|name| gcu.port(name).is_some());
    if !present {
        result.push(
            ErrorCode::RaPortMissing,
            format!("Control unit '{}' has no return address port.", gcu.name),
        );
    }
}

fn check_jump_call_port(machine: &MachineDescription, result: &mut ValidationResult) {
    let Some(gcu) = &machine.control_unit else {
        return;
    };
    let jump_port = gcu.operation("jump").and_then(|op| op.port_for(1));
    let call_port = gcu.operation("call").and_then(|op| op.port_for(1));
    if let (Some(jump), Some(call)) = (jump_port, call_port) {
        if jump != call {
            result.push(
                ErrorCode::DifferentPortForJumpAndCall,
                format!(
                    "Operand 1 of 'jump' ({jump}) and 'call' ({call}) in control unit '{}' \
                     must be bound to the same port.",
                    gcu.name
                ),
            );
        }
    }
}

fn check_pc_ra_width(machine: &MachineDescription, result: &mut ValidationResult) {
    let Some(gcu) = &machine.control_unit else {
        return;
    };
    let pc = gcu.program_counter_port.as_deref().and_then(|n| gcu.port(n));
    let ra = gcu.return_address_port.as_deref().and_then(|n| gcu.port(n));
    if let (Some(pc), Some(ra)) = (pc, ra) {
        if pc.width_bits != ra.width_bits {
            result.push(
                ErrorCode::PcAndRaPortsUnequalWidth,
                format!(
                    "Program counter port ({} bits) and return address port ({} bits) \
                     of control unit '{}' differ in width.",
                    pc.width_bits, ra.width_bits, gcu.name
                ),
            );
        }
    }
}

fn check_fu_operations(machine: &MachineDescription, result: &mut ValidationResult) {
    for fu in &machine.function_units {
        if fu.operations.is_empty() {
            result.push(
                ErrorCode::FuNoValidOperations,
                format!("Function unit '{}' implements no operations.", fu.name),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::FunctionUnit;

    fn all_checks() -> BTreeSet<ErrorCode> {
        ErrorCode::ALL.into_iter().collect()
    }

    fn only(code: ErrorCode) -> BTreeSet<ErrorCode> {
        ValidationResult {
            errors: vec![(code, String::new())],
        }
        .codes()
    }

    #[test]
    fn minimal_machine_passes_all_checks() {
        let result = validate(&MachineDescription::minimal(), &all_checks());
        assert!(result.is_empty(), "{:?}", result.errors());
    }

    #[test]
    fn missing_gcu_reports_only_gcu_missing() {
        let mut m = MachineDescription::minimal();
        m.control_unit = None;
        let result = validate(&m, &ErrorCode::required());
        assert_eq!(result.codes(), only(ErrorCode::GcuMissing));
        assert_eq!(result.error_count(), 1);
    }

    #[test]
    fn missing_address_space_binding() {
        let mut m = MachineDescription::minimal();
        m.control_unit.as_mut().unwrap().address_space = None;
        let result = validate(&m, &ErrorCode::required());
        assert_eq!(result.codes(), only(ErrorCode::GcuAddressSpaceMissing));
    }

    #[test]
    fn unknown_address_space_binding() {
        let mut m = MachineDescription::minimal();
        m.control_unit.as_mut().unwrap().address_space = Some("nowhere".into());
        let result = validate(&m, &ErrorCode::required());
        assert_eq!(result.codes(), only(ErrorCode::GcuAddressSpaceMissing));
        assert!(result.errors()[0].1.contains("nowhere"));
    }

    #[test]
    fn unbound_operand() {
        let mut m = MachineDescription::minimal();
        m.function_units[0].operations[0].bindings.pop();
        let result = validate(&m, &ErrorCode::required());
        assert_eq!(result.codes(), only(ErrorCode::UsedIoNotBound));
        assert!(result.errors()[0].1.contains("Operand 3"));
    }

    #[test]
    fn operand_bound_to_unknown_port() {
        let mut m = MachineDescription::minimal();
        m.function_units[1].operations[0].bindings[0].port = "ghost".into();
        let result = validate(&m, &ErrorCode::required());
        assert_eq!(result.codes(), only(ErrorCode::UsedIoNotBound));
    }

    #[test]
    fn absurd_operand_count_is_reported_without_overflow() {
        let mut m = MachineDescription::minimal();
        m.function_units[0].operations[0].inputs = u32::MAX;
        let result = validate(&m, &ErrorCode::required());
        assert_eq!(result.codes(), only(ErrorCode::UsedIoNotBound));
        assert_eq!(result.error_count(), REPORTED_OPERANDS + 1);
        assert!(result.errors()[0].1.contains("Operand 4 "));
        let rest = u64::from(u32::MAX) - 3 - REPORTED_OPERANDS as u64;
        let summary = &result.errors()[REPORTED_OPERANDS].1;
        assert!(summary.starts_with(&format!("{rest} more operands")), "{summary}");
    }

    #[test]
    fn missing_pc_port() {
        let mut m = MachineDescription::minimal();
        m.control_unit.as_mut().unwrap().program_counter_port = None;
        let result = validate(&m, &ErrorCode::required());
        assert_eq!(result.codes(), only(ErrorCode::PcPortMissing));
    }

    #[test]
    fn missing_ra_port() {
        let mut m = MachineDescription::minimal();
        m.control_unit.as_mut().unwrap().return_address_port = Some("gone".into());
        let result = validate(&m, &ErrorCode::required());
        assert_eq!(result.codes(), only(ErrorCode::RaPortMissing));
    }

    #[test]
    fn only_requested_checks_run() {
        let mut m = MachineDescription::minimal();
        m.control_unit.as_mut().unwrap().return_address_port = None;
        let checks: BTreeSet<_> = [ErrorCode::PcPortMissing].into_iter().collect();
        assert!(validate(&m, &checks).is_empty());
    }

    #[test]
    fn jump_and_call_on_different_ports() {
        let mut m = MachineDescription::minimal();
        let gcu = m.control_unit.as_mut().unwrap();
        gcu.operations[1].bindings[0].port = "ra".into();
        let result = validate(&m, &all_checks());
        assert_eq!(result.codes(), only(ErrorCode::DifferentPortForJumpAndCall));
    }

    #[test]
    fn unequal_pc_and_ra_width() {
        let mut m = MachineDescription::minimal();
        m.control_unit.as_mut().unwrap().ports[1].width_bits = 32;
        let result = validate(&m, &all_checks());
        assert_eq!(result.codes(), only(ErrorCode::PcAndRaPortsUnequalWidth));
    }

    #[test]
    fn empty_function_unit() {
        let mut m = MachineDescription::minimal();
        m.function_units.push(FunctionUnit {
            name: "idle".into(),
            address_space: None,
            ports: vec![],
            operations: vec![],
        });
        let result = validate(&m, &all_checks());
        assert_eq!(result.codes(), only(ErrorCode::FuNoValidOperations));
    }

    #[test]
    fn into_result_concatenates_messages() {
        let mut m = MachineDescription::minimal();
        let gcu = m.control_unit.as_mut().unwrap();
        gcu.program_counter_port = None;
        gcu.return_address_port = None;
        let err = validate(&m, &ErrorCode::required())
            .into_result()
            .unwrap_err();
        assert_eq!(err.errors.len(), 2);
        let text = err.to_string();
        assert!(text.contains("program counter"));
        assert!(text.contains("return address"));
    }
}
