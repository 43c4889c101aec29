//! Pipeline stages.
//!
//! Module-level stages over the IR are plain functions returning a change
//! count. Machine-level stages implement [`crate::pass::MachineFunctionPass`].

pub mod global_dce;
pub mod internalize;
pub mod isel;
pub mod label_fold;
pub mod link;
pub mod lower_missing;
pub mod machine_dce;
pub mod prolog;
pub mod regalloc;
pub mod unreachable;

pub use label_fold::LabelFolding;
pub use machine_dce::MachineDce;
pub use prolog::PrologEpilogInserter;
pub use regalloc::LinearScan;
