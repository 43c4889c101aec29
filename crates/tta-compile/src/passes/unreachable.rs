//! Remove IR blocks that cannot be reached from their function's entry.

use std::collections::BTreeSet;

use tta_ir::ProgramModule;

pub const NAME: &str = "unreachable-block-elimination";

/// Returns the number of blocks removed.
pub fn run(module: &mut ProgramModule) -> usize {
    let mut removed = 0;
    for func in &mut module.functions {
        let Some(entry) = func.blocks.first() else {
            continue;
        };
        let mut reachable: BTreeSet<String> = BTreeSet::new();
        let mut work = vec![entry.label.clone()];
        while let Some(label) = work.pop() {
            if !reachable.insert(label.clone()) {
                continue;
            }
            if let Some(block) = func.block(&label) {
                work.extend(block.terminator.successors().into_iter().map(str::to_string));
            }
        }
        let before = func.blocks.len();
        func.blocks.retain(|b| reachable.contains(&b.label));
        removed += before - func.blocks.len();
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tta_ir::builder::FunctionBuilder;

    #[test]
    fn drops_orphan_blocks() {
        let mut f = FunctionBuilder::new("main", 0);
        let mut entry = f.block("entry");
        entry.jump("exit");
        let mut orphan = f.block("orphan");
        orphan.jump("exit");
        let mut exit = f.block("exit");
        exit.ret(None);
        f.finish_block(entry);
        f.finish_block(orphan);
        f.finish_block(exit);

        let mut module = ProgramModule::new("m");
        module.functions.push(f.build());
        assert_eq!(run(&mut module), 1);
        let labels: Vec<_> = module.functions[0]
            .blocks
            .iter()
            .map(|b| b.label.as_str())
            .collect();
        assert_eq!(labels, vec!["entry", "exit"]);
    }

    #[test]
    fn loops_are_kept() {
        let mut f = FunctionBuilder::new("main", 1);
        let mut entry = f.block("entry");
        entry.jump("loop");
        let mut body = f.block("loop");
        let c = f.param(0);
        body.branch(c, "loop", "done");
        let mut done = f.block("done");
        done.ret(None);
        f.finish_block(entry);
        f.finish_block(body);
        f.finish_block(done);

        let mut module = ProgramModule::new("m");
        module.functions.push(f.build());
        assert_eq!(run(&mut module), 0);
    }
}
