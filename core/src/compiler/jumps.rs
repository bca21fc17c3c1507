//! Forward and backward branch resolution.
//!
//! Branches are emitted with a placeholder offset and a pending patch that
//! names their target label. Labels are bound to an instruction index when
//! the compiler reaches them. All patches are resolved in one pass once the
//! method body is complete.

use tracing::trace;

use crate::compiler::CompileErrorKind;
use crate::vm::Instruction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Label(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelState {
    Pending,
    Bound(usize),
}

#[derive(Debug, Clone, Copy)]
struct Patch {
    branch: usize,
    label: Label,
    /// The branch itself can execute.
    live: bool,
}

#[derive(Debug, Default)]
pub(crate) struct JumpTable {
    labels: Vec<LabelState>,
    patches: Vec<Patch>,
}

impl JumpTable {
    pub fn new_label(&mut self) -> Label {
        self.labels.push(LabelState::Pending);
        Label(self.labels.len() - 1)
    }

    pub fn bind(&mut self, label: Label, index: usize) {
        debug_assert_eq!(
            self.labels[label.0],
            LabelState::Pending,
            "label bound twice"
        );
        self.labels[label.0] = LabelState::Bound(index);
    }

    /// Records that the branch at `branch` must be patched to `label`.
    pub fn add_patch(&mut self, branch: usize, label: Label, live: bool) {
        self.patches.push(Patch {
            branch,
            label,
            live,
        });
    }

    /// Whether any reachable branch emitted so far targets `label`.
    pub fn is_targeted(&self, label: Label) -> bool {
        self.patches
            .iter()
            .any(|patch| patch.live && patch.label == label)
    }

    /// Rewrites every pending branch with its final relative offset.
    pub fn resolve(self, instructions: &mut [Instruction]) -> Result<(), CompileErrorKind> {
        for Patch { branch, label, .. } in self.patches {
            let LabelState::Bound(target) = self.labels[label.0] else {
                unreachable!("branch at {} targets a label that was never bound", branch);
            };
            let offset = target as isize - branch as isize;
            let offset16 =
                i16::try_from(offset).map_err(|_| CompileErrorKind::JumpTooFar { offset })?;
            instructions[branch] = instructions[branch].with_offset(offset16);
            trace!(branch, target, offset, "Patched branch");
        }
        Ok(())
    }
}
