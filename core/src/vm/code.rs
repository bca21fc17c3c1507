use core::fmt;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::constant_pool::PoolEntry;
use crate::vm::Instruction;

/// Output of compiling one method: self-contained, no names left in the
/// instruction stream.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledMethod {
    pub name: String,
    pub param_count: u16,
    pub max_stack: u16,
    pub max_locals: u16,
    pub constants: Vec<PoolEntry>,
    pub instructions: Vec<Instruction>,
}

impl CompiledMethod {
    /// Absolute target of the branch at `index`, if it is a branch.
    /// May point outside the code when the stream is malformed.
    pub fn branch_target(&self, index: usize) -> Option<isize> {
        self.instructions
            .get(index)?
            .branch_offset()
            .map(|offset| index as isize + offset as isize)
    }

    /// Every `(branch index, target index)` pair in the method.
    pub fn branch_targets(&self) -> Vec<(usize, isize)> {
        (0..self.instructions.len())
            .filter_map(|index| self.branch_target(index).map(|target| (index, target)))
            .collect()
    }
}

impl fmt::Debug for CompiledMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CompiledMethod {} {{", self.name)?;
        writeln!(f, "  params: {}", self.param_count)?;
        writeln!(f, "  max_stack: {}", self.max_stack)?;
        writeln!(f, "  max_locals: {}", self.max_locals)?;

        if !self.constants.is_empty() {
            writeln!(f, "  constants: [")?;
            for (i, entry) in self.constants.iter().enumerate() {
                writeln!(f, "    #{} = {} ({})", i, entry.value, entry.width)?;
            }
            writeln!(f, "  ]")?;
        } else {
            writeln!(f, "  constants: []")?;
        }

        // First pass: collect all jump targets to determine which addresses need labels
        let jump_targets: HashSet<isize> = self
            .branch_targets()
            .into_iter()
            .map(|(_, target)| target)
            .collect();

        // Assign label numbers to targets (sorted for deterministic output)
        let mut sorted_targets: Vec<_> = jump_targets.into_iter().collect();
        sorted_targets.sort();
        let label_map: HashMap<isize, usize> = sorted_targets
            .into_iter()
            .enumerate()
            .map(|(i, addr)| (addr, i))
            .collect();

        // Second pass: print instructions with labels
        writeln!(f, "  instructions:")?;
        for (addr, instr) in self.instructions.iter().enumerate() {
            let label_prefix = match label_map.get(&(addr as isize)) {
                Some(label_num) => format!("L{}:", label_num),
                None => String::new(),
            };

            match self.branch_target(addr) {
                Some(target) => {
                    let in_range = target >= 0 && (target as usize) < self.instructions.len();
                    let target_label = match label_map.get(&target) {
                        Some(label) if in_range => format!("L{}", label),
                        _ => format!("@{}", target),
                    };
                    writeln!(
                        f,
                        "    {:4} {:>4}  {:?} (to {})",
                        addr, label_prefix, instr, target_label
                    )?;
                }
                None => writeln!(f, "    {:4} {:>4}  {:?}", addr, label_prefix, instr)?,
            }
        }

        write!(f, "}}")
    }
}
