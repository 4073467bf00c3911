//! VM call frames

/// Control-flow record pushed by a call and popped by the matching return.
///
/// The caller's locals are saved separately, in the execution context's
/// upper-locals stack, so the two stacks always have the same depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlFrame {
    /// Instruction index to resume at after the callee returns
    pub return_pc: usize,
    /// Value stack depth at call time, after the arguments were taken
    pub stack_base: usize,
}

impl ControlFrame {
    /// Create a new frame
    pub fn new(
        return_pc: usize,
        stack_base: usize,
    ) -> Self {
        Self {
            return_pc,
            stack_base,
        }
    }
}
