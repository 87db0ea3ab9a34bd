//! Context assembly: turning retrieved memories, tool output, and the
//! live conversation tail into one budgeted prompt payload.

pub mod assembler;

pub use assembler::{AssembledContext, ContextAssembler};
