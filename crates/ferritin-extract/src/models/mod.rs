//! Model backends.
pub mod esm2;
