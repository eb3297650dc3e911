//! De-bufferization of buffer-based loops.
//!
//! Lowers `buf.while`, whose regions communicate by mutating buffers, into
//! `scf.while`, which threads the written buffers through explicit
//! iteration arguments and results. Buffer reads and writes around and
//! inside the loops are folded into a [`DeBufferization`] table mapping each
//! `(block, buffer)` pair to the tensor value that currently stands in for
//! the buffer.
//!
//! [`convert_to_tensors`] runs the whole pass over a module. The
//! `populate_*` functions register the individual rules on an existing
//! [`PatternApplicator`](tensor_ir::rewrite::PatternApplicator).

pub mod buffer_usage;
pub mod convert_buffers;
pub mod convert_while;
pub mod error;
pub mod options;
pub mod pass;
pub mod state;

pub use buffer_usage::{Buffer, UsedBuffers, get_used_buffers, resolve_buffer};
pub use convert_buffers::populate_buffer_access_conversion_patterns;
pub use convert_while::{ConvertedLoop, ConvertedLoops, populate_while_op_conversion_patterns};
pub use error::{DebufError, DebufResult};
pub use options::DebufOptions;
pub use pass::{
    DebufStats, SeededBuffer, buffer_type_converter, conversion_target, convert_to_tensors,
    seed_function_buffers,
};
pub use state::{DeBufferization, SharedDeBufferization};
