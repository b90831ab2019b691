//! C2 (model builder) + C3 (solver driver): the constraint-programming half
//! of the dual-solver pipeline, communicating with the sibling
//! `fuelsched-solver` binary over JSON on standard streams.

pub mod builder;
pub mod driver;
pub mod types;

pub use builder::{build_input, SolverLimits};
pub use driver::SolverDriver;
pub use types::{SolverInput, SolverOutput, SolverStatus};
