pub mod thir_to_mir;

pub use thir_to_mir::*;
