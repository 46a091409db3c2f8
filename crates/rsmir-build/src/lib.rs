// rsmir-build: builds MIR bodies from typed THIR
//
// Architecture:
// - transforms: THIR → MIR lowering (scopes, patterns, control flow)
//
// The MIR data model, THIR input model and shared configuration live in
// rsmir-core.

pub mod transforms;

pub use transforms as transformations;
pub use transforms::thir_to_mir::MirLowering;
