//! Matching pipeline
//!
//! Turns one target plus a reference (recording or preset) into every
//! requested variant:
//! - Variant keys and the stage path each one takes
//! - Reference profiles and JSON presets
//! - Memoized assembly of shared intermediates
//! - The `process` entry point

pub mod assembler;
pub mod process;
pub mod reference;
pub mod variants;

pub use assembler::{AssembledVariants, VariantAssembler};
pub use process::{process, FinishedResult, MatchOutput, PreviewHandoff, PreviewRequest};
pub use reference::{PresetCurve, ReferenceProfile, ReferenceSource, PRESET_FORMAT_VERSION};
pub use variants::{BranchStage, EqMode, Finish, RequestedVariants, VariantKey};
