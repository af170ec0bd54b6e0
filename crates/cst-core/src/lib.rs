//! # CST Core
//!
//! Data model for NMR chemical shielding tensors extracted from
//! quantum-chemistry output files.
//!
//! ## Modules
//!
//! - [`tensor`]: One shielding tensor ([`tensor::Tensor`]), shielding types
//!   and report verbosity.
//! - [`reference`]: Secondary references converting shielding to chemical
//!   shift ([`reference::SigmaReference`]).
//! - [`collection`]: The ordered tensors of one output file
//!   ([`collection::TensorList`]).
//! - [`stats`]: Per-atom statistics over many runs
//!   ([`stats::TensorStats`]).

pub mod collection;
pub mod reference;
pub mod stats;
pub mod tensor;

pub use collection::{CollectionError, TensorList};
pub use reference::{ReferenceError, SigmaReference};
pub use stats::{SampleSummary, StatsError, TensorStats};
pub use tensor::{ShieldingType, Tensor, TensorError, Verbosity};
