//! Format registry: extension classification and the conversion graph.
//!
//! Every extension the engine understands belongs to exactly one
//! [`FormatCategory`]. Which categories may be converted into which is
//! described by [`ConversionPair`], and the concrete extension pairs offered
//! to callers live in [`FormatGraph`].

mod category;
mod graph;

pub use category::{
    classify, extension_of, is_pair_supported, known_extensions, normalize_extension,
    ConversionPair, FormatCategory,
};
pub use graph::{FormatGraph, TargetGroup};
