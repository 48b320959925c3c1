//! Schema Analysis
//!
//! Pure functions over schema nodes and schema names:
//! - `structure` computes fingerprints at each duplicate fidelity level
//! - `names` decomposes generated identifiers into entity/action/collection

pub mod names;
pub mod structure;

pub use names::{
    analyze_group, capitalize_first, extract_entity, strip_dto_suffix, type_suffix, ActionKind,
    EntityInfo, GroupAnalysis, TypeSuffix,
};
pub use structure::{
    attribute_key, attribute_shape, compare, is_inline_object, is_inline_object_map, signature, Attribute,
    AttributeShape, CoarseType, Comparison,
};
