pub mod attributes;
pub mod type_support;
