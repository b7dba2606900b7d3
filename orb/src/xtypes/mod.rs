pub mod data_storage;
pub mod dynamic_value;
pub mod sequence_value;
pub mod struct_value;
pub mod type_code;
pub mod type_descriptor;
pub mod type_support;
pub mod union_value;
