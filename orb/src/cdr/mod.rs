//! CDR marshaling of dynamic values.
//!
//! [`CdrCodec`] walks a value alongside its [`TypeDescriptor`](crate::xtypes::type_descriptor::TypeDescriptor). Primitives
//! go through [`writer::CdrWriter`] and [`reader::CdrReader`], sequences and
//! arrays through [`sequence`], structs and unions through [`constructed`].

pub mod constructed;
pub mod endianness;
pub mod reader;
pub mod sequence;
pub mod value;
pub mod writer;

pub use value::CdrCodec;
