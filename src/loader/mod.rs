//! Loading: per-root contexts, the class-file format, and load outcomes.

pub(crate) mod attributes;
pub mod classfile;
pub(crate) mod constant_pool;
pub mod context;
pub mod descriptors;
pub mod isolated;
pub mod outcome;
pub(crate) mod reader;
