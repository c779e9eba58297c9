pub(crate) mod digest;
pub(crate) mod reader;
pub(crate) mod xml;
pub(crate) mod zip;
