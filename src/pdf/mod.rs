pub mod image_xobject;
pub mod reader;
