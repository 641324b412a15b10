mod rect_packer;
pub use rect_packer::*;
