//! Reference tensor operators used to produce validation goldens.
pub mod conv;
pub mod matmul;
pub mod permute;
