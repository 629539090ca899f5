// Bit-exact reference for fixed-point accelerator arithmetic
pub mod error;
pub mod dtype;
pub mod round;
pub mod bf16;
pub mod requant;
pub mod add;
pub mod ops;
pub mod launch;
pub mod dispatch;
pub mod cases;

pub use error::{QuantError, Result};
pub use dtype::DType;
pub use round::{round_to, RoundingMode};
pub use bf16::Bf16;
pub use requant::{requantize, RequantParams};
pub use add::{add_requant, AddParams, AddScaling};
pub use launch::Launcher;
pub use dispatch::Dispatcher;
