//! 地址推导缓存。ATA 与中继程序 PDA 在每次构建交易时都会重复推导，按输入键缓存结果。

mod address;

pub use address::{cached_associated_token_address, cached_program_address};
