#![forbid(unsafe_code)]

pub mod swc;
