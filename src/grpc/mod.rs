pub mod pb;
pub mod service;

pub use service::{GrpcService, PpeInference};
