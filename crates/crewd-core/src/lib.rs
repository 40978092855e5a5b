#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
mod timing;

pub use error::{BoxedError, ErrorCategory, ErrorSeverity, ExecutionError};
pub use timing::Timing;
