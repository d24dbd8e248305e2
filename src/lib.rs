// explanium - cached explanations for selected text, backed by hosted Gemma
// Author: kelexine (https://github.com/kelexine)

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod explainer;
pub mod gemma;
pub mod metrics;
pub mod server;
pub mod storage;
pub mod utils;
