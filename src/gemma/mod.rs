// Hosted Gemma API client module
// Author: kelexine (https://github.com/kelexine)

mod client;
pub mod models;

pub use client::GemmaClient;
