//! OpenAI-compatible language-model backend.
//!
//! Works with any server exposing `/chat/completions` (Ollama, llama.cpp,
//! vLLM, hosted APIs).

mod client;
mod config;

pub use client::ChatCompletionsClient;
pub use config::LlmConfig;
