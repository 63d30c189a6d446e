//! Gemini `generateContent` client: JSON-mode generation for extraction and
//! grounded search for website lookup.

pub mod client;
mod response;
pub mod types;

pub use client::{GeminiClient, GeminiError};
