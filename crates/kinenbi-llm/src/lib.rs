// Generative lookup sources: OpenAI-compatible chat completion clients that
// answer "what happened on this day" for a date.

pub mod client;
pub mod prompt;

pub use client::{Endpoint, GenerativeClient};
