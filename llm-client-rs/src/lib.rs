// llm-client-rs/src/lib.rs
//
// Client side of the text-completion model endpoint: the HTTP transport with
// retry/backoff, and the normalizer that turns free-form model text into
// typed payloads.

pub mod llm_client;
pub mod normalizer;


pub use llm_client::{InvokeOptions, LlmClient, LlmConfig, LlmError, TextGenerator};
pub use normalizer::{
    extract_structured, extract_text, strip_code_fences, try_extract_structured, DecodeError,
};
