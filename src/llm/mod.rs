// LLM abstraction layer

pub mod invoker;
pub mod ollama;
pub mod provider;

pub use invoker::{InvokerSettings, ModelCall, ModelInvoker};
pub use ollama::OllamaAdapter;
pub use provider::LLMAdapter;
