pub mod huggingface;
pub mod response;
pub mod retry;
pub mod traits;
pub(crate) mod util;

// Re-exports for convenience.
pub use huggingface::HuggingFaceProvider;
pub use retry::{RetryPolicy, RetryingProvider};
pub use traits::{GenerateRequest, InferenceProvider, Prompt, TranscribeRequest};
pub use util::resolve_api_key;
