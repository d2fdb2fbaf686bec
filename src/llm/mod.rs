pub mod gemini;
pub mod media;

use std::future::Future;
use std::sync::Arc;

pub use gemini::GeminiGateway;
pub use media::ImagePayload;

// Both entry points fail closed: `None` covers missing credentials, transport
// errors, non-success statuses and replies without a text part.
pub trait GenerationGateway: Send + Sync + 'static {
    fn text_completion(
        &self,
        prompt_text: &str,
        wants_structured_reply: bool,
    ) -> impl Future<Output = Option<String>> + Send;

    fn vision_analysis(&self, image: &ImagePayload) -> impl Future<Output = Option<String>> + Send;
}

impl<T: GenerationGateway> GenerationGateway for Arc<T> {
    fn text_completion(
        &self,
        prompt_text: &str,
        wants_structured_reply: bool,
    ) -> impl Future<Output = Option<String>> + Send {
        (**self).text_completion(prompt_text, wants_structured_reply)
    }

    fn vision_analysis(&self, image: &ImagePayload) -> impl Future<Output = Option<String>> + Send {
        (**self).vision_analysis(image)
    }
}
