//! Answer generation for retrieval-augmented questions.
//!
//! An [`AnswerGenerator`] is chosen once from [`LlmConfig`](crate::config::LlmConfig)
//! by [`select_generator`]. It writes the final answer from retrieved
//! documents and, for non-mock backends, extracts metadata filters from the
//! question.

pub mod backend;
pub mod filters;
pub mod prompt;

pub use self::backend::{
    AnswerGenerator, ChatCompletionClient, GeminiClient, GeneratorSelection, select_generator,
};
pub use self::filters::{extract_filters, keyword_filters, parse_filter_response};
