//! Prompt templates.

use crate::document::Document;

pub const SYSTEM_PROMPT: &str = "You are a helpful insurance claims assistant. \
Answer the user query based ONLY on the provided context documents. \
Cite the Claim ID for every fact you mention. \
If the answer is not in the documents, say you don't know.";

/// Numbered context block for chat-style models.
pub fn numbered_context(context: &[Document]) -> String {
    context
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("Document {}:\n{}", i + 1, doc.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// User turn for chat-style models; pair with [`SYSTEM_PROMPT`].
pub fn chat_user_prompt(query: &str, context: &[Document]) -> String {
    format!(
        "Context:\n{}\n\nQuestion: {query}",
        numbered_context(context)
    )
}

/// System instructions and question in one prompt.
pub fn inline_prompt(query: &str, context: &[Document]) -> String {
    format!("{SYSTEM_PROMPT}\n\n{}", chat_user_prompt(query, context))
}

/// Instruct-style prompt for small local models.
pub fn instruct_prompt(query: &str, context: &[Document]) -> String {
    let bullets = context
        .iter()
        .map(|doc| format!("- {}", doc.text))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "### System:\nYou are an insurance assistant. Use the context below to answer the question.\n\n\
         ### Context:\n{bullets}\n\n\
         ### User:\n{query}\n\n\
         ### Assistant:\n"
    )
}

/// Asks a model to turn a question into a JSON filter object.
pub fn filter_extraction_prompt(query: &str) -> String {
    format!(
        "Extract metadata filters from the user query. \n\
         Return ONLY a valid JSON object with keys: 'start_date' (YYYY-MM-DD), 'end_date' (YYYY-MM-DD), \
         'status' (Approved, Denied, Pending), 'specialty', 'doctor_name', 'claim_id'. \n\
         Date logic: 'last quarter' means the previous 3 month block. 'last year' means the previous calendar year.\n\
         If a filter is not present, omit the key.\n\
         Example: 'Show me denied claims' -> {{\"status\": \"Denied\"}}\n\
         Query: {query}\n\
         JSON:"
    )
}
