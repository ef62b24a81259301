//! Guarded prompt construction.
//!
//! The assembled prompt embeds the retrieved context and the question into
//! a fixed instruction template. The template pins five behaviours on the
//! model: answer only from context, refuse with [`INSUFFICIENT_INFO`] +
//! [`FOLLOW_UP_SUGGESTION`] when the context falls short, answer with
//! [`LEGAL_REFERRAL`] for legal/deportation questions the context does not
//! cover, answer questions about the assistant itself from context, and
//! never reveal that a source document exists.
//!
//! The fixed sentences are fixed points of
//! [`normalize`](crate::normalize::normalize), so they survive the
//! synthesizer's output normalization byte for byte and can be matched
//! exactly downstream.

use crate::models::RetrievalResult;
use crate::normalize::normalize;

/// Refusal sentence; its presence in an answer marks the turn as ungrounded.
pub const INSUFFICIENT_INFO: &str =
    "I am sorry, but I do not have enough information to answer that question.";

/// Follows [`INSUFFICIENT_INFO`] in the refusal reply.
pub const FOLLOW_UP_SUGGESTION: &str =
    "If you would like, a member of our team can follow up with you personally.";

/// Reply for legal or deportation questions the context does not cover in detail.
pub const LEGAL_REFERRAL: &str = "For legal or deportation questions, please consult a qualified immigration attorney or an accredited legal aid organization.";

/// The exact refusal the model is instructed to give.
pub fn refusal() -> String {
    format!("{} {}", INSUFFICIENT_INFO, FOLLOW_UP_SUGGESTION)
}

/// Whether an answer is the refusal (or contains it).
pub fn is_insufficient(answer: &str) -> bool {
    answer.contains(INSUFFICIENT_INFO)
}

/// Combine retrieved chunks and the normalized question into the guarded prompt.
///
/// Chunks appear in retrieval order (highest similarity first), each
/// normalized and separated by a blank line.
pub fn assemble(result: &RetrievalResult, normalized_query: &str) -> String {
    let context = result
        .iter()
        .map(|hit| normalize(&hit.chunk.text))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a helpful assistant. Answer the question using only the context below.\n\
         \n\
         Follow these rules strictly:\n\
         1. Use only facts stated in the context. Do not use outside knowledge and do not guess.\n\
         2. If the context does not contain enough information to answer, reply with exactly this text and nothing else: \"{refusal}\"\n\
         3. If the question concerns legal matters or deportation and the context does not address it in detail, reply with exactly this text and nothing else: \"{legal}\"\n\
         4. If the question asks who you are, what you do, or how you can help, answer directly from the context when it describes this.\n\
         5. Never mention, cite, or hint at the existence of a context, document, file, or source. Answer as if you simply know the information.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question: {question}\n\
         \n\
         Answer:",
        refusal = refusal(),
        legal = LEGAL_REFERRAL,
        context = context,
        question = normalized_query,
    )
}
