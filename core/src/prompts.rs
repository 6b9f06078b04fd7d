//! Prompt scaffolding for bulk analysis.
//!
//! Only the mechanics live here: the structured response contract that
//! [`crate::analysis`] parses, and snippet truncation. Persona and report
//! content are owned by the calling layer.

/// Preceding-context snippet cap for the analysis prompt.
const CONTEXT_SNIPPET_CHARS: usize = 300;

/// System prompt for the analysis calls.
pub(crate) const ANALYSIS_SYSTEM_PROMPT: &str =
    "Expert therapy supervisor providing constructive feedback.";

/// The marker the model emits for utterances that need work; parsed
/// case-insensitively into `ImprovementRecord::flagged`.
pub(crate) const NEEDS_IMPROVEMENT_MARKER: &str = "NEEDS_IMPROVEMENT";

/// Builds the per-utterance analysis prompt with the structured
/// STATUS / ANALYSIS / SUGGESTION response contract.
pub(crate) fn improvement_prompt(therapist: &str, patient: &str, context: &str) -> String {
    let context = if context.is_empty() {
        "Start of conversation"
    } else {
        truncate_chars(context, CONTEXT_SNIPPET_CHARS)
    };
    let patient = if patient.is_empty() {
        "No response yet"
    } else {
        patient
    };

    format!(
        "You are an expert therapy supervisor. Analyze this exchange:\n\n\
         CONTEXT: {context}\n\n\
         THERAPIST: \"{therapist}\"\n\
         PATIENT: \"{patient}\"\n\n\
         Respond in this EXACT format:\n\
         STATUS: [GOOD or {NEEDS_IMPROVEMENT_MARKER}]\n\
         ANALYSIS: [1 sentence explaining why]\n\
         SUGGESTION: [If {NEEDS_IMPROVEMENT_MARKER}, provide a better alternative in 2-3 sentences. \
         If GOOD, write \"No changes needed.\"]\n\n\
         Be strict - only mark as GOOD if the response shows excellent therapeutic skills."
    )
}

/// First `max_chars` characters, cut on a char boundary.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
