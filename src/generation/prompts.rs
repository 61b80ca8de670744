//! Prompt construction for the model provider
//!
//! Pure functions: the same context, time, and language list always yield the
//! same prompt text.

use crate::incident::{FollowUpHistory, IncidentContext};

/// Fixed system instruction sent with every request
pub const SYSTEM_PROMPT: &str = "You are an AI Crisis Communication Copilot for emergency mass notification systems.

Rules:
- Use ONLY confirmed facts.
- Never invent details.
- Avoid speculation or blame.
- Include requiredAction explicitly in every channel if provided.
- If requiredAction is missing, add a compliance flag.
- Adapt tone based on:
    Calm -> reassuring, steady
    Neutral -> clear and direct
    Urgent -> concise and commanding
- Use plain language at the requested reading level.
- SMS must be <= 160 characters.
- Include sender name when appropriate.
- Include timestamp naturally in longer channels (voice/email/social).
- Return ONLY valid JSON matching schema exactly.";

const CLOSING_INSTRUCTION: &str =
    "Do not include explanations. No extra keys. No markdown. No commentary.";

/// System and user instruction for one provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    pub system: &'static str,
    pub user: String,
}

impl PromptPayload {
    /// Prompt for the initial alert package
    pub fn initial(ctx: &IncidentContext, formatted_time: &str, languages: &[String]) -> Self {
        Self {
            system: SYSTEM_PROMPT,
            user: build_user_prompt(ctx, formatted_time, languages),
        }
    }

    /// Prompt for a follow-up update
    pub fn follow_up(
        ctx: &IncidentContext,
        formatted_time: &str,
        history: &FollowUpHistory,
    ) -> Self {
        Self {
            system: SYSTEM_PROMPT,
            user: build_follow_up_prompt(ctx, formatted_time, history),
        }
    }
}

fn context_lines(ctx: &IncidentContext, formatted_time: &str) -> String {
    let required_action = match ctx.required_action() {
        Some(action) => format!("Required Action: {}", action),
        None => "Required Action: (not specified; flag this in compliance_flags)".to_string(),
    };

    format!(
        "Incident Type: {}\n\
         Location: {}\n\
         Severity: {}\n\
         Confirmed Facts: {}\n\
         {}\n\
         Audience: {}\n\
         Reading Level: Grade {}\n\
         Tone: {}\n\
         Sender: {}\n\
         Time: {}",
        ctx.incident_type,
        ctx.location,
        ctx.severity,
        ctx.confirmed_facts,
        required_action,
        ctx.audience,
        ctx.reading_level,
        ctx.tone,
        ctx.sender,
        formatted_time,
    )
}

/// User instruction for the initial alert, embedding the target schema
pub fn build_user_prompt(ctx: &IncidentContext, formatted_time: &str, languages: &[String]) -> String {
    let translation_keys = languages
        .iter()
        .map(|code| format!("\"{}\": \"...\"", code))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Generate emergency messages based on the following incident details:\n\n\
         {}\n\n\
         Return STRICT JSON with this exact schema:\n\n\
         {{\n  \
           \"sms\": \"...\",\n  \
           \"voice_script\": \"...\",\n  \
           \"email\": {{ \"subject\": \"...\", \"body\": \"...\" }},\n  \
           \"social_post\": \"...\",\n  \
           \"translations\": {{ {} }},\n  \
           \"readability_grade_estimate\": {},\n  \
           \"compliance_flags\": [],\n  \
           \"follow_up_suggestion\": \"...\"\n\
         }}\n\n\
         {}",
        context_lines(ctx, formatted_time),
        translation_keys,
        ctx.reading_level,
        CLOSING_INSTRUCTION,
    )
}

/// User instruction for a follow-up update
pub fn build_follow_up_prompt(
    ctx: &IncidentContext,
    formatted_time: &str,
    history: &FollowUpHistory,
) -> String {
    format!(
        "Generate a follow-up update for an ongoing incident based on the following details:\n\n\
         {}\n\n\
         Previous SMS: {}\n\
         Most Recent Follow-Up SMS: {}\n\n\
         The update must use only the confirmed facts above, must not repeat the previous SMS \
         word for word, and must restate the required action if one is provided.\n\n\
         Return STRICT JSON with this exact schema:\n\n\
         {{\n  \
           \"follow_up\": {{\n    \
             \"sms\": \"...\",\n    \
             \"email\": {{ \"subject\": \"...\", \"body\": \"...\" }},\n    \
             \"compliance_flags\": []\n  \
           }}\n\
         }}\n\n\
         {}",
        context_lines(ctx, formatted_time),
        history.previous_sms.as_deref().unwrap_or("(none provided)"),
        history
            .last_follow_up_sms
            .as_deref()
            .unwrap_or("(no follow-up sent yet)"),
        CLOSING_INSTRUCTION,
    )
}
