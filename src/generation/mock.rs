//! Deterministic mock generator
//!
//! Produces a complete notification package from templates, without any
//! network access. Output depends only on the incident context and the
//! request metadata, so two calls with the same inputs are identical.

use super::compliance;
use super::{
    EmailContent, FollowUpContent, FollowUpGenerateResponse, GenerateResponse, ResponseMetadata,
    clip_sms,
};
use crate::incident::{IncidentContext, Tone};
use std::collections::BTreeMap;

/// Language codes with a mock SMS template
pub const SUPPORTED_TRANSLATIONS: [&str; 5] = ["es", "fr", "ar", "zh", "hi"];

const DEFAULT_GUIDANCE: &str = "Follow official guidance.";
const DEFAULT_FOLLOW_UP_GUIDANCE: &str = "Continue to follow official guidance.";
const SOCIAL_FACTS_LIMIT: usize = 80;

/// Template-based generator for both stages
#[derive(Debug, Clone)]
pub struct MockGenerator {
    languages: Vec<String>,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new(
            SUPPORTED_TRANSLATIONS
                .iter()
                .map(|code| code.to_string())
                .collect(),
        )
    }
}

impl MockGenerator {
    /// Create a generator producing translations for `languages`
    ///
    /// Codes without a template are skipped.
    pub fn new(languages: Vec<String>) -> Self {
        Self { languages }
    }

    /// Full initial-alert package
    pub fn generate(&self, ctx: &IncidentContext, metadata: &ResponseMetadata) -> GenerateResponse {
        let action = ctx.required_action();
        let action_part = action
            .map(|a| format!(" {}", a))
            .unwrap_or_else(|| format!(" {}", DEFAULT_GUIDANCE));

        let sms_prefix = if ctx.tone == Tone::Urgent { "URGENT: " } else { "" };
        let sms = clip_sms(&format!(
            "{}ALERT: {} at {}.{}",
            sms_prefix, ctx.incident_type, ctx.location, action_part
        ));

        let voice_intro = match ctx.tone {
            Tone::Calm => "Please remain calm. ",
            Tone::Urgent => "This is an urgent message. ",
            Tone::Neutral => "",
        };
        let voice_script = format!(
            "{}Attention {}. This is an emergency alert from {} at {}. \
             A {} has been reported at {}. {}{} \
             Please follow all official instructions and stay tuned for updates.",
            voice_intro,
            ctx.audience,
            ctx.sender,
            metadata.formatted_time,
            ctx.incident_type,
            ctx.location,
            ctx.confirmed_facts,
            action.map(|a| format!(" {}", a)).unwrap_or_default(),
        );

        let subject_prefix = if ctx.tone == Tone::Urgent { "URGENT - " } else { "" };
        let email = EmailContent {
            subject: format!(
                "{}Emergency Alert: {} at {}",
                subject_prefix, ctx.incident_type, ctx.location
            ),
            body: format!(
                "This is an official emergency notification from {}.\n\
                 Issued: {}\n\n\
                 Incident: {}\n\
                 Location: {}\n\n\
                 Confirmed details:\n{}{}\n\n\
                 Please follow all official instructions and monitor local news for updates.",
                ctx.sender,
                metadata.formatted_time,
                ctx.incident_type,
                ctx.location,
                ctx.confirmed_facts,
                action
                    .map(|a| format!("\n\nRequired Action:\n{}", a))
                    .unwrap_or_default(),
            ),
        };

        let emoji = if ctx.tone == Tone::Urgent { "\u{1F6A8}" } else { "\u{26A0}\u{FE0F}" };
        let social_post = format!(
            "{} EMERGENCY: {} reported at {} ({}). {}{} \u{2014} {}",
            emoji,
            ctx.incident_type,
            ctx.location,
            metadata.formatted_time,
            ctx.confirmed_facts
                .chars()
                .take(SOCIAL_FACTS_LIMIT)
                .collect::<String>(),
            action_part,
            ctx.sender,
        );

        let translated_action = action.unwrap_or(DEFAULT_GUIDANCE);
        let translations: BTreeMap<String, String> = self
            .languages
            .iter()
            .filter_map(|code| {
                translation_template(code, ctx, translated_action)
                    .map(|text| (code.clone(), clip_sms(&text)))
            })
            .collect();

        GenerateResponse {
            sms,
            voice_script,
            email,
            social_post,
            translations,
            readability_grade_estimate: ctx.reading_level.into(),
            compliance_flags: compliance::evaluate(action, &ctx.confirmed_facts),
            follow_up_suggestion: format!(
                "Send a follow-up message in 30 minutes with updated status on the {} at {}.",
                ctx.incident_type, ctx.location
            ),
            metadata: metadata.clone(),
        }
    }

    /// Follow-up update package (SMS and email only)
    pub fn generate_follow_up(
        &self,
        ctx: &IncidentContext,
        metadata: &ResponseMetadata,
    ) -> FollowUpGenerateResponse {
        let action = ctx.required_action();
        let urgent = ctx.tone == Tone::Urgent;

        let sms = clip_sms(&format!(
            "{}UPDATE: {} at {}. {}",
            if urgent { "URGENT: " } else { "" },
            ctx.incident_type,
            ctx.location,
            action.unwrap_or(DEFAULT_FOLLOW_UP_GUIDANCE)
        ));

        let email = EmailContent {
            subject: format!(
                "{}Update: {} at {}",
                if urgent { "URGENT - " } else { "" },
                ctx.incident_type,
                ctx.location
            ),
            body: format!(
                "This is an update from {} on the ongoing incident.\n\
                 Issued: {}\n\n\
                 Incident: {}\n\
                 Location: {}\n\n\
                 Confirmed details:\n{}{}\n\n\
                 We will continue to provide updates as more information becomes available.",
                ctx.sender,
                metadata.formatted_time,
                ctx.incident_type,
                ctx.location,
                ctx.confirmed_facts,
                action
                    .map(|a| format!("\n\nRequired Action:\n{}", a))
                    .unwrap_or_default(),
            ),
        };

        FollowUpGenerateResponse {
            follow_up: FollowUpContent {
                sms,
                email,
                compliance_flags: compliance::evaluate(action, &ctx.confirmed_facts),
            },
        }
    }
}

/// Translated SMS for one language, unclipped; `None` for codes without a template
pub fn translation_template(code: &str, ctx: &IncidentContext, action: &str) -> Option<String> {
    let kind = ctx.incident_type;
    let location = &ctx.location;
    let text = match code {
        "es" => format!("ALERTA: {} en {}. {}", kind, location, action),
        "fr" => format!("ALERTE: {} a {}. {}", kind, location, action),
        "ar" => format!(
            "\u{062A}\u{0646}\u{0628}\u{064A}\u{0647}: {} \u{0641}\u{064A} {}. {}",
            kind, location, action
        ),
        "zh" => format!(
            "\u{8B66}\u{62A5}: {} \u{53D1}\u{751F} {}\u{3002}{}",
            location, kind, action
        ),
        "hi" => format!(
            "\u{0905}\u{0932}\u{0930}\u{094D}\u{091F}: {} \u{092A}\u{0930} {}\u{0964} {}",
            location, kind, action
        ),
        _ => return None,
    };
    Some(text)
}
