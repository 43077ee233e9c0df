//! Clarification questionnaire and preference resolution.
//!
//! [`clarification_questions`] returns the fixed five-question
//! questionnaire; [`resolve`] maps its answers to [`Preferences`]. Both are
//! pure functions.
//!
//! | Answer | Effect |
//! |--------|--------|
//! | `familiarity` | base depth: `None`/`Beginner` → 1, `Intermediate` → 2, `Advanced` → 3 |
//! | `depth` | `Overview` → −1, `In-depth` → +1, `Expert level` → 3 (clamped to 1..=3) |
//! | `format` | `Diagrams` → visuals, `Code examples` → code, `Videos` → videos |
//! | `time` | `15 minutes` → 15, `1 hour` → 60, `Multiple sessions` → 120, else 30 |
//! | `focus` | copied verbatim when non-blank |

use crate::models::{Answers, ClarificationQuestion, Preferences};

const MIN_DEPTH: u8 = 1;
const MAX_DEPTH: u8 = 3;

/// Build the clarification questionnaire for `topic`.
///
/// The question set is fixed; only the topic is interpolated into the
/// prompts. A missing or blank topic reads as `"this topic"`.
pub fn clarification_questions(topic: Option<&str>) -> Vec<ClarificationQuestion> {
    let topic = topic
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("this topic");

    vec![
        choice(
            "familiarity",
            format!("How familiar are you with {}?", topic),
            &["None", "Beginner", "Intermediate", "Advanced"],
        ),
        choice(
            "format",
            "Which learning format do you prefer?".to_string(),
            &["Text", "Diagrams", "Code examples", "Interactive elements", "Videos"],
        ),
        choice(
            "depth",
            "How detailed would you like the content to be?".to_string(),
            &["Overview", "Moderate depth", "In-depth", "Expert level"],
        ),
        ClarificationQuestion {
            id: "focus".to_string(),
            question: format!("What aspect of {} interests you most?", topic),
            options: None,
            input_type: Some("text".to_string()),
        },
        choice(
            "time",
            "How much time do you have to study this topic?".to_string(),
            &["15 minutes", "30 minutes", "1 hour", "Multiple sessions"],
        ),
    ]
}

fn choice(id: &str, question: String, options: &[&str]) -> ClarificationQuestion {
    ClarificationQuestion {
        id: id.to_string(),
        question,
        options: Some(options.iter().map(|o| o.to_string()).collect()),
        input_type: None,
    }
}

/// Resolve questionnaire answers into generation preferences.
///
/// Deterministic and total: any answer set, including empty or unknown
/// values, yields a `depth_level` in `1..=3`.
pub fn resolve(answers: &Answers) -> Preferences {
    let base: u8 = match answers.familiarity.as_deref() {
        Some("Intermediate") => 2,
        Some("Advanced") => 3,
        _ => 1,
    };

    let depth_level = match answers.depth.as_deref() {
        Some("Overview") => base.saturating_sub(1),
        Some("In-depth") => base + 1,
        Some("Expert level") => MAX_DEPTH,
        _ => base,
    }
    .clamp(MIN_DEPTH, MAX_DEPTH);

    let format = answers.format.as_deref();

    let session_time_minutes = match answers.time.as_deref() {
        Some("15 minutes") => 15,
        Some("1 hour") => 60,
        Some("Multiple sessions") => 120,
        _ => 30,
    };

    let focus_area = answers
        .focus
        .as_ref()
        .filter(|f| !f.trim().is_empty())
        .cloned();

    Preferences {
        depth_level,
        include_visuals: format == Some("Diagrams"),
        include_code: format == Some("Code examples"),
        include_videos: format == Some("Videos"),
        session_time_minutes,
        focus_area,
    }
}
