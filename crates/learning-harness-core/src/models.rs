//! Core data models used throughout Learning Harness.
//!
//! These types represent the research documents, indexed chunks, and
//! learner preferences that flow through the research → index → report
//! pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Which kind of research provider produced a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Web,
    Academic,
    Video,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Web => "web",
            Category::Academic => "academic",
            Category::Video => "video",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(Category::Web),
            "academic" => Ok(Category::Academic),
            "video" => Ok(Category::Video),
            other => anyhow::bail!("unknown document category: '{}'", other),
        }
    }
}

/// A normalized piece of research material.
///
/// `source_id` is a URL or provider identifier, unique within one research
/// run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub source_id: String,
    pub text: String,
    pub category: Category,
}

impl SourceDocument {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>, category: Category) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
            category,
        }
    }
}

/// A bounded slice of a [`SourceDocument`]'s text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub text: String,
    pub source_id: String,
    pub category: Category,
}

/// Generation preferences derived from the clarification questionnaire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// 1 = basic, 2 = intermediate, 3 = advanced.
    pub depth_level: u8,
    pub include_visuals: bool,
    pub include_code: bool,
    pub include_videos: bool,
    pub session_time_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_area: Option<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            depth_level: 1,
            include_visuals: false,
            include_code: false,
            include_videos: false,
            session_time_minutes: 30,
            focus_area: None,
        }
    }
}

impl Preferences {
    /// Apply caller-supplied overrides on top of these preferences.
    ///
    /// `depth_level` is clamped to `[1, 3]`; a blank `focus_area` clears it.
    pub fn with_overrides(mut self, overrides: &PreferenceOverrides) -> Self {
        if let Some(depth) = overrides.depth_level {
            self.depth_level = depth.clamp(1, 3);
        }
        if let Some(v) = overrides.include_visuals {
            self.include_visuals = v;
        }
        if let Some(v) = overrides.include_code {
            self.include_code = v;
        }
        if let Some(v) = overrides.include_videos {
            self.include_videos = v;
        }
        if let Some(minutes) = overrides.session_time_minutes {
            self.session_time_minutes = minutes;
        }
        if let Some(focus) = &overrides.focus_area {
            let focus = focus.trim();
            self.focus_area = if focus.is_empty() {
                None
            } else {
                Some(focus.to_string())
            };
        }
        self
    }

    /// Human-readable knowledge level matching `depth_level`.
    pub fn knowledge_level(&self) -> &'static str {
        match self.depth_level {
            0 | 1 => "beginner",
            2 => "intermediate",
            _ => "advanced",
        }
    }
}

/// Partial [`Preferences`] sent alongside a report request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceOverrides {
    #[serde(default)]
    pub depth_level: Option<u8>,
    #[serde(default)]
    pub include_visuals: Option<bool>,
    #[serde(default)]
    pub include_code: Option<bool>,
    #[serde(default)]
    pub include_videos: Option<bool>,
    #[serde(default)]
    pub session_time_minutes: Option<u32>,
    #[serde(default)]
    pub focus_area: Option<String>,
}

/// Questionnaire answers keyed by question id.
///
/// Unknown keys are ignored so that transport-level fields (such as a
/// `session_id` riding along in the answer map) do not break parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answers {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub familiarity: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub depth: Option<String>,
    #[serde(default)]
    pub focus: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
}

impl Answers {
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).cloned();
        Self {
            topic: get("topic"),
            familiarity: get("familiarity"),
            format: get("format"),
            depth: get("depth"),
            focus: get("focus"),
            time: get("time"),
        }
    }
}

/// One entry of the clarification questionnaire.
///
/// Exactly one of `options` (single-select) or `input_type` (free text)
/// is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationQuestion {
    pub id: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
}
