//! Structured minutes-of-meeting model.
//!
//! Shapes mirror what the generative service is asked to emit. Every field is
//! defaulted: the service omitting a section must never turn into a parse
//! failure. Discussion points arrive either as bare strings or as
//! `{ text, subpoints }` objects and normalize to the struct form.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeetingMinutes {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub agenda: Vec<String>,
    #[serde(default)]
    pub discussions: Vec<DiscussionSection>,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub conclusion: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscussionSection {
    #[serde(default, alias = "section", alias = "section_title")]
    pub title: String,
    #[serde(default)]
    pub points: Vec<DiscussionPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiscussionPoint {
    pub text: String,
    pub subpoints: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPoint {
    Nested {
        text: String,
        #[serde(default)]
        subpoints: Vec<String>,
    },
    Text(String),
}

impl<'de> Deserialize<'de> for DiscussionPoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match RawPoint::deserialize(deserializer)? {
            RawPoint::Text(text) => DiscussionPoint {
                text,
                subpoints: Vec::new(),
            },
            RawPoint::Nested { text, subpoints } => DiscussionPoint { text, subpoints },
        })
    }
}
