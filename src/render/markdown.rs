//! Markdown mirror of the document layout, heading levels instead of visual
//! styling.

use crate::synthesis::MeetingMinutes;

pub fn to_markdown(minutes: &MeetingMinutes) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!("# {}", super::document_title(minutes)));
    lines.push(String::new());

    if !minutes.date.is_empty() || !minutes.time.is_empty() || minutes.venue.is_some() {
        lines.push("## Meeting Details".into());
        if !minutes.date.is_empty() {
            lines.push(format!("**Date:** {}", minutes.date));
        }
        if !minutes.time.is_empty() {
            lines.push(format!("**Time:** {}", minutes.time));
        }
        if let Some(venue) = &minutes.venue {
            lines.push(format!("**Venue:** {venue}"));
        }
        lines.push(String::new());
    }

    if !minutes.attendees.is_empty() {
        lines.push("## Attendees".into());
        for attendee in &minutes.attendees {
            lines.push(format!("- {attendee}"));
        }
        lines.push(String::new());
    }

    if !minutes.agenda.is_empty() {
        lines.push("## Agenda".into());
        for item in &minutes.agenda {
            lines.push(format!("- {item}"));
        }
        lines.push(String::new());
    }

    if !minutes.discussions.is_empty() {
        lines.push("## Discussions".into());
        for section in &minutes.discussions {
            if !section.title.is_empty() {
                lines.push(format!("### {}", section.title));
            }
            for point in &section.points {
                lines.push(format!("- {}", point.text));
                for sub in &point.subpoints {
                    lines.push(format!("  - {sub}"));
                }
            }
            lines.push(String::new());
        }
    }

    if !minutes.actions.is_empty() {
        lines.push("## Action Items".into());
        for action in &minutes.actions {
            lines.push(format!("- {action}"));
        }
        lines.push(String::new());
    }

    if !minutes.conclusion.is_empty() {
        lines.push("## Conclusion".into());
        lines.push(minutes.conclusion.clone());
        lines.push(String::new());
    }

    if !minutes.summary.is_empty() {
        lines.push("## Summary".into());
        lines.push(minutes.summary.clone());
    }

    while lines.last().map(String::is_empty).unwrap_or(false) {
        lines.pop();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::{DiscussionPoint, DiscussionSection};

    #[test]
    fn heading_levels_mirror_section_nesting() {
        let minutes = MeetingMinutes {
            title: "Kickoff".into(),
            date: "2026-08-26".into(),
            attendees: vec!["Ana".into()],
            discussions: vec![DiscussionSection {
                title: "Scope".into(),
                points: vec![DiscussionPoint {
                    text: "MVP only".into(),
                    subpoints: vec!["no SSO".into()],
                }],
            }],
            summary: "Agreed on MVP scope.".into(),
            ..Default::default()
        };
        let md = to_markdown(&minutes);
        assert!(md.starts_with("# Kickoff\n"));
        assert!(md.contains("\n## Meeting Details\n"));
        assert!(md.contains("\n### Scope\n"));
        assert!(md.contains("\n- MVP only\n"));
        assert!(md.contains("\n  - no SSO\n"));
        assert!(md.ends_with("## Summary\nAgreed on MVP scope."));
    }

    #[test]
    fn empty_sections_are_omitted() {
        let md = to_markdown(&MeetingMinutes {
            title: "Bare".into(),
            ..Default::default()
        });
        assert_eq!(md, "# Bare");
    }
}
