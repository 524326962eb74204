//! Page layout: section order, word wrap, pagination.

use crate::synthesis::MeetingMinutes;

/// Word-wrap width for long paragraph fields, in characters.
pub const CONTENT_WIDTH_CHARS: usize = 90;
/// Body lines that fit on one page, footer excluded.
pub const LINES_PER_PAGE: usize = 44;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Title,
    Heading,
    Body,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub kind: LineKind,
    /// Indent level: 0 flush, 1 bullet, 2 sub-bullet.
    pub indent: u8,
    pub text: String,
}

pub type Page = Vec<Line>;

impl Line {
    fn title(text: impl Into<String>) -> Self {
        Line {
            kind: LineKind::Title,
            indent: 0,
            text: text.into(),
        }
    }

    fn heading(text: impl Into<String>) -> Self {
        Line {
            kind: LineKind::Heading,
            indent: 0,
            text: text.into(),
        }
    }

    fn body(indent: u8, text: impl Into<String>) -> Self {
        Line {
            kind: LineKind::Body,
            indent,
            text: text.into(),
        }
    }

    fn blank() -> Self {
        Line::body(0, "")
    }
}

/// Greedy word wrap. Never splits a word; a word longer than `width` gets a
/// line of its own.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        } else {
            current.push(' ');
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn push_paragraph(lines: &mut Vec<Line>, heading: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    lines.push(Line::heading(heading));
    for wrapped in wrap(text, CONTENT_WIDTH_CHARS) {
        lines.push(Line::body(0, wrapped));
    }
    lines.push(Line::blank());
}

fn push_bullets(lines: &mut Vec<Line>, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    lines.push(Line::heading(heading));
    for item in items {
        lines.push(Line::body(1, format!("• {item}")));
    }
    lines.push(Line::blank());
}

/// The fixed layout order: title, details, attendees, agenda, discussions,
/// action items, conclusion, summary.
pub fn lines(minutes: &MeetingMinutes) -> Vec<Line> {
    let mut lines = vec![Line::title(super::document_title(minutes)), Line::blank()];

    if !minutes.date.is_empty() || !minutes.time.is_empty() || minutes.venue.is_some() {
        lines.push(Line::heading("Meeting Details"));
        if !minutes.date.is_empty() {
            lines.push(Line::body(1, format!("Date: {}", minutes.date)));
        }
        if !minutes.time.is_empty() {
            lines.push(Line::body(1, format!("Time: {}", minutes.time)));
        }
        if let Some(venue) = &minutes.venue {
            lines.push(Line::body(1, format!("Venue: {venue}")));
        }
        lines.push(Line::blank());
    }

    push_bullets(&mut lines, "Attendees", &minutes.attendees);
    push_bullets(&mut lines, "Agenda", &minutes.agenda);

    if !minutes.discussions.is_empty() {
        lines.push(Line::heading("Discussions"));
        for section in &minutes.discussions {
            if !section.title.is_empty() {
                lines.push(Line::body(0, format!("{}:", section.title)));
            }
            for point in &section.points {
                lines.push(Line::body(1, format!("• {}", point.text)));
                for sub in &point.subpoints {
                    lines.push(Line::body(2, format!("- {sub}")));
                }
            }
        }
        lines.push(Line::blank());
    }

    push_bullets(&mut lines, "Action Items", &minutes.actions);
    push_paragraph(&mut lines, "Conclusion", &minutes.conclusion);
    push_paragraph(&mut lines, "Summary", &minutes.summary);

    while lines.last().map(|l| l.text.is_empty()).unwrap_or(false) {
        lines.pop();
    }
    lines
}

/// Chunk the laid-out lines into pages.
pub fn paginate(minutes: &MeetingMinutes) -> Vec<Page> {
    let all = lines(minutes);
    if all.is_empty() {
        return vec![Vec::new()];
    }
    all.chunks(LINES_PER_PAGE).map(<[Line]>::to_vec).collect()
}

/// Footer text for page `index` (zero-based) of `total`.
pub fn page_footer(index: usize, total: usize) -> String {
    format!("Page {} of {}", index + 1, total)
}
