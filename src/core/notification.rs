//! Notification comments.
//!
//! A notification is persisted as a plain comment of the form
//! `[SOURCE] title` followed by a blank line and the body. Parsing a
//! posted comment must give back exactly the notification that produced
//! it, since equality of the two decides whether we repost.

use serde::Serialize;

/// Source name of milestone notifications.
pub const NOTIFIER_NAME: &str = "MilestoneNotifier";

/// A structured bot notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    source: String,
    title: String,
    body: String,
}

impl Notification {
    /// Create a notification in canonical form.
    ///
    /// The source is upper-cased, the title is collapsed onto one line and
    /// both title and body are trimmed, so that `parse(to_comment())` is an
    /// identity.
    pub fn new(source: &str, title: &str, body: &str) -> Self {
        let title = title.lines().map(str::trim).collect::<Vec<_>>().join(" ");
        Self {
            source: source.trim().to_uppercase(),
            title: title.trim().to_string(),
            body: body.trim().to_string(),
        }
    }

    /// Source name (upper-case).
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Title line.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Body text.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Check if this notification came from the given source.
    pub fn is_from(&self, source: &str) -> bool {
        self.source.eq_ignore_ascii_case(source)
    }

    /// Render the comment text to post.
    pub fn to_comment(&self) -> String {
        format!("[{}] {}\n\n{}", self.source, self.title, self.body)
    }

    /// Parse comment text back into a notification.
    ///
    /// Returns `None` when the text does not start with a `[SOURCE]` tag.
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.strip_prefix('[')?;
        let close = rest.find(']')?;
        let source = &rest[..close];
        if source.is_empty() || source.chars().any(char::is_whitespace) {
            return None;
        }

        let after_tag = rest[close + 1..].trim_start_matches([' ', '\t']);
        let (title, body) = match after_tag.split_once('\n') {
            Some((title, body)) => (title, body),
            None => (after_tag, ""),
        };

        Some(Self::new(source, title, body))
    }
}
