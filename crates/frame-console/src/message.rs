//! The console reply sent back to the IDE.

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

/// Which stream an entry came from; also the XML element name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Output,
    Error,
}

/// One line of console output or error text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    pub kind: MessageKind,
    pub text: String,
}

/// The reply to one console command: the continuation flag plus output and error lines.
///
/// A fresh message is built for every command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    more: bool,
    entries: Vec<ConsoleEntry>,
}

impl ConsoleMessage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `text` one line per entry, skipping lines that are empty or only whitespace.
    pub fn add(&mut self, kind: MessageKind, text: &str) {
        self.entries.extend(
            text.split('\n')
                .filter(|line| !line.trim().is_empty())
                .map(|line| ConsoleEntry {
                    kind,
                    text: line.to_owned(),
                }),
        );
    }

    pub fn set_more(&mut self, more: bool) {
        self.more = more;
    }

    /// Whether the console is waiting for further lines.
    #[must_use]
    pub fn more(&self) -> bool {
        self.more
    }

    #[must_use]
    pub fn entries(&self) -> &[ConsoleEntry] {
        &self.entries
    }

    /// Renders the wire form:
    ///
    /// ```text
    /// <xml><more>false</more><output message="1"></output><error message="..."></error></xml>
    /// ```
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut xml = format!("<xml><more>{}</more>", self.more);
        for entry in &self.entries {
            let tag: &'static str = entry.kind.into();
            xml.push_str(&format!("<{tag} message=\"{}\"></{tag}>", escape_xml_value(&entry.text)));
        }
        xml.push_str("</xml>");
        xml
    }
}

/// Escapes text for use inside a double-quoted XML attribute.
#[must_use]
pub fn escape_xml_value(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn blank_lines_are_dropped() {
        let mut message = ConsoleMessage::new();
        message.add(MessageKind::Output, "a\n\n   \nb\n");
        let texts: Vec<_> = message.entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["a", "b"]);
    }

    #[test]
    fn xml_shape() {
        let mut message = ConsoleMessage::new();
        message.set_more(true);
        message.add(MessageKind::Output, "x < \"y\" & z");
        message.add(MessageKind::Error, "boom");
        assert_eq!(
            message.to_xml(),
            "<xml><more>true</more><output message=\"x &lt; &quot;y&quot; &amp; z\"></output>\
             <error message=\"boom\"></error></xml>"
        );
    }

    #[test]
    fn empty_message() {
        assert_eq!(ConsoleMessage::new().to_xml(), "<xml><more>false</more></xml>");
    }
}
