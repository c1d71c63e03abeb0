use std::fmt;

use crate::Reply;

/// Literal `"@name "` text quoting the author a reply answers to
///
/// Stored replies start with their prefix, so stripping it back out of the
/// content gives the text the user typed.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct MentionPrefix(String);

impl MentionPrefix {
    pub fn for_author(name: &str) -> MentionPrefix {
        MentionPrefix(format!("@{name} "))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Prefix `text` with the mention, unless the user already typed it
    pub fn compose(&self, text: &str) -> String {
        if text.starts_with(&self.0) {
            String::from(text)
        } else {
            format!("{}{text}", self.0)
        }
    }

    /// What the user actually wrote, without the mention
    pub fn strip<'a>(&self, content: &'a str) -> &'a str {
        content.strip_prefix(&self.0).unwrap_or(content)
    }
}

impl fmt::Display for MentionPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A comment's content, ready for display
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Rendered<'a> {
    /// Set only for replies to replies, to be styled distinctly
    pub mention: Option<&'a str>,
    pub body: &'a str,
}

impl<'a> Rendered<'a> {
    pub fn raw(content: &'a str) -> Rendered<'a> {
        Rendered {
            mention: None,
            body: content,
        }
    }
}

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(mention) = self.mention {
            f.write_str(mention)?;
        }
        f.write_str(self.body)
    }
}

/// Split `content` on the first occurrence of `prefix`, dropping whatever came
/// before it. Replies to the root itself only show the text after the mention,
/// replies to other replies keep the mention as a separate span.
pub fn render<'a>(content: &'a str, prefix: Option<&'a str>, to_root: bool) -> Rendered<'a> {
    let prefix = match prefix {
        Some(p) if !p.is_empty() => p,
        _ => return Rendered::raw(content),
    };
    match content.split_once(prefix) {
        None => Rendered::raw(content),
        Some((_before, after)) if to_root => Rendered {
            mention: None,
            body: after,
        },
        Some((_before, after)) => Rendered {
            mention: Some(prefix),
            body: after,
        },
    }
}

impl Reply {
    pub fn render(&self) -> Rendered<'_> {
        render(
            &self.content,
            self.mention_prefix.as_deref(),
            self.parent_id == self.root_id,
        )
    }
}
