//! Premium post gating.

use serde::Serialize;

/// Characters of a premium post shown to readers without a subscription.
pub const PREVIEW_CHARS: usize = 200;

/// What a reader gets to see of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "access", rename_all = "snake_case")]
pub enum ContentAccess {
    Full,
    Preview { excerpt: String },
}

impl ContentAccess {
    /// Free posts and a post's own author always get the full text.
    pub fn evaluate(content: &str, is_premium: bool, viewer_is_author: bool, entitled: bool) -> Self {
        if !is_premium || viewer_is_author || entitled {
            return ContentAccess::Full;
        }

        ContentAccess::Preview {
            excerpt: content.chars().take(PREVIEW_CHARS).collect(),
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, ContentAccess::Full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_posts_are_always_full() {
        assert!(ContentAccess::evaluate("hello", false, false, false).is_full());
    }

    #[test]
    fn authors_see_their_own_premium_posts() {
        assert!(ContentAccess::evaluate("hello", true, true, false).is_full());
    }

    #[test]
    fn entitled_readers_see_premium_posts() {
        assert!(ContentAccess::evaluate("hello", true, false, true).is_full());
    }

    #[test]
    fn others_get_a_character_bounded_preview() {
        let content = "あ".repeat(PREVIEW_CHARS + 50);

        match ContentAccess::evaluate(&content, true, false, false) {
            ContentAccess::Preview { excerpt } => {
                assert_eq!(excerpt.chars().count(), PREVIEW_CHARS);
            }
            ContentAccess::Full => panic!("expected preview"),
        }
    }

    #[test]
    fn short_premium_post_preview_is_whole_text() {
        assert_eq!(
            ContentAccess::evaluate("short", true, false, false),
            ContentAccess::Preview {
                excerpt: "short".to_string()
            }
        );
    }
}
