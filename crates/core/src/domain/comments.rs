use url::Url;

use crate::error::CoreError;
use crate::types::VoterSet;

const MIN_TEXT_LEN: usize = 3;
const MAX_TEXT_LEN: usize = 65_535;
const MAX_AUTHOR_LEN: usize = 63;
const MAX_EMAIL_LEN: usize = 254;
const MAX_WEBSITE_LEN: usize = 254;

/// Lifecycle state of a stored comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Published.
    Accepted,
    /// Accepted by the server, waiting for a moderator.
    Moderation,
    /// Deleted but still referenced by replies.
    Deleted,
}

impl Mode {
    pub const fn as_i64(self) -> i64 {
        match self {
            Mode::Accepted => 1,
            Mode::Moderation => 2,
            Mode::Deleted => 4,
        }
    }
}

impl TryFrom<i64> for Mode {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Mode::Accepted),
            2 => Ok(Mode::Moderation),
            4 => Ok(Mode::Deleted),
            other => Err(CoreError::InvalidMode(other)),
        }
    }
}

/// Set of modes a query should match.
///
/// The legacy wire value is a bit mask (`5` = accepted or deleted); a row
/// matched when `mask | mode == mask`, which is exactly membership in this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeFilter {
    accepted: bool,
    moderation: bool,
    deleted: bool,
}

impl ModeFilter {
    /// Everything a reader may see: accepted comments and deleted placeholders.
    pub const PUBLIC: Self = Self {
        accepted: true,
        moderation: false,
        deleted: true,
    };
    pub const ACCEPTED: Self = Self::only(Mode::Accepted);
    pub const MODERATION: Self = Self::only(Mode::Moderation);
    pub const ALL: Self = Self {
        accepted: true,
        moderation: true,
        deleted: true,
    };

    pub const fn only(mode: Mode) -> Self {
        Self {
            accepted: matches!(mode, Mode::Accepted),
            moderation: matches!(mode, Mode::Moderation),
            deleted: matches!(mode, Mode::Deleted),
        }
    }

    pub fn from_mask(mask: i64) -> Self {
        Self {
            accepted: mask & Mode::Accepted.as_i64() != 0,
            moderation: mask & Mode::Moderation.as_i64() != 0,
            deleted: mask & Mode::Deleted.as_i64() != 0,
        }
    }

    pub fn contains(self, mode: Mode) -> bool {
        match mode {
            Mode::Accepted => self.accepted,
            Mode::Moderation => self.moderation,
            Mode::Deleted => self.deleted,
        }
    }

    pub fn modes(self) -> impl Iterator<Item = Mode> {
        [Mode::Accepted, Mode::Moderation, Mode::Deleted]
            .into_iter()
            .filter(move |mode| self.contains(*mode))
    }

    pub fn is_empty(self) -> bool {
        !(self.accepted || self.moderation || self.deleted)
    }
}

/// A stored comment row. Deliberately not `Serialize`: email and remote
/// address must go through the renderer, which replaces them with a hash.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub thread_id: i64,
    pub id: i64,
    pub parent: Option<i64>,
    pub created: f64,
    pub modified: Option<f64>,
    pub mode: Mode,
    pub remote_addr: String,
    pub text: String,
    pub author: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub likes: i64,
    pub dislikes: i64,
    pub voters: VoterSet,
    pub notification: bool,
}

impl Comment {
    /// Value fed to the author hash: the email when given, else the address.
    pub fn identity(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.remote_addr)
    }
}

/// A comment about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub parent: Option<i64>,
    pub mode: Mode,
    pub remote_addr: String,
    pub text: String,
    pub author: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub notification: bool,
}

impl NewComment {
    /// Trims optional fields and rejects out-of-range values.
    pub fn validated(self) -> Result<Self, CoreError> {
        validate_text(&self.text)?;
        if let Some(parent) = self.parent {
            if parent <= 0 {
                return Err(CoreError::InvalidComment(
                    "parent must be an integer > 0".to_string(),
                ));
            }
        }
        Ok(Self {
            author: normalize_author(self.author)?,
            email: normalize_email(self.email)?,
            website: normalize_website(self.website)?,
            ..self
        })
    }
}

/// Mutable fields of an existing comment.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentEdit {
    pub text: String,
    pub author: Option<String>,
    pub website: Option<String>,
}

impl CommentEdit {
    pub fn validated(self) -> Result<Self, CoreError> {
        validate_text(&self.text)?;
        Ok(Self {
            text: self.text,
            author: normalize_author(self.author)?,
            website: normalize_website(self.website)?,
        })
    }
}

fn validate_text(text: &str) -> Result<(), CoreError> {
    let len = text.chars().count();
    if len < MIN_TEXT_LEN {
        return Err(CoreError::InvalidComment(format!(
            "text is too short (minimum length: {MIN_TEXT_LEN})"
        )));
    }
    if len > MAX_TEXT_LEN {
        return Err(CoreError::InvalidComment(format!(
            "text is too long (maximum length: {MAX_TEXT_LEN})"
        )));
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn normalize_author(value: Option<String>) -> Result<Option<String>, CoreError> {
    let Some(author) = non_blank(value) else {
        return Ok(None);
    };
    if author.chars().count() > MAX_AUTHOR_LEN {
        return Err(CoreError::InvalidComment("author name is too long".to_string()));
    }
    Ok(Some(author))
}

fn normalize_email(value: Option<String>) -> Result<Option<String>, CoreError> {
    let Some(email) = non_blank(value) else {
        return Ok(None);
    };
    if email.len() > MAX_EMAIL_LEN {
        return Err(CoreError::InvalidComment("email is too long".to_string()));
    }
    if !looks_like_email(&email) {
        return Err(CoreError::InvalidComment("invalid email".to_string()));
    }
    Ok(Some(email))
}

fn looks_like_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn normalize_website(value: Option<String>) -> Result<Option<String>, CoreError> {
    let Some(website) = non_blank(value) else {
        return Ok(None);
    };
    if website.len() > MAX_WEBSITE_LEN {
        return Err(CoreError::InvalidComment("website is too long".to_string()));
    }
    let website = if website.starts_with("http://") || website.starts_with("https://") {
        website
    } else {
        format!("http://{website}")
    };
    let parsed = Url::parse(&website)
        .map_err(|_| CoreError::InvalidComment("invalid website address".to_string()))?;
    if parsed.host_str().is_none_or(|host| !host.contains('.')) {
        return Err(CoreError::InvalidComment("invalid website address".to_string()));
    }
    Ok(Some(website))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(text: &str) -> NewComment {
        NewComment {
            parent: None,
            mode: Mode::Accepted,
            remote_addr: "127.0.0.1".to_string(),
            text: text.to_string(),
            author: None,
            email: None,
            website: None,
            notification: false,
        }
    }

    #[test]
    fn mode_round_trips_through_storage_values() {
        for mode in [Mode::Accepted, Mode::Moderation, Mode::Deleted] {
            assert_eq!(Mode::try_from(mode.as_i64()).unwrap(), mode);
        }
        assert!(Mode::try_from(5).is_err());
        assert!(Mode::try_from(0).is_err());
    }

    #[test]
    fn public_filter_matches_accepted_and_deleted() {
        let public = ModeFilter::from_mask(5);
        assert_eq!(public, ModeFilter::PUBLIC);
        assert!(public.contains(Mode::Accepted));
        assert!(public.contains(Mode::Deleted));
        assert!(!public.contains(Mode::Moderation));
        assert_eq!(
            public.modes().collect::<Vec<_>>(),
            vec![Mode::Accepted, Mode::Deleted]
        );
    }

    #[test]
    fn filter_membership_agrees_with_bitwise_rule() {
        for mask in 0..8i64 {
            let filter = ModeFilter::from_mask(mask);
            for mode in [Mode::Accepted, Mode::Moderation, Mode::Deleted] {
                assert_eq!(filter.contains(mode), (mask | mode.as_i64()) == mask);
            }
        }
        assert!(ModeFilter::from_mask(0).is_empty());
        assert_eq!(ModeFilter::from_mask(7), ModeFilter::ALL);
    }

    #[test]
    fn validated_rejects_short_text_and_bad_parent() {
        assert!(candidate("hi").validated().is_err());
        let mut with_parent = candidate("hello");
        with_parent.parent = Some(0);
        assert!(with_parent.validated().is_err());
    }

    #[test]
    fn validated_trims_and_drops_blank_fields() {
        let mut comment = candidate("hello");
        comment.author = Some("  Jane  ".to_string());
        comment.email = Some("   ".to_string());
        comment.website = Some(" example.com/blog ".to_string());
        let comment = comment.validated().unwrap();
        assert_eq!(comment.author.as_deref(), Some("Jane"));
        assert_eq!(comment.email, None);
        assert_eq!(comment.website.as_deref(), Some("http://example.com/blog"));
    }

    #[test]
    fn validated_rejects_malformed_email_and_website() {
        let mut comment = candidate("hello");
        comment.email = Some("not-an-email".to_string());
        assert!(comment.validated().is_err());

        let mut comment = candidate("hello");
        comment.website = Some("https://localhost".to_string());
        assert!(comment.validated().is_err());
    }

    #[test]
    fn edit_validation_keeps_text() {
        let edit = CommentEdit {
            text: "new body".to_string(),
            author: Some(" ".to_string()),
            website: None,
        }
        .validated()
        .unwrap();
        assert_eq!(edit.text, "new body");
        assert_eq!(edit.author, None);
    }

    #[test]
    fn identity_prefers_email() {
        let mut comment = Comment {
            thread_id: 1,
            id: 1,
            parent: None,
            created: 0.0,
            modified: None,
            mode: Mode::Accepted,
            remote_addr: "10.0.0.1".to_string(),
            text: "hello".to_string(),
            author: None,
            email: None,
            website: None,
            likes: 0,
            dislikes: 0,
            voters: VoterSet::new(),
            notification: false,
        };
        assert_eq!(comment.identity(), "10.0.0.1");
        comment.email = Some("jane@example.com".to_string());
        assert_eq!(comment.identity(), "jane@example.com");
    }
}
