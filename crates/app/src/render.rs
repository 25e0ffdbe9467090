use std::collections::HashSet;

use ammonia::Builder;
use pulldown_cmark::{html, Options, Parser};
use quill_core::domain::comments::Comment;
use quill_core::domain::replies::ReplyView;
use sha1::Sha1;
use sha2::Sha256;
use thiserror::Error;

const ALLOWED_TAGS: &[&str] = &[
    "a",
    "blockquote",
    "br",
    "code",
    "del",
    "em",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "hr",
    "img",
    "ins",
    "li",
    "ol",
    "p",
    "pre",
    "strong",
    "table",
    "tbody",
    "td",
    "th",
    "thead",
    "ul",
];

const DEFAULT_ITERATIONS: u32 = 1000;
const DEFAULT_KEY_LEN: usize = 6;
const MAX_KEY_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("invalid hash parameter {0}: {1}")]
    InvalidParameter(&'static str, String),
}

/// Markdown to sanitised HTML.
pub struct MarkdownRenderer {
    sanitizer: Builder<'static>,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let mut sanitizer = Builder::default();
        sanitizer.tags(ALLOWED_TAGS.iter().copied().collect::<HashSet<_>>());
        Self { sanitizer }
    }

    pub fn render(&self, text: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);
        let parser = Parser::new_ext(text, options);
        let mut html = String::with_capacity(text.len() * 3 / 2);
        html::push_html(&mut html, parser);
        self.sanitizer.clean(&html).to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HashDigest {
    Sha1,
    Sha256,
}

/// PBKDF2 hash that stands in for an author's email or address in output.
///
/// Configured as `pbkdf2[:iterations[:key_len[:digest]]]`, for example the
/// default `pbkdf2:1000:6:sha1`. The hex encoding is `2 * key_len` chars long.
#[derive(Debug, Clone)]
pub struct AuthorHasher {
    salt: Vec<u8>,
    iterations: u32,
    key_len: usize,
    digest: HashDigest,
}

impl AuthorHasher {
    pub fn from_spec(spec: &str, salt: &str) -> Result<Self, RenderError> {
        let mut parts = spec.trim().split(':');
        match parts.next() {
            Some("pbkdf2") => {}
            _ => return Err(RenderError::UnsupportedAlgorithm(spec.to_string())),
        }
        let iterations = match parts.next() {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or_else(|| RenderError::InvalidParameter("iterations", raw.to_string()))?,
            None => DEFAULT_ITERATIONS,
        };
        let key_len = match parts.next() {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|value| (1..=MAX_KEY_LEN).contains(value))
                .ok_or_else(|| RenderError::InvalidParameter("key_len", raw.to_string()))?,
            None => DEFAULT_KEY_LEN,
        };
        let digest = match parts.next() {
            None | Some("sha1") => HashDigest::Sha1,
            Some("sha256") => HashDigest::Sha256,
            Some(other) => return Err(RenderError::UnsupportedAlgorithm(other.to_string())),
        };
        Ok(Self {
            salt: salt.as_bytes().to_vec(),
            iterations,
            key_len,
            digest,
        })
    }

    pub fn hash(&self, value: &str) -> String {
        let mut out = vec![0u8; self.key_len];
        match self.digest {
            HashDigest::Sha1 => {
                pbkdf2::pbkdf2_hmac::<Sha1>(value.as_bytes(), &self.salt, self.iterations, &mut out)
            }
            HashDigest::Sha256 => pbkdf2::pbkdf2_hmac::<Sha256>(
                value.as_bytes(),
                &self.salt,
                self.iterations,
                &mut out,
            ),
        }
        hex::encode(out)
    }
}

/// Turns stored comments into reader-facing views.
pub struct CommentRenderer {
    markdown: MarkdownRenderer,
    hasher: AuthorHasher,
}

impl CommentRenderer {
    pub fn new(markdown: MarkdownRenderer, hasher: AuthorHasher) -> Self {
        Self { markdown, hasher }
    }

    /// `plain` keeps the raw markdown. Email and address are only ever
    /// emitted as their hash.
    pub fn view(&self, comment: &Comment, plain: bool) -> ReplyView {
        let text = if plain {
            comment.text.clone()
        } else {
            self.markdown.render(&comment.text)
        };
        ReplyView {
            id: comment.id,
            parent: comment.parent,
            text,
            author: comment.author.clone(),
            website: comment.website.clone(),
            mode: comment.mode.as_i64(),
            created: comment.created,
            modified: comment.modified,
            likes: comment.likes,
            dislikes: comment.dislikes,
            hash: self.hasher.hash(comment.identity()),
            total_replies: None,
            hidden_replies: None,
            replies: None,
        }
    }
}
