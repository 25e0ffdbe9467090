use crate::domain::comments::NewComment;

/// Window, in seconds, the rate limit counts comments over.
pub const RATE_WINDOW_SECS: f64 = 60.0;

/// Thresholds applied before a new comment is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardPolicy {
    pub enabled: bool,
    /// Maximum comments per address within [`RATE_WINDOW_SECS`].
    pub rate_limit: i64,
    /// Maximum top-level comments per address and thread.
    pub direct_reply: i64,
    /// Whether an author may answer their own comment while it is still editable.
    pub reply_to_self: bool,
    pub require_author: bool,
    pub require_email: bool,
    /// Edit window in seconds.
    pub max_age: f64,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_limit: 2,
            direct_reply: 3,
            reply_to_self: false,
            require_author: false,
            require_email: false,
            max_age: 900.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardVerdict {
    pub allowed: bool,
    pub reason: String,
}

impl GuardVerdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

impl GuardPolicy {
    pub fn check_required_fields(&self, candidate: &NewComment) -> GuardVerdict {
        if self.require_email && candidate.email.is_none() {
            return GuardVerdict::deny("email address required but not provided");
        }
        if self.require_author && candidate.author.is_none() {
            return GuardVerdict::deny("author name required but not provided");
        }
        GuardVerdict::allow()
    }

    pub fn check_rate(&self, remote_addr: &str, recent: i64) -> GuardVerdict {
        if recent > self.rate_limit {
            return GuardVerdict::deny(format!(
                "{remote_addr}: ratelimit exceeded ({recent} comments in {RATE_WINDOW_SECS}s)"
            ));
        }
        GuardVerdict::allow()
    }

    pub fn check_direct_replies(&self, uri: &str, existing: i64) -> GuardVerdict {
        if existing > self.direct_reply {
            return GuardVerdict::deny(format!("{existing} direct responses to {uri}"));
        }
        GuardVerdict::allow()
    }

    pub fn check_reply_to_self(&self, open_own_parent: i64) -> GuardVerdict {
        if !self.reply_to_self && open_own_parent > 0 {
            return GuardVerdict::deny("edit time frame is still open");
        }
        GuardVerdict::allow()
    }
}

#[cfg(test)]
mod tests {
    use super::{GuardPolicy, GuardVerdict};
    use crate::domain::comments::{Mode, NewComment};

    fn candidate() -> NewComment {
        NewComment {
            parent: None,
            mode: Mode::Accepted,
            remote_addr: "10.0.0.1".to_string(),
            text: "hello".to_string(),
            author: None,
            email: None,
            website: None,
            notification: false,
        }
    }

    #[test]
    fn required_fields_are_enforced_when_configured() {
        let policy = GuardPolicy {
            require_email: true,
            ..GuardPolicy::default()
        };
        assert!(!policy.check_required_fields(&candidate()).allowed);

        let policy = GuardPolicy {
            require_author: true,
            ..GuardPolicy::default()
        };
        let mut named = candidate();
        named.author = Some("jane".to_string());
        assert_eq!(policy.check_required_fields(&named), GuardVerdict::allow());
        assert!(!policy.check_required_fields(&candidate()).allowed);
    }

    #[test]
    fn rate_limit_rejects_only_above_threshold() {
        let policy = GuardPolicy {
            rate_limit: 5,
            ..GuardPolicy::default()
        };
        assert!(policy.check_rate("10.0.0.1", 5).allowed);
        let verdict = policy.check_rate("10.0.0.1", 6);
        assert!(!verdict.allowed);
        assert!(verdict.reason.contains("ratelimit exceeded"));
    }

    #[test]
    fn direct_reply_limit_reports_uri() {
        let policy = GuardPolicy::default();
        assert!(policy.check_direct_replies("/post", 3).allowed);
        let verdict = policy.check_direct_replies("/post", 4);
        assert_eq!(verdict.reason, "4 direct responses to /post");
    }

    #[test]
    fn reply_to_self_only_blocks_when_disabled() {
        let strict = GuardPolicy::default();
        assert!(!strict.check_reply_to_self(1).allowed);
        assert!(strict.check_reply_to_self(0).allowed);
        let lenient = GuardPolicy {
            reply_to_self: true,
            ..GuardPolicy::default()
        };
        assert!(lenient.check_reply_to_self(1).allowed);
    }
}
