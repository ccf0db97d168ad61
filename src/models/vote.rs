use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Polarity of a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Like,
    Dislike,
}

impl Vote {
    /// Forms send `is_like=true` for a like; any other value is a dislike.
    pub fn from_form_value(is_like: &str) -> Self {
        if is_like == "true" {
            Vote::Like
        } else {
            Vote::Dislike
        }
    }

    pub fn from_is_like(is_like: bool) -> Self {
        if is_like { Vote::Like } else { Vote::Dislike }
    }

    pub fn is_like(self) -> bool {
        matches!(self, Vote::Like)
    }
}

/// The entity a vote applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum VoteTarget {
    Post(i64),
    Comment(i64),
}

impl VoteTarget {
    pub fn id(self) -> i64 {
        match self {
            VoteTarget::Post(id) | VoteTarget::Comment(id) => id,
        }
    }

    pub(crate) fn target_table(self) -> &'static str {
        match self {
            VoteTarget::Post(_) => "posts",
            VoteTarget::Comment(_) => "comments",
        }
    }

    pub(crate) fn vote_table(self) -> &'static str {
        match self {
            VoteTarget::Post(_) => "post_likes",
            VoteTarget::Comment(_) => "comment_likes",
        }
    }

    pub(crate) fn vote_column(self) -> &'static str {
        match self {
            VoteTarget::Post(_) => "post_id",
            VoteTarget::Comment(_) => "comment_id",
        }
    }
}

/// What a cast did to the stored vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteOutcome {
    Inserted,
    Flipped,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, FromRow)]
pub struct VoteCounts {
    pub likes: i64,
    pub dislikes: i64,
}

impl VoteCounts {
    pub fn total(&self) -> i64 {
        self.likes + self.dislikes
    }
}
