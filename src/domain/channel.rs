use std::fmt;
use std::str::FromStr;

/// Kinds of posts that carry comment threads.
///
/// This is the closed allow-list shared with the store schema: every variant maps to a
/// `<post_type>_id` column on `Comment` and a `<PostType>Like` table. Nothing outside this
/// enum is ever interpolated into statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PostType {
    Blog,
    Project,
}

impl PostType {
    pub const ALL: [PostType; 2] = [PostType::Blog, PostType::Project];

    // Wire tag used by clients.
    pub fn as_str(self) -> &'static str {
        match self {
            PostType::Blog => "blog",
            PostType::Project => "project",
        }
    }

    /// Foreign-key column on `Comment` for this post type.
    pub fn comment_column(self) -> &'static str {
        match self {
            PostType::Blog => "blog_id",
            PostType::Project => "project_id",
        }
    }

    /// Table holding likes for this post type.
    pub fn like_table(self) -> &'static str {
        match self {
            PostType::Blog => "BlogLike",
            PostType::Project => "ProjectLike",
        }
    }
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown post type `{0}`")]
pub struct UnknownPostType(pub String);

impl FromStr for PostType {
    type Err = UnknownPostType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        PostType::ALL
            .into_iter()
            .find(|post_type| post_type.as_str() == value)
            .ok_or_else(|| UnknownPostType(value.to_string()))
    }
}

/// Broadcast audience: every client subscribed to the same post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel {
    pub post_type: PostType,
    pub post_id: i64,
}

impl Channel {
    pub fn new(post_type: PostType, post_id: i64) -> Self {
        Self { post_type, post_id }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.post_type, self.post_id)
    }
}
