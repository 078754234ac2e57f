/// Error types for the social graph service
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("this action is not allowed on your own account")]
    SelfRelation,

    #[error("already following")]
    AlreadyFollowing,

    #[error("not following")]
    NotFollowing,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("you are not the author of this post")]
    NotAuthor,

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl GraphError {
    /// HTTP status the transport layer should answer with for this error kind.
    pub fn status_code(&self) -> u16 {
        match self {
            GraphError::NotFound(_) => 404,
            GraphError::SelfRelation | GraphError::InvalidInput(_) => 400,
            GraphError::NotAuthor => 403,
            GraphError::AlreadyFollowing | GraphError::NotFollowing => 409,
            GraphError::Storage(_) => 500,
        }
    }
}

/// Result type alias for service operations
pub type GraphResult<T> = Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_by_kind() {
        assert_eq!(GraphError::NotFound("account".into()).status_code(), 404);
        assert_eq!(GraphError::SelfRelation.status_code(), 400);
        assert_eq!(GraphError::AlreadyFollowing.status_code(), 409);
        assert_eq!(GraphError::NotFollowing.status_code(), 409);
        assert_eq!(GraphError::NotAuthor.status_code(), 403);
        assert_eq!(
            GraphError::Storage(anyhow::anyhow!("connection reset")).status_code(),
            500
        );
    }
}
