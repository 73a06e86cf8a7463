//! Error types shared by the MongoDB storage implementation.

use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Convenient result alias returning [`MongoDaoError`] failures.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures that can occur while talking to MongoDB.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection URI could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    /// Building the client from parsed options failed.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    /// The server never answered the bootstrap ping.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    /// Creating a required index failed.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    /// Inserting a game document failed.
    #[error("failed to insert game for chat `{chat}`")]
    InsertGame {
        chat: i64,
        #[source]
        source: MongoError,
    },
    /// Loading a game document failed.
    #[error("failed to load game for chat `{chat}`")]
    LoadGame {
        chat: i64,
        #[source]
        source: MongoError,
    },
    /// A conditional game update failed outright.
    #[error("failed to update game for chat `{chat}`")]
    UpdateGame {
        chat: i64,
        #[source]
        source: MongoError,
    },
    /// Deleting a game document failed.
    #[error("failed to delete game for chat `{chat}`")]
    DeleteGame {
        chat: i64,
        #[source]
        source: MongoError,
    },
    /// Listing games with elapsed deadlines failed.
    #[error("failed to list games with elapsed deadlines")]
    ListDue {
        #[source]
        source: MongoError,
    },
    /// Inserting a poll document failed.
    #[error("failed to insert poll for chat `{chat}`")]
    InsertPoll {
        chat: i64,
        #[source]
        source: MongoError,
    },
    /// Loading a poll document failed.
    #[error("failed to load poll for chat `{chat}`")]
    LoadPoll {
        chat: i64,
        #[source]
        source: MongoError,
    },
    /// A conditional poll update failed outright.
    #[error("failed to update poll for chat `{chat}`")]
    UpdatePoll {
        chat: i64,
        #[source]
        source: MongoError,
    },
    /// Deleting a poll document failed.
    #[error("failed to delete poll for chat `{chat}`")]
    DeletePoll {
        chat: i64,
        #[source]
        source: MongoError,
    },
}
