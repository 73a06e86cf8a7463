use std::time::SystemTime;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database,
    bson::{Bson, DateTime, doc},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
};

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoGameDocument, MongoPollDocument, game_id, poll_doc_id},
};
use crate::dao::{
    game_store::GameStore,
    models::{GameEntity, PollEntity},
    storage::StorageResult,
};
use crate::game::poll::PollKind;
use crate::game::role::{Faction, Role};
use crate::game::stage::Stage;

const GAME_COLLECTION_NAME: &str = "games";
const POLL_COLLECTION_NAME: &str = "polls";

/// MongoDB-backed [`GameStore`].
///
/// Every conditional operation maps to a single `findOneAndUpdate` (or
/// `findOneAndDelete`) so the server applies predicate and mutation
/// atomically.
#[derive(Clone)]
pub struct MongoGameStore {
    database: Database,
}

impl MongoGameStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (_client, database) =
            establish_connection(&config.options, &config.database_name).await?;
        let store = Self { database };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.games();
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"next_stage_time": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("game_deadline_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: GAME_COLLECTION_NAME,
                index: "next_stage_time",
                source,
            })?;

        Ok(())
    }

    fn games(&self) -> Collection<MongoGameDocument> {
        self.database
            .collection::<MongoGameDocument>(GAME_COLLECTION_NAME)
    }

    fn polls(&self) -> Collection<MongoPollDocument> {
        self.database
            .collection::<MongoPollDocument>(POLL_COLLECTION_NAME)
    }

    async fn create_game(&self, game: GameEntity) -> MongoResult<bool> {
        let chat = game.chat;
        let document: MongoGameDocument = game.into();
        match self.games().insert_one(&document).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::InsertGame { chat, source }),
        }
    }

    async fn find_game(&self, chat: i64) -> MongoResult<Option<GameEntity>> {
        let document = self
            .games()
            .find_one(game_id(chat))
            .await
            .map_err(|source| MongoDaoError::LoadGame { chat, source })?;
        Ok(document.map(Into::into))
    }

    async fn assign_role(
        &self,
        chat: i64,
        position: u32,
        player: i64,
        role: Role,
    ) -> MongoResult<Option<GameEntity>> {
        if position == 0 {
            return Ok(None);
        }
        let index = (position - 1) as i64;
        let filter = doc! {
            "_id": chat,
            "stage": Stage::Dealing.code(),
            format!("players.{index}.id"): player,
            format!("players.{index}.role"): Bson::Null,
        };
        let update = doc! {"$set": {format!("players.{index}.role"): role.as_str()}};

        let document = self
            .games()
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateGame { chat, source })?;
        Ok(document.map(Into::into))
    }

    async fn record_vote(
        &self,
        chat: i64,
        stage: i32,
        actor: i64,
        voter_position: u32,
        target: u32,
    ) -> MongoResult<Option<GameEntity>> {
        let filter = doc! {
            "_id": chat,
            "stage": stage,
            "played": {"$ne": actor},
            "players": {"$elemMatch": {"id": actor, "alive": true}},
        };
        let update = doc! {
            "$addToSet": {
                "played": actor,
                format!("vote.{target}"): voter_position,
            },
        };

        let document = self
            .games()
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateGame { chat, source })?;
        Ok(document.map(Into::into))
    }

    async fn record_check(
        &self,
        chat: i64,
        stage: i32,
        actor: i64,
        role: Role,
    ) -> MongoResult<Option<GameEntity>> {
        let filter = doc! {
            "_id": chat,
            "stage": stage,
            "played": {"$ne": actor},
            "players": {"$elemMatch": {"id": actor, "alive": true, "role": role.as_str()}},
        };
        let update = doc! {"$addToSet": {"played": actor}};

        let document = self
            .games()
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateGame { chat, source })?;
        Ok(document.map(Into::into))
    }

    async fn push_order(
        &self,
        chat: i64,
        stage: i32,
        actor: i64,
        target: u32,
    ) -> MongoResult<Option<GameEntity>> {
        let filter = doc! {
            "_id": chat,
            "stage": stage,
            "players": {"$elemMatch": {"id": actor, "alive": true, "role": Role::Don.as_str()}},
        };
        let update = doc! {"$addToSet": {"order": target}};

        let document = self
            .games()
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateGame { chat, source })?;
        Ok(document.map(Into::into))
    }

    async fn set_roster_message(&self, chat: i64, message: i64) -> MongoResult<Option<GameEntity>> {
        let update = doc! {"$set": {"roster_message": message}};
        let document = self
            .games()
            .find_one_and_update(game_id(chat), update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateGame { chat, source })?;
        Ok(document.map(Into::into))
    }

    async fn advance_stage(
        &self,
        chat: i64,
        expected: i32,
        next: i32,
        deadline: Option<SystemTime>,
        increment_day: bool,
    ) -> MongoResult<Option<GameEntity>> {
        let filter = doc! {"_id": chat, "stage": expected};
        let mut update = doc! {
            "$set": {
                "stage": next,
                "next_stage_time": deadline.map(DateTime::from_system_time),
                "played": [],
                "vote": {},
            },
        };
        if increment_day {
            update.insert("$inc", doc! {"day_count": 1});
        }

        let document = self
            .games()
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::Before)
            .await
            .map_err(|source| MongoDaoError::UpdateGame { chat, source })?;
        Ok(document.map(Into::into))
    }

    async fn set_player_alive(
        &self,
        chat: i64,
        position: u32,
        alive: bool,
    ) -> MongoResult<Option<GameEntity>> {
        if position == 0 {
            return Ok(None);
        }
        let index = (position - 1) as i64;
        // Bound the position, otherwise the positional $set would pad the
        // players array with nulls.
        let filter = doc! {
            "_id": chat,
            format!("players.{index}"): {"$exists": true},
        };
        let update = doc! {"$set": {format!("players.{index}.alive"): alive}};

        let document = self
            .games()
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateGame { chat, source })?;
        Ok(document.map(Into::into))
    }

    async fn due_games(&self, now: SystemTime) -> MongoResult<Vec<GameEntity>> {
        let filter = doc! {
            "next_stage_time": {
                "$ne": Bson::Null,
                "$lte": DateTime::from_system_time(now),
            },
        };
        let documents: Vec<MongoGameDocument> = self
            .games()
            .find(filter)
            .await
            .map_err(|source| MongoDaoError::ListDue { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListDue { source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn remove_game(&self, chat: i64) -> MongoResult<Option<GameEntity>> {
        let document = self
            .games()
            .find_one_and_delete(game_id(chat))
            .await
            .map_err(|source| MongoDaoError::DeleteGame { chat, source })?;
        Ok(document.map(Into::into))
    }

    async fn create_poll(&self, poll: PollEntity) -> MongoResult<bool> {
        let chat = poll.chat;
        let document: MongoPollDocument = poll.into();
        match self.polls().insert_one(&document).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::InsertPoll { chat, source }),
        }
    }

    async fn find_poll(&self, chat: i64, kind: PollKind) -> MongoResult<Option<PollEntity>> {
        let document = self
            .polls()
            .find_one(poll_doc_id(chat, kind))
            .await
            .map_err(|source| MongoDaoError::LoadPoll { chat, source })?;
        Ok(document.map(Into::into))
    }

    async fn record_poll_vote(
        &self,
        chat: i64,
        kind: PollKind,
        voter: i64,
        side: Option<Faction>,
    ) -> MongoResult<Option<PollEntity>> {
        // The counter path doubles as a shape guard: a side that does not
        // exist in the stored tally fails the match instead of creating a
        // stray field.
        let counter = match side {
            None => "tally.pooled.count",
            Some(Faction::Peace) => "tally.split.peace.count",
            Some(Faction::Mafia) => "tally.split.mafia.count",
        };
        let mut filter = poll_doc_id(chat, kind);
        filter.insert("votes", doc! {"$ne": voter});
        filter.insert(counter, doc! {"$exists": true});
        let update = doc! {
            "$addToSet": {"votes": voter},
            "$inc": {counter: 1},
        };

        let document = self
            .polls()
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdatePoll { chat, source })?;
        Ok(document.map(Into::into))
    }

    async fn remove_poll(&self, chat: i64, kind: PollKind) -> MongoResult<Option<PollEntity>> {
        let document = self
            .polls()
            .find_one_and_delete(poll_doc_id(chat, kind))
            .await
            .map_err(|source| MongoDaoError::DeletePoll { chat, source })?;
        Ok(document.map(Into::into))
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_err)) if write_err.code == 11_000
    )
}

impl GameStore for MongoGameStore {
    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.create_game(game).await.map_err(Into::into) })
    }

    fn find_game(&self, chat: i64) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game(chat).await.map_err(Into::into) })
    }

    fn assign_role(
        &self,
        chat: i64,
        position: u32,
        player: i64,
        role: Role,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .assign_role(chat, position, player, role)
                .await
                .map_err(Into::into)
        })
    }

    fn record_vote(
        &self,
        chat: i64,
        stage: i32,
        actor: i64,
        voter_position: u32,
        target: u32,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .record_vote(chat, stage, actor, voter_position, target)
                .await
                .map_err(Into::into)
        })
    }

    fn record_check(
        &self,
        chat: i64,
        stage: i32,
        actor: i64,
        role: Role,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .record_check(chat, stage, actor, role)
                .await
                .map_err(Into::into)
        })
    }

    fn push_order(
        &self,
        chat: i64,
        stage: i32,
        actor: i64,
        target: u32,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .push_order(chat, stage, actor, target)
                .await
                .map_err(Into::into)
        })
    }

    fn set_roster_message(
        &self,
        chat: i64,
        message: i64,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_roster_message(chat, message)
                .await
                .map_err(Into::into)
        })
    }

    fn advance_stage(
        &self,
        chat: i64,
        expected: i32,
        next: i32,
        deadline: Option<SystemTime>,
        increment_day: bool,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .advance_stage(chat, expected, next, deadline, increment_day)
                .await
                .map_err(Into::into)
        })
    }

    fn set_player_alive(
        &self,
        chat: i64,
        position: u32,
        alive: bool,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_player_alive(chat, position, alive)
                .await
                .map_err(Into::into)
        })
    }

    fn due_games(&self, now: SystemTime) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.due_games(now).await.map_err(Into::into) })
    }

    fn remove_game(&self, chat: i64) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.remove_game(chat).await.map_err(Into::into) })
    }

    fn create_poll(&self, poll: PollEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.create_poll(poll).await.map_err(Into::into) })
    }

    fn find_poll(
        &self,
        chat: i64,
        kind: PollKind,
    ) -> BoxFuture<'static, StorageResult<Option<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_poll(chat, kind).await.map_err(Into::into) })
    }

    fn record_poll_vote(
        &self,
        chat: i64,
        kind: PollKind,
        voter: i64,
        side: Option<Faction>,
    ) -> BoxFuture<'static, StorageResult<Option<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .record_poll_vote(chat, kind, voter, side)
                .await
                .map_err(Into::into)
        })
    }

    fn remove_poll(
        &self,
        chat: i64,
        kind: PollKind,
    ) -> BoxFuture<'static, StorageResult<Option<PollEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.remove_poll(chat, kind).await.map_err(Into::into) })
    }
}
