//! In-process `ContentRepo` adapter.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::repos::{ContentRepo, NewCommentParams, RepoError};
use crate::domain::entities::{
    Actor, CommentRecord, ContentCounters, ContentPatch, ContentResource, ReactionRecord,
};
use crate::domain::reactions::apply_delta;
use crate::domain::types::{ContentKind, CounterField, ReactionKind, Role};
use crate::util::clock::{Clock, SystemClock};

#[derive(Debug, Clone)]
struct ContentRow {
    kind: ContentKind,
    owner_id: Option<Uuid>,
    is_published: bool,
    article_id: Option<Uuid>,
    parent_id: Option<Uuid>,
    title: Option<String>,
    body: String,
    counters: ContentCounters,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, Role>,
    contents: HashMap<Uuid, ContentRow>,
    reactions: HashMap<(Uuid, Uuid), ReactionRecord>,
}

impl State {
    fn owner(&self, owner_id: Option<Uuid>) -> Option<(Uuid, Role)> {
        let id = owner_id?;
        self.users.get(&id).map(|role| (id, *role))
    }

    fn article_resource(&self, id: Uuid, row: &ContentRow) -> ContentResource {
        ContentResource::article(id, self.owner(row.owner_id), row.is_published)
    }

    fn row_mut(&mut self, id: Uuid) -> Result<&mut ContentRow, RepoError> {
        self.contents.get_mut(&id).ok_or(RepoError::NotFound)
    }

    /// `root` plus every reply reachable from it.
    fn thread_of(&self, root: Uuid) -> HashSet<Uuid> {
        let mut thread = HashSet::from([root]);
        let mut frontier = vec![root];
        while let Some(current) = frontier.pop() {
            for (id, row) in &self.contents {
                if row.parent_id == Some(current) && thread.insert(*id) {
                    frontier.push(*id);
                }
            }
        }
        thread
    }

    fn remove_contents(&mut self, ids: &HashSet<Uuid>) -> u64 {
        self.reactions
            .retain(|(target_id, _), _| !ids.contains(target_id));
        let before = self.contents.len();
        self.contents.retain(|id, _| !ids.contains(id));
        (before - self.contents.len()) as u64
    }
}

/// Reference adapter keeping everything in memory behind one lock, so each
/// call is atomic with respect to the others.
pub struct InMemoryContentRepo {
    state: RwLock<State>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryContentRepo {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl InMemoryContentRepo {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(State::default()),
            clock,
        }
    }

    pub async fn add_user(&self, role: Role) -> Actor {
        let actor = Actor::new(Uuid::new_v4(), role);
        self.state.write().await.users.insert(actor.id, role);
        actor
    }

    pub async fn remove_user(&self, id: Uuid) {
        self.state.write().await.users.remove(&id);
    }

    pub async fn add_article(&self, owner: Option<&Actor>, is_published: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.state.write().await.contents.insert(
            id,
            ContentRow {
                kind: ContentKind::Article,
                owner_id: owner.map(|actor| actor.id),
                is_published,
                article_id: None,
                parent_id: None,
                title: Some(String::new()),
                body: String::new(),
                counters: ContentCounters::default(),
            },
        );
        id
    }

    /// Seeds a comment and bumps the article's comment counter.
    pub async fn add_comment(
        &self,
        article_id: Uuid,
        author: &Actor,
        parent_id: Option<Uuid>,
    ) -> Result<Uuid, RepoError> {
        let record = self
            .insert_comment(NewCommentParams {
                article_id,
                parent_id,
                author_id: author.id,
                body: "seed".to_string(),
            })
            .await?;
        self.increment_counter(article_id, CounterField::Comments, 1)
            .await?;
        Ok(record.id)
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.state.read().await.contents.contains_key(&id)
    }

    pub async fn comment_ids(&self, article_id: Uuid) -> Vec<Uuid> {
        self.state
            .read()
            .await
            .contents
            .iter()
            .filter(|(_, row)| row.article_id == Some(article_id))
            .map(|(id, _)| *id)
            .collect()
    }

    pub async fn reaction_rows(&self, target_id: Uuid) -> Vec<ReactionRecord> {
        self.state
            .read()
            .await
            .reactions
            .values()
            .filter(|record| record.target_id == target_id)
            .cloned()
            .collect()
    }

    /// Title and body of a stored row.
    pub async fn text_of(&self, id: Uuid) -> Option<(Option<String>, String)> {
        self.state
            .read()
            .await
            .contents
            .get(&id)
            .map(|row| (row.title.clone(), row.body.clone()))
    }
}

#[async_trait]
impl ContentRepo for InMemoryContentRepo {
    async fn load_resource(&self, id: Uuid) -> Result<Option<ContentResource>, RepoError> {
        let state = self.state.read().await;
        let Some(row) = state.contents.get(&id) else {
            return Ok(None);
        };

        let resource = match row.kind {
            ContentKind::Article => state.article_resource(id, row),
            ContentKind::Comment => {
                let article_id = row
                    .article_id
                    .ok_or_else(|| RepoError::integrity(format!("comment {id} has no article")))?;
                let article_row = state.contents.get(&article_id).ok_or_else(|| {
                    RepoError::integrity(format!("comment {id} points at missing article"))
                })?;
                let article = state.article_resource(article_id, article_row);
                ContentResource::comment(id, state.owner(row.owner_id), &article, row.parent_id)
            }
        };
        Ok(Some(resource))
    }

    async fn actor_exists(&self, id: Uuid) -> Result<bool, RepoError> {
        Ok(self.state.read().await.users.contains_key(&id))
    }

    async fn find_reaction(
        &self,
        target_id: Uuid,
        actor_id: Uuid,
    ) -> Result<Option<ReactionRecord>, RepoError> {
        Ok(self
            .state
            .read()
            .await
            .reactions
            .get(&(target_id, actor_id))
            .cloned())
    }

    async fn save_reaction(&self, record: ReactionRecord) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        if !state.contents.contains_key(&record.target_id) {
            return Err(RepoError::NotFound);
        }
        state
            .reactions
            .insert((record.target_id, record.actor_id), record);
        Ok(())
    }

    async fn delete_reaction(&self, id: Uuid) -> Result<(), RepoError> {
        self.state
            .write()
            .await
            .reactions
            .retain(|_, record| record.id != id);
        Ok(())
    }

    async fn count_reactions(
        &self,
        target_id: Uuid,
        kind: ReactionKind,
    ) -> Result<u64, RepoError> {
        Ok(self
            .state
            .read()
            .await
            .reactions
            .values()
            .filter(|record| record.target_id == target_id && record.kind == kind)
            .count() as u64)
    }

    async fn increment_counter(
        &self,
        id: Uuid,
        field: CounterField,
        delta: i64,
    ) -> Result<u64, RepoError> {
        let mut state = self.state.write().await;
        let counters = &mut state.row_mut(id)?.counters;
        let slot = match field {
            CounterField::Likes => &mut counters.likes,
            CounterField::Dislikes => &mut counters.dislikes,
            CounterField::Views => &mut counters.views,
            CounterField::Comments => &mut counters.comments,
        };
        let (value, _) = apply_delta(*slot, delta);
        *slot = value;
        Ok(value)
    }

    async fn reset_counter(
        &self,
        id: Uuid,
        field: CounterField,
        value: u64,
    ) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        let counters = &mut state.row_mut(id)?.counters;
        match field {
            CounterField::Likes => counters.likes = value,
            CounterField::Dislikes => counters.dislikes = value,
            CounterField::Views => counters.views = value,
            CounterField::Comments => counters.comments = value,
        }
        Ok(())
    }

    async fn counters(&self, id: Uuid) -> Result<ContentCounters, RepoError> {
        self.state
            .read()
            .await
            .contents
            .get(&id)
            .map(|row| row.counters)
            .ok_or(RepoError::NotFound)
    }

    async fn cascade_delete_comments_for_article(
        &self,
        article_id: Uuid,
    ) -> Result<u64, RepoError> {
        let mut state = self.state.write().await;
        let comments: HashSet<Uuid> = state
            .contents
            .iter()
            .filter(|(_, row)| row.article_id == Some(article_id))
            .map(|(id, _)| *id)
            .collect();
        Ok(state.remove_contents(&comments))
    }

    async fn update_content(&self, id: Uuid, patch: &ContentPatch) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        let row = state.row_mut(id)?;
        if let Some(title) = patch.title.as_ref() {
            if row.kind == ContentKind::Comment {
                return Err(RepoError::integrity("comments have no title"));
            }
            row.title = Some(title.clone());
        }
        if let Some(body) = patch.body.as_ref() {
            row.body = body.clone();
        }
        Ok(())
    }

    async fn delete_content(&self, id: Uuid) -> Result<u64, RepoError> {
        let mut state = self.state.write().await;
        let kind = state.contents.get(&id).ok_or(RepoError::NotFound)?.kind;
        let doomed = match kind {
            ContentKind::Article => {
                let mut doomed: HashSet<Uuid> = state
                    .contents
                    .iter()
                    .filter(|(_, row)| row.article_id == Some(id))
                    .map(|(comment_id, _)| *comment_id)
                    .collect();
                doomed.insert(id);
                doomed
            }
            ContentKind::Comment => state.thread_of(id),
        };
        Ok(state.remove_contents(&doomed))
    }

    async fn insert_comment(&self, params: NewCommentParams) -> Result<CommentRecord, RepoError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        let author_role = *state
            .users
            .get(&params.author_id)
            .ok_or(RepoError::NotFound)?;
        match state.contents.get(&params.article_id) {
            Some(row) if row.kind == ContentKind::Article => {}
            Some(_) => return Err(RepoError::integrity("comments attach to articles only")),
            None => return Err(RepoError::NotFound),
        }
        if let Some(parent_id) = params.parent_id {
            let parent = state.contents.get(&parent_id).ok_or(RepoError::NotFound)?;
            if parent.article_id != Some(params.article_id) {
                return Err(RepoError::integrity(
                    "parent comment belongs to another article",
                ));
            }
        }

        let record = CommentRecord {
            id: Uuid::new_v4(),
            article_id: params.article_id,
            parent_id: params.parent_id,
            author_id: params.author_id,
            author_role,
            body: params.body,
            created_at: now,
            updated_at: now,
        };
        state.contents.insert(
            record.id,
            ContentRow {
                kind: ContentKind::Comment,
                owner_id: Some(record.author_id),
                is_published: true,
                article_id: Some(record.article_id),
                parent_id: record.parent_id,
                title: None,
                body: record.body.clone(),
                counters: ContentCounters::default(),
            },
        );
        Ok(record)
    }

    async fn set_published(&self, article_id: Uuid, published: bool) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        let row = state.row_mut(article_id)?;
        if row.kind != ContentKind::Article {
            return Err(RepoError::integrity("only articles can be published"));
        }
        row.is_published = published;
        Ok(())
    }
}
