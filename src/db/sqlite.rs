// SQLite implementations of the repository traits
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use std::collections::HashSet;

use crate::db::models::*;
use crate::db::repository::*;
use crate::state::DbPool;

const PROFILE_COLUMNS: &str = "id, username, email, bio, avatar_url, role, is_admin, \
     involio_profile_url, twitter_url, instagram_url, linkedin_url, youtube_url, \
     discord_tag, tiktok_url, website_url, created_at";

const POST_COLUMNS: &str =
    "id, user_id, content, image_url, created_at, updated_at, likes_count, comments_count";

const COMMENT_COLUMNS: &str =
    "id, post_id, user_id, content, parent_comment_id, created_at, likes_count";

fn row_to_profile(row: &Row) -> rusqlite::Result<Profile> {
    let role: String = row.get(5)?;
    let role = role
        .parse::<Role>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, e.into()))?;

    Ok(Profile {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        bio: row.get(3)?,
        avatar_url: row.get(4)?,
        role,
        is_admin: row.get(6)?,
        links: SocialLinks {
            involio_profile_url: row.get(7)?,
            twitter_url: row.get(8)?,
            instagram_url: row.get(9)?,
            linkedin_url: row.get(10)?,
            youtube_url: row.get(11)?,
            discord_tag: row.get(12)?,
            tiktok_url: row.get(13)?,
            website_url: row.get(14)?,
        },
        created_at: row.get(15)?,
    })
}

fn row_to_post(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        image_url: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        likes_count: row.get(6)?,
        comments_count: row.get(7)?,
    })
}

fn row_to_comment(row: &Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
        content: row.get(3)?,
        parent_comment_id: row.get(4)?,
        created_at: row.get(5)?,
        likes_count: row.get(6)?,
    })
}

/// `?start, ?start+1, ...` for an IN list.
fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escape LIKE wildcards so user input matches literally.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

pub struct SqliteProfileRepository {
    pool: DbPool,
}

impl SqliteProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn update_one(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(sql, params)?;
        if rows == 0 {
            return Err(RepositoryError::NotFound("Profile".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for SqliteProfileRepository {
    async fn get(&self, id: &str) -> Result<Option<Profile>, RepositoryError> {
        let conn = self.pool.get()?;
        let profile = conn
            .query_row(
                &format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLUMNS),
                params![id],
                row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Profile>, RepositoryError> {
        let conn = self.pool.get()?;
        // username is declared COLLATE NOCASE
        let profile = conn
            .query_row(
                &format!("SELECT {} FROM profiles WHERE username = ?1", PROFILE_COLUMNS),
                params![username.trim()],
                row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    async fn summaries(&self, ids: &[String]) -> Result<Vec<ProfileSummary>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT id, username, avatar_url FROM profiles WHERE id IN ({})",
            placeholders(1, ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let summaries = stmt
            .query_map(params_from_iter(ids.iter()), |row| {
                Ok(ProfileSummary {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    avatar_url: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Profile>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM profiles WHERE username LIKE ?1 ESCAPE '\\' ORDER BY username LIMIT ?2",
            PROFILE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let profiles = stmt
            .query_map(params![like_pattern(query), limit as i64], row_to_profile)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(profiles)
    }

    async fn list_all(&self) -> Result<Vec<Profile>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM profiles ORDER BY username",
            PROFILE_COLUMNS
        ))?;
        let profiles = stmt
            .query_map([], row_to_profile)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(profiles)
    }

    async fn update_details(&self, id: &str, edit: &ProfileEdit) -> Result<(), RepositoryError> {
        let links = &edit.links;
        self.update_one(
            "UPDATE profiles SET bio = ?1, involio_profile_url = ?2, twitter_url = ?3,
                instagram_url = ?4, linkedin_url = ?5, youtube_url = ?6, discord_tag = ?7,
                tiktok_url = ?8, website_url = ?9
             WHERE id = ?10",
            params![
                edit.bio,
                links.involio_profile_url,
                links.twitter_url,
                links.instagram_url,
                links.linkedin_url,
                links.youtube_url,
                links.discord_tag,
                links.tiktok_url,
                links.website_url,
                id
            ],
        )
    }

    async fn set_avatar(&self, id: &str, avatar_url: &str) -> Result<(), RepositoryError> {
        self.update_one(
            "UPDATE profiles SET avatar_url = ?1 WHERE id = ?2",
            params![avatar_url, id],
        )
    }

    async fn set_email(&self, id: &str, email: &str) -> Result<(), RepositoryError> {
        self.update_one(
            "UPDATE profiles SET email = ?1 WHERE id = ?2",
            params![email, id],
        )
    }

    async fn set_role(&self, id: &str, role: Role) -> Result<(), RepositoryError> {
        self.update_one(
            "UPDATE profiles SET role = ?1 WHERE id = ?2",
            params![role.as_str(), id],
        )
    }

    async fn set_admin(&self, id: &str, is_admin: bool) -> Result<(), RepositoryError> {
        self.update_one(
            "UPDATE profiles SET is_admin = ?1 WHERE id = ?2",
            params![is_admin, id],
        )
    }
}

pub struct SqlitePostRepository {
    pool: DbPool,
}

impl SqlitePostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostRepository for SqlitePostRepository {
    async fn list_by_author(&self, user_id: &str) -> Result<Vec<Post>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM posts WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
            POST_COLUMNS
        ))?;
        let posts = stmt
            .query_map(params![user_id], row_to_post)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    async fn get(&self, id: &str) -> Result<Option<Post>, RepositoryError> {
        let conn = self.pool.get()?;
        let post = conn
            .query_row(
                &format!("SELECT {} FROM posts WHERE id = ?1", POST_COLUMNS),
                params![id],
                row_to_post,
            )
            .optional()?;
        Ok(post)
    }

    async fn insert(&self, post: &NewPost) -> Result<Post, RepositoryError> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();
        let created_at = Utc::now();

        conn.execute(
            "INSERT INTO posts (id, user_id, content, image_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, post.user_id, post.content, post.image_url, created_at],
        )?;

        Ok(Post {
            id,
            user_id: post.user_id.clone(),
            content: post.content.clone(),
            image_url: post.image_url.clone(),
            created_at,
            updated_at: None,
            likes_count: 0,
            comments_count: 0,
        })
    }

    async fn update_content(
        &self,
        id: &str,
        author_id: &str,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Post, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE posts SET content = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
            params![content, updated_at, id, author_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound(format!("Post {}", id)));
        }

        let post = conn.query_row(
            &format!("SELECT {} FROM posts WHERE id = ?1", POST_COLUMNS),
            params![id],
            row_to_post,
        )?;
        Ok(post)
    }

    async fn delete(&self, id: &str, author_id: &str) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM posts WHERE id = ?1 AND user_id = ?2",
            params![id, author_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound(format!("Post {}", id)));
        }
        Ok(())
    }

    async fn liked_post_ids(&self, user_id: &str) -> Result<HashSet<String>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT post_id FROM posts_likes WHERE user_id = ?1")?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<Result<HashSet<String>, _>>()?;
        Ok(ids)
    }

    async fn like(&self, post_id: &str, user_id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "INSERT OR IGNORE INTO posts_likes (post_id, user_id) VALUES (?1, ?2)",
            params![post_id, user_id],
        )?;
        Ok(rows > 0)
    }

    async fn unlike(&self, post_id: &str, user_id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM posts_likes WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
        )?;
        Ok(rows > 0)
    }
}

pub struct SqliteCommentRepository {
    pool: DbPool,
}

impl SqliteCommentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentRepository for SqliteCommentRepository {
    async fn top_level(&self, post_id: &str) -> Result<Vec<Comment>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM comments
             WHERE post_id = ?1 AND parent_comment_id IS NULL
             ORDER BY created_at ASC, rowid ASC",
            COMMENT_COLUMNS
        ))?;
        let comments = stmt
            .query_map(params![post_id], row_to_comment)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    async fn replies(&self, parent_comment_id: &str) -> Result<Vec<Comment>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM comments
             WHERE parent_comment_id = ?1
             ORDER BY created_at ASC, rowid ASC",
            COMMENT_COLUMNS
        ))?;
        let comments = stmt
            .query_map(params![parent_comment_id], row_to_comment)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    async fn get(&self, id: &str) -> Result<Option<Comment>, RepositoryError> {
        let conn = self.pool.get()?;
        let comment = conn
            .query_row(
                &format!("SELECT {} FROM comments WHERE id = ?1", COMMENT_COLUMNS),
                params![id],
                row_to_comment,
            )
            .optional()?;
        Ok(comment)
    }

    async fn insert(&self, comment: &NewComment) -> Result<Comment, RepositoryError> {
        let conn = self.pool.get()?;

        if let Some(parent_id) = &comment.parent_comment_id {
            let parent: Option<(String, Option<String>)> = conn
                .query_row(
                    "SELECT post_id, parent_comment_id FROM comments WHERE id = ?1",
                    params![parent_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            match parent {
                None => {
                    return Err(RepositoryError::NotFound(format!("Comment {}", parent_id)));
                }
                Some((_, Some(_))) => {
                    return Err(RepositoryError::Conflict(
                        "Replies cannot be nested more than one level deep".into(),
                    ));
                }
                Some((post_id, None)) if post_id != comment.post_id => {
                    return Err(RepositoryError::Conflict(
                        "Parent comment belongs to a different post".into(),
                    ));
                }
                Some(_) => {}
            }
        }

        let id = uuid::Uuid::now_v7().to_string();
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO comments (id, post_id, user_id, content, parent_comment_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                comment.post_id,
                comment.user_id,
                comment.content,
                comment.parent_comment_id,
                created_at
            ],
        )?;

        Ok(Comment {
            id,
            post_id: comment.post_id.clone(),
            user_id: comment.user_id.clone(),
            content: comment.content.clone(),
            parent_comment_id: comment.parent_comment_id.clone(),
            created_at,
            likes_count: 0,
        })
    }

    async fn delete(&self, id: &str, author_id: &str) -> Result<u64, RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let owned: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM comments WHERE id = ?1 AND user_id = ?2",
            params![id, author_id],
            |row| row.get(0),
        )?;
        if !owned {
            return Err(RepositoryError::NotFound(format!("Comment {}", id)));
        }

        // Replies go with their parent; explicit so the counter triggers fire per row
        let replies = tx.execute(
            "DELETE FROM comments WHERE parent_comment_id = ?1",
            params![id],
        )?;
        let removed = tx.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
        tx.commit()?;

        Ok((replies + removed) as u64)
    }

    async fn liked_comment_ids(
        &self,
        user_id: &str,
        comment_ids: &[String],
    ) -> Result<HashSet<String>, RepositoryError> {
        if comment_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT comment_id FROM comment_likes WHERE user_id = ?1 AND comment_id IN ({})",
            placeholders(2, comment_ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let values = std::iter::once(user_id).chain(comment_ids.iter().map(String::as_str));
        let ids = stmt
            .query_map(params_from_iter(values), |row| row.get(0))?
            .collect::<Result<HashSet<String>, _>>()?;
        Ok(ids)
    }

    async fn like(&self, comment_id: &str, user_id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "INSERT OR IGNORE INTO comment_likes (comment_id, user_id) VALUES (?1, ?2)",
            params![comment_id, user_id],
        )?;
        Ok(rows > 0)
    }

    async fn unlike(&self, comment_id: &str, user_id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM comment_likes WHERE comment_id = ?1 AND user_id = ?2",
            params![comment_id, user_id],
        )?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{seed_user, test_pool};

    fn new_post(user_id: &str, content: &str) -> NewPost {
        NewPost {
            user_id: user_id.into(),
            content: content.into(),
            image_url: None,
        }
    }

    fn new_comment(post_id: &str, user_id: &str, parent: Option<&str>) -> NewComment {
        NewComment {
            post_id: post_id.into(),
            user_id: user_id.into(),
            content: "nice".into(),
            parent_comment_id: parent.map(str::to_string),
        }
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("kow"), "%kow%");
        assert_eq!(like_pattern("50%_"), "%50\\%\\_%");
    }

    #[tokio::test]
    async fn find_by_username_ignores_case() {
        let pool = test_pool();
        seed_user(&pool, "u1", "Kowse", true);
        let repo = SqliteProfileRepository::new(pool);

        let found = repo.find_by_username("KOWSE").await.unwrap().unwrap();
        assert_eq!(found.id, "u1");
        assert!(found.is_admin);
        assert_eq!(found.role, Role::User);
        assert!(repo.find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_capped() {
        let pool = test_pool();
        seed_user(&pool, "u1", "Kowse", true);
        seed_user(&pool, "u2", "bigkow", false);
        seed_user(&pool, "u3", "alice", false);
        for i in 0..25 {
            seed_user(&pool, &format!("k{i}"), &format!("kow{i:02}"), false);
        }
        let repo = SqliteProfileRepository::new(pool);

        let results = repo.search("KOW", 20).await.unwrap();
        assert_eq!(results.len(), 20);
        assert!(results
            .iter()
            .all(|p| p.username.to_lowercase().contains("kow")));

        let few = repo.search("owse", 20).await.unwrap();
        assert_eq!(few.len(), 1);
        assert_eq!(few[0].username, "Kowse");
    }

    #[tokio::test]
    async fn summaries_skip_unknown_ids() {
        let pool = test_pool();
        seed_user(&pool, "u1", "alice", false);
        let repo = SqliteProfileRepository::new(pool);

        let summaries = repo
            .summaries(&["u1".to_string(), "ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].username, "alice");
        assert!(repo.summaries(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_role_on_missing_profile_is_not_found() {
        let repo = SqliteProfileRepository::new(test_pool());
        let err = repo.set_role("ghost", Role::Head).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn posts_are_listed_newest_first() {
        let pool = test_pool();
        seed_user(&pool, "u1", "alice", false);
        let repo = SqlitePostRepository::new(pool);

        let first = repo.insert(&new_post("u1", "first")).await.unwrap();
        let second = repo.insert(&new_post("u1", "second")).await.unwrap();

        let posts = repo.list_by_author("u1").await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id, second.id);
        assert_eq!(posts[1].id, first.id);
    }

    #[tokio::test]
    async fn update_and_delete_are_author_scoped() {
        let pool = test_pool();
        seed_user(&pool, "u1", "alice", false);
        seed_user(&pool, "u2", "bob", false);
        let repo = SqlitePostRepository::new(pool);
        let post = repo.insert(&new_post("u1", "mine")).await.unwrap();

        let err = repo
            .update_content(&post.id, "u2", "hijacked", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
        assert!(repo.delete(&post.id, "u2").await.is_err());

        let updated = repo
            .update_content(&post.id, "u1", "edited", Utc::now())
            .await
            .unwrap();
        assert_eq!(updated.content, "edited");
        assert!(updated.updated_at.is_some());

        repo.delete(&post.id, "u1").await.unwrap();
        assert!(repo.get(&post.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn like_is_idempotent_per_pair() {
        let pool = test_pool();
        seed_user(&pool, "u1", "alice", false);
        let repo = SqlitePostRepository::new(pool);
        let post = repo.insert(&new_post("u1", "hello")).await.unwrap();

        assert!(repo.like(&post.id, "u1").await.unwrap());
        assert!(!repo.like(&post.id, "u1").await.unwrap());
        assert_eq!(repo.get(&post.id).await.unwrap().unwrap().likes_count, 1);
        assert!(repo.liked_post_ids("u1").await.unwrap().contains(&post.id));

        assert!(repo.unlike(&post.id, "u1").await.unwrap());
        assert!(!repo.unlike(&post.id, "u1").await.unwrap());
        assert_eq!(repo.get(&post.id).await.unwrap().unwrap().likes_count, 0);
    }

    #[tokio::test]
    async fn replies_to_replies_are_rejected() {
        let pool = test_pool();
        seed_user(&pool, "u1", "alice", false);
        let posts = SqlitePostRepository::new(pool.clone());
        let comments = SqliteCommentRepository::new(pool);
        let post = posts.insert(&new_post("u1", "hello")).await.unwrap();

        let top = comments.insert(&new_comment(&post.id, "u1", None)).await.unwrap();
        let reply = comments
            .insert(&new_comment(&post.id, "u1", Some(&top.id)))
            .await
            .unwrap();
        let err = comments
            .insert(&new_comment(&post.id, "u1", Some(&reply.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn parent_must_belong_to_same_post() {
        let pool = test_pool();
        seed_user(&pool, "u1", "alice", false);
        let posts = SqlitePostRepository::new(pool.clone());
        let comments = SqliteCommentRepository::new(pool);
        let a = posts.insert(&new_post("u1", "a")).await.unwrap();
        let b = posts.insert(&new_post("u1", "b")).await.unwrap();

        let top = comments.insert(&new_comment(&a.id, "u1", None)).await.unwrap();
        let err = comments
            .insert(&new_comment(&b.id, "u1", Some(&top.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn deleting_parent_removes_replies_and_counts() {
        let pool = test_pool();
        seed_user(&pool, "u1", "alice", false);
        let posts = SqlitePostRepository::new(pool.clone());
        let comments = SqliteCommentRepository::new(pool);
        let post = posts.insert(&new_post("u1", "hello")).await.unwrap();

        let top = comments.insert(&new_comment(&post.id, "u1", None)).await.unwrap();
        comments
            .insert(&new_comment(&post.id, "u1", Some(&top.id)))
            .await
            .unwrap();
        comments
            .insert(&new_comment(&post.id, "u1", Some(&top.id)))
            .await
            .unwrap();
        assert_eq!(posts.get(&post.id).await.unwrap().unwrap().comments_count, 3);

        let removed = comments.delete(&top.id, "u1").await.unwrap();
        assert_eq!(removed, 3);
        assert!(comments.replies(&top.id).await.unwrap().is_empty());
        assert_eq!(posts.get(&post.id).await.unwrap().unwrap().comments_count, 0);
    }

    #[tokio::test]
    async fn liked_comment_ids_limited_to_requested() {
        let pool = test_pool();
        seed_user(&pool, "u1", "alice", false);
        let posts = SqlitePostRepository::new(pool.clone());
        let comments = SqliteCommentRepository::new(pool);
        let post = posts.insert(&new_post("u1", "hello")).await.unwrap();
        let c1 = comments.insert(&new_comment(&post.id, "u1", None)).await.unwrap();
        let c2 = comments.insert(&new_comment(&post.id, "u1", None)).await.unwrap();

        comments.like(&c1.id, "u1").await.unwrap();
        comments.like(&c2.id, "u1").await.unwrap();

        let liked = comments
            .liked_comment_ids("u1", &[c1.id.clone()])
            .await
            .unwrap();
        assert_eq!(liked.len(), 1);
        assert!(liked.contains(&c1.id));
        assert_eq!(comments.get(&c1.id).await.unwrap().unwrap().likes_count, 1);
    }
}
