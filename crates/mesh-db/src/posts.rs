use crate::models::{FeedRow, NewPost, OriginalPostRow, PostRow, UserSummaryRow};
use crate::queries::{OptionalExt, like_pattern};
use crate::{Database, now_timestamp};
use anyhow::Result;
use rusqlite::{Connection, Row, ToSql};

/// Post columns plus per-post counters and viewer flags.
/// Every statement built on this must bind `:viewer`.
const FEED_SELECT: &str = "
    SELECT p.id, p.author_id, u.username, u.avatar, p.content, p.image_url, p.repost_of,
           p.created_at, p.updated_at,
           o.id, o.author_id, ou.username, ou.avatar, o.content, o.image_url, o.created_at,
           (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id) AS like_count,
           (SELECT COUNT(*) FROM posts r WHERE r.repost_of = p.id) AS repost_count,
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count,
           EXISTS (SELECT 1 FROM follows f
                   WHERE f.follower_id = :viewer AND f.followee_id = p.author_id) AS is_following,
           EXISTS (SELECT 1 FROM post_likes vl
                   WHERE vl.post_id = p.id AND vl.user_id = :viewer) AS liked_by_viewer,
           (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id)
             + (SELECT COUNT(*) FROM posts r WHERE r.repost_of = p.id) AS trending_score
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN posts o ON o.id = p.repost_of
    LEFT JOIN users ou ON ou.id = o.author_id";

impl Database {
    pub fn insert_post(&self, post: &NewPost<'_>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (id, author_id, content, image_url, repost_of, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                rusqlite::params![
                    post.id,
                    post.author_id,
                    post.content,
                    post.image_url,
                    post.repost_of,
                    post.created_at
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_post_author(&self, post_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT author_id FROM posts WHERE id = ?1", [post_id], |row| row.get(0))
                .optional()
        })
    }

    /// The id of `author_id`'s existing repost of `original_id`, if any.
    pub fn find_repost(&self, author_id: &str, original_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id FROM posts WHERE author_id = ?1 AND repost_of = ?2",
                (author_id, original_id),
                |row| row.get(0),
            )
            .optional()
        })
    }

    // -- Likes --

    /// Toggle a like: removes if present, inserts if not.
    /// Returns (liked, like_count) after the change.
    pub fn toggle_like(&self, post_id: &str, user_id: &str) -> Result<(bool, u64)> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
                (post_id, user_id),
            )?;

            if removed == 0 {
                conn.execute(
                    "INSERT INTO post_likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                    (post_id, user_id, now_timestamp()),
                )?;
            }

            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM post_likes WHERE post_id = ?1",
                [post_id],
                |row| row.get(0),
            )?;
            Ok((removed == 0, count as u64))
        })
    }

    // -- Feeds --

    /// Posts by the viewer and everyone the viewer follows, newest first.
    pub fn following_feed(&self, viewer_id: &str, limit: u32, offset: u32) -> Result<Vec<FeedRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{FEED_SELECT}
                 WHERE p.author_id = :viewer
                    OR p.author_id IN (SELECT followee_id FROM follows WHERE follower_id = :viewer)
                 ORDER BY p.created_at DESC, p.id DESC
                 LIMIT :limit OFFSET :offset"
            );
            query_feed(
                conn,
                &sql,
                rusqlite::named_params! { ":viewer": viewer_id, ":limit": limit, ":offset": offset },
            )
        })
    }

    /// Posts created at or after `since`, highest likes+reposts first.
    pub fn trending_feed(
        &self,
        viewer_id: &str,
        since: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<FeedRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{FEED_SELECT}
                 WHERE p.created_at >= :since
                 ORDER BY trending_score DESC, p.created_at DESC, p.id DESC
                 LIMIT :limit OFFSET :offset"
            );
            query_feed(
                conn,
                &sql,
                rusqlite::named_params! {
                    ":viewer": viewer_id,
                    ":since": since,
                    ":limit": limit,
                    ":offset": offset,
                },
            )
        })
    }

    pub fn posts_by_author(
        &self,
        viewer_id: &str,
        author_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<FeedRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{FEED_SELECT}
                 WHERE p.author_id = :author
                 ORDER BY p.created_at DESC, p.id DESC
                 LIMIT :limit OFFSET :offset"
            );
            query_feed(
                conn,
                &sql,
                rusqlite::named_params! {
                    ":viewer": viewer_id,
                    ":author": author_id,
                    ":limit": limit,
                    ":offset": offset,
                },
            )
        })
    }

    pub fn get_post(&self, viewer_id: &str, post_id: &str) -> Result<Option<FeedRow>> {
        self.with_conn(|conn| {
            let sql = format!("{FEED_SELECT} WHERE p.id = :id");
            let rows = query_feed(conn, &sql, rusqlite::named_params! { ":viewer": viewer_id, ":id": post_id })?;
            Ok(rows.into_iter().next())
        })
    }

    /// Case-insensitive substring match on post content or author username.
    pub fn search_posts(&self, viewer_id: &str, needle: &str, limit: u32) -> Result<Vec<FeedRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{FEED_SELECT}
                 WHERE p.content LIKE :pattern ESCAPE '\\'
                    OR u.username LIKE :pattern ESCAPE '\\'
                 ORDER BY p.created_at DESC, p.id DESC
                 LIMIT :limit"
            );
            let pattern = like_pattern(needle);
            query_feed(
                conn,
                &sql,
                rusqlite::named_params! { ":viewer": viewer_id, ":pattern": pattern, ":limit": limit },
            )
        })
    }
}

fn query_feed(conn: &Connection, sql: &str, params: &[(&str, &dyn ToSql)]) -> Result<Vec<FeedRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, feed_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn feed_row(row: &Row<'_>) -> rusqlite::Result<FeedRow> {
    let original = match row.get::<_, Option<String>>(9)? {
        Some(id) => Some(OriginalPostRow {
            id,
            author: UserSummaryRow {
                id: row.get(10)?,
                username: row.get(11)?,
                avatar: row.get(12)?,
            },
            content: row.get(13)?,
            image_url: row.get(14)?,
            created_at: row.get(15)?,
        }),
        None => None,
    };

    Ok(FeedRow {
        post: PostRow {
            id: row.get(0)?,
            author: UserSummaryRow {
                id: row.get(1)?,
                username: row.get(2)?,
                avatar: row.get(3)?,
            },
            content: row.get(4)?,
            image_url: row.get(5)?,
            repost_of: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        },
        original,
        like_count: row.get(16)?,
        repost_count: row.get(17)?,
        comment_count: row.get(18)?,
        is_following: row.get(19)?,
        liked_by_viewer: row.get(20)?,
    })
}
