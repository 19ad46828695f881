use crate::models::{CommentRow, NewComment, UserSummaryRow};
use crate::queries::OptionalExt;
use crate::Database;
use anyhow::Result;
use rusqlite::Row;

const COMMENT_SELECT: &str = "
    SELECT c.id, c.post_id, c.author_id, u.username, u.avatar, c.text, c.parent_id, c.created_at
    FROM comments c
    JOIN users u ON u.id = c.author_id";

impl Database {
    pub fn insert_comment(&self, comment: &NewComment<'_>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, post_id, author_id, text, parent_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    comment.id,
                    comment.post_id,
                    comment.author_id,
                    comment.text,
                    comment.parent_id,
                    comment.created_at
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_comment(&self, id: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!("{COMMENT_SELECT} WHERE c.id = ?1");
            conn.query_row(&sql, [id], comment_row).optional()
        })
    }

    /// Length of the reply chain ending at `id`, counting the comment itself
    /// and its ancestors. The walk stops at `limit`, which also bounds it if
    /// stored parent pointers loop.
    pub fn comment_chain_len(&self, id: &str, limit: u32) -> Result<u32> {
        self.with_conn(|conn| {
            let len: Option<u32> = conn.query_row(
                "WITH RECURSIVE chain(id, parent_id, depth) AS (
                     SELECT id, parent_id, 1 FROM comments WHERE id = ?1
                     UNION ALL
                     SELECT c.id, c.parent_id, chain.depth + 1
                     FROM comments c JOIN chain ON c.id = chain.parent_id
                     WHERE chain.depth < ?2
                 )
                 SELECT MAX(depth) FROM chain",
                (id, limit),
                |row| row.get(0),
            )?;
            Ok(len.unwrap_or(0))
        })
    }

    /// All comments on a post, oldest first.
    pub fn get_comments_for_post(&self, post_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!("{COMMENT_SELECT} WHERE c.post_id = ?1 ORDER BY c.created_at ASC, c.id ASC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([post_id], comment_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn comment_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author: UserSummaryRow {
            id: row.get(2)?,
            username: row.get(3)?,
            avatar: row.get(4)?,
        },
        text: row.get(5)?,
        parent_id: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewPost;
    use crate::now_timestamp;
    use crate::test_support::{db, user};

    #[test]
    fn comments_come_back_oldest_first() {
        let db = db();
        let alice = user(&db, "alice");
        let post_id = uuid::Uuid::new_v4().to_string();
        db.insert_post(&NewPost {
            id: &post_id,
            author_id: &alice,
            content: "post",
            image_url: None,
            repost_of: None,
            created_at: &now_timestamp(),
        })
        .unwrap();

        let first = uuid::Uuid::new_v4().to_string();
        let second = uuid::Uuid::new_v4().to_string();
        for (id, parent, ts) in [
            (&second, Some(first.as_str()), "2030-01-01T00:00:02.000000Z"),
            (&first, None, "2030-01-01T00:00:01.000000Z"),
        ] {
            db.insert_comment(&NewComment {
                id,
                post_id: &post_id,
                author_id: &alice,
                text: "hi",
                parent_id: parent,
                created_at: ts,
            })
            .unwrap();
        }

        let rows = db.get_comments_for_post(&post_id).unwrap();
        let got: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(got, vec![first.as_str(), second.as_str()]);
        assert_eq!(rows[1].parent_id.as_deref(), Some(first.as_str()));

        assert_eq!(db.comment_chain_len(&first, 10).unwrap(), 1);
        assert_eq!(db.comment_chain_len(&second, 10).unwrap(), 2);
        assert_eq!(db.comment_chain_len(&second, 1).unwrap(), 1);
        assert_eq!(db.comment_chain_len("missing", 10).unwrap(), 0);

        let fetched = db.get_comment(&second).unwrap().unwrap();
        assert_eq!(fetched.author.username, "alice");
        assert!(db.get_comment("missing").unwrap().is_none());
    }

    #[test]
    fn chain_walk_stops_at_limit_on_a_loop() {
        let db = db();
        let alice = user(&db, "alice");
        let post_id = uuid::Uuid::new_v4().to_string();
        db.insert_post(&NewPost {
            id: &post_id,
            author_id: &alice,
            content: "post",
            image_url: None,
            repost_of: None,
            created_at: &now_timestamp(),
        })
        .unwrap();

        let looped = uuid::Uuid::new_v4().to_string();
        db.insert_comment(&NewComment {
            id: &looped,
            post_id: &post_id,
            author_id: &alice,
            text: "me again",
            parent_id: Some(&looped),
            created_at: &now_timestamp(),
        })
        .unwrap();

        assert_eq!(db.comment_chain_len(&looped, 5).unwrap(), 5);
    }
}
