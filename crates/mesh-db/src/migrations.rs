use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            is_verified INTEGER NOT NULL DEFAULT 0,
            avatar      TEXT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        -- One row per edge: follower_id follows followee_id.
        -- Both the followers and the following list are read from here.
        CREATE TABLE IF NOT EXISTS follows (
            follower_id TEXT NOT NULL REFERENCES users(id),
            followee_id TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            PRIMARY KEY (follower_id, followee_id)
        );

        CREATE INDEX IF NOT EXISTS idx_follows_followee
            ON follows(followee_id);

        CREATE TABLE IF NOT EXISTS posts (
            id          TEXT PRIMARY KEY,
            author_id   TEXT NOT NULL REFERENCES users(id),
            content     TEXT NOT NULL DEFAULT '',
            image_url   TEXT,
            repost_of   TEXT REFERENCES posts(id),
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_posts_author
            ON posts(author_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_posts_created
            ON posts(created_at);

        CREATE INDEX IF NOT EXISTS idx_posts_repost_of
            ON posts(repost_of);

        CREATE UNIQUE INDEX IF NOT EXISTS idx_posts_one_repost_per_author
            ON posts(author_id, repost_of) WHERE repost_of IS NOT NULL;

        CREATE TABLE IF NOT EXISTS post_likes (
            post_id     TEXT NOT NULL REFERENCES posts(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            PRIMARY KEY (post_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS comments (
            id          TEXT PRIMARY KEY,
            post_id     TEXT NOT NULL REFERENCES posts(id),
            author_id   TEXT NOT NULL REFERENCES users(id),
            text        TEXT NOT NULL,
            parent_id   TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id, created_at);

        CREATE TABLE IF NOT EXISTS notifications (
            id              TEXT PRIMARY KEY,
            recipient_id    TEXT NOT NULL REFERENCES users(id),
            sender_id       TEXT NOT NULL REFERENCES users(id),
            kind            TEXT NOT NULL,
            post_id         TEXT REFERENCES posts(id),
            message         TEXT NOT NULL,
            is_read         INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_recipient
            ON notifications(recipient_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();
    }
}
