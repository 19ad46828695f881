use crate::models::{NewUser, UserRow, UserSummaryRow, UserUpdate};
use crate::{Database, now_timestamp};
use anyhow::Result;
use rusqlite::{Connection, Row};

const USERNAME_BATCH: usize = 500;

const USER_COLUMNS: &str =
    "id, username, email, password, is_verified, avatar, created_at, updated_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser<'_>) -> Result<()> {
        self.with_conn(|conn| {
            let now = now_timestamp();
            conn.execute(
                "INSERT INTO users (id, username, email, password, avatar, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                rusqlite::params![
                    user.id,
                    user.username,
                    user.email,
                    user.password_hash,
                    user.avatar,
                    now
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    /// Resolve usernames to user summaries. Unknown names are skipped.
    pub fn get_users_by_usernames(&self, usernames: &[String]) -> Result<Vec<UserSummaryRow>> {
        if usernames.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let mut found = Vec::with_capacity(usernames.len());

            // Keep each statement well under SQLite's bound-variable limit.
            for batch in usernames.chunks(USERNAME_BATCH) {
                let placeholders: Vec<String> = (1..=batch.len()).map(|i| format!("?{}", i)).collect();
                let sql = format!(
                    "SELECT id, username, avatar FROM users WHERE username IN ({})",
                    placeholders.join(", ")
                );

                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(batch.iter()), summary_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                found.extend(rows);
            }

            Ok(found)
        })
    }

    pub fn update_user(&self, id: &str, update: &UserUpdate<'_>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET
                    username = COALESCE(?2, username),
                    email = COALESCE(?3, email),
                    avatar = COALESCE(?4, avatar),
                    updated_at = ?5
                 WHERE id = ?1",
                rusqlite::params![id, update.username, update.email, update.avatar, now_timestamp()],
            )?;
            Ok(())
        })
    }

    /// Case-insensitive substring match on usernames.
    pub fn search_users(&self, needle: &str, limit: u32) -> Result<Vec<UserSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, avatar FROM users
                 WHERE username LIKE ?1 ESCAPE '\\'
                 ORDER BY username
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![like_pattern(needle), limit], summary_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Follow graph --

    /// Toggle the follow edge follower -> followee.
    /// Returns true when the edge now exists.
    pub fn toggle_follow(&self, follower_id: &str, followee_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
                (follower_id, followee_id),
            )?;
            if removed > 0 {
                return Ok(false);
            }

            conn.execute(
                "INSERT INTO follows (follower_id, followee_id, created_at) VALUES (?1, ?2, ?3)",
                (follower_id, followee_id, now_timestamp()),
            )?;
            Ok(true)
        })
    }

    pub fn is_following(&self, follower_id: &str, followee_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = ?1 AND followee_id = ?2)",
                (follower_id, followee_id),
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Returns (follower_count, following_count).
    pub fn follow_counts(&self, user_id: &str) -> Result<(u64, u64)> {
        self.with_conn(|conn| {
            let counts = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM follows WHERE followee_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE follower_id = ?1)",
                [user_id],
                |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64)),
            )?;
            Ok(counts)
        })
    }

    pub fn get_followers(&self, user_id: &str) -> Result<Vec<UserSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.avatar
                 FROM follows f JOIN users u ON u.id = f.follower_id
                 WHERE f.followee_id = ?1
                 ORDER BY f.created_at DESC",
            )?;
            let rows = stmt
                .query_map([user_id], summary_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_following(&self, user_id: &str) -> Result<Vec<UserSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.avatar
                 FROM follows f JOIN users u ON u.id = f.followee_id
                 WHERE f.follower_id = ?1
                 ORDER BY f.created_at DESC",
            )?;
            let rows = stmt
                .query_map([user_id], summary_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                is_verified: row.get(4)?,
                avatar: row.get(5)?,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<UserSummaryRow> {
    Ok(UserSummaryRow {
        id: row.get(0)?,
        username: row.get(1)?,
        avatar: row.get(2)?,
    })
}

/// Build a `%needle%` LIKE pattern with `%`, `_` and `\` escaped.
pub(crate) fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
