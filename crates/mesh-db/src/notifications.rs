use crate::models::{NewNotification, NotificationRow, UserSummaryRow};
use crate::queries::OptionalExt;
use crate::Database;
use anyhow::Result;
use rusqlite::Row;

const NOTIFICATION_SELECT: &str = "
    SELECT n.id, n.recipient_id, n.sender_id, u.username, u.avatar, n.kind, n.post_id,
           n.message, n.is_read, n.created_at
    FROM notifications n
    JOIN users u ON u.id = n.sender_id";

impl Database {
    pub fn insert_notification(&self, notification: &NewNotification<'_>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, recipient_id, sender_id, kind, post_id, message, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    notification.id,
                    notification.recipient_id,
                    notification.sender_id,
                    notification.kind,
                    notification.post_id,
                    notification.message,
                    notification.created_at
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_notification(&self, id: &str) -> Result<Option<NotificationRow>> {
        self.with_conn(|conn| {
            let sql = format!("{NOTIFICATION_SELECT} WHERE n.id = ?1");
            conn.query_row(&sql, [id], notification_row).optional()
        })
    }

    /// Notifications for a recipient, newest first.
    pub fn get_notifications(&self, recipient_id: &str) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{NOTIFICATION_SELECT} WHERE n.recipient_id = ?1 ORDER BY n.created_at DESC, n.id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([recipient_id], notification_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Set the read flag. Returns false when no notification with this id
    /// belongs to the recipient. Re-marking a read notification matches the
    /// row again and changes nothing.
    pub fn mark_notification_read(&self, id: &str, recipient_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let matched = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND recipient_id = ?2",
                (id, recipient_id),
            )?;
            Ok(matched > 0)
        })
    }
}

fn notification_row(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        recipient_id: row.get(1)?,
        sender: UserSummaryRow {
            id: row.get(2)?,
            username: row.get(3)?,
            avatar: row.get(4)?,
        },
        kind: row.get(5)?,
        post_id: row.get(6)?,
        message: row.get(7)?,
        is_read: row.get(8)?,
        created_at: row.get(9)?,
    })
}
