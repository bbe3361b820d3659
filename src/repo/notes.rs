//! Freeform research notes attached to a symbol.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::models::Note;
use crate::domain::types::Exchange;

pub struct NotesRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> NotesRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        symbol: &str,
        exchange: Exchange,
        content: &str,
        references: Vec<String>,
    ) -> anyhow::Result<Note> {
        let note_id = Uuid::new_v4();
        let created_at = Utc::now();
        sqlx::query(
            "INSERT INTO notes (note_id, symbol, exchange, content, references_json, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(note_id.to_string())
        .bind(symbol)
        .bind(exchange.to_string())
        .bind(content)
        .bind(serde_json::to_string(&references)?)
        .bind(created_at.to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(Note {
            note_id,
            symbol: symbol.to_string(),
            exchange,
            content: content.to_string(),
            references,
            created_at,
        })
    }

    pub async fn list(&self, symbol: &str, exchange: Exchange, limit: i64) -> anyhow::Result<Vec<Note>> {
        let rows = sqlx::query(
            "SELECT * FROM notes WHERE symbol = ? AND exchange = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(symbol)
        .bind(exchange.to_string())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let exchange: String = row.get("exchange");
                let note_id: String = row.get("note_id");
                let references: String = row.get("references_json");
                let created_at: String = row.get("created_at");
                Ok(Note {
                    note_id: Uuid::parse_str(&note_id)?,
                    symbol: row.get("symbol"),
                    exchange: exchange.parse().map_err(|e: String| anyhow::anyhow!(e))?,
                    content: row.get("content"),
                    references: serde_json::from_str(&references)?,
                    created_at: created_at.parse()?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::Database;

    #[tokio::test]
    async fn create_then_list_returns_newest_first() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = NotesRepo::new(&db.pool);
        repo.create("600519", Exchange::Sse, "watching for pullback", vec![]).await.unwrap();
        let notes = repo.list("600519", Exchange::Sse, 10).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].content, "watching for pullback");
    }
}
