//! Knowledge-base document storage plus full-text search via the `kb_documents_fts`
//! external-content FTS5 table (kept in sync by triggers declared in the migration).

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::models::KbDocument;
use crate::domain::types::Exchange;

pub struct KbRepo<'a> {
    pool: &'a SqlitePool,
}

pub struct KbSearchHit {
    pub doc_id: Uuid,
    pub title: String,
    pub snippet: String,
}

impl<'a> KbRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        doc_type: &str,
        title: &str,
        content: &str,
        source_url: Option<String>,
        symbol: Option<String>,
        exchange: Option<Exchange>,
        tags: Vec<String>,
    ) -> anyhow::Result<KbDocument> {
        let doc_id = Uuid::new_v4();
        let created_at = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO kb_documents (doc_id, doc_type, title, content, source_url, symbol, exchange, tags_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(doc_id.to_string())
        .bind(doc_type)
        .bind(title)
        .bind(content)
        .bind(&source_url)
        .bind(&symbol)
        .bind(exchange.map(|e| e.to_string()))
        .bind(serde_json::to_string(&tags)?)
        .bind(created_at.to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(KbDocument {
            doc_id,
            doc_type: doc_type.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            source_url,
            symbol,
            exchange,
            tags,
            created_at,
        })
    }

    /// `bm25()`-ranked full-text search with a highlighted `snippet()` excerpt.
    pub async fn search(&self, query: &str, limit: i64) -> anyhow::Result<Vec<KbSearchHit>> {
        let rows = sqlx::query(
            r#"
            SELECT kb_documents.doc_id AS doc_id, kb_documents.title AS title,
                   snippet(kb_documents_fts, 1, '[', ']', '...', 10) AS snippet
            FROM kb_documents_fts
            JOIN kb_documents ON kb_documents.rowid = kb_documents_fts.rowid
            WHERE kb_documents_fts MATCH ?
            ORDER BY bm25(kb_documents_fts)
            LIMIT ?
            "#,
        )
        .bind(query)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let doc_id: String = row.get("doc_id");
                Ok(KbSearchHit {
                    doc_id: Uuid::parse_str(&doc_id)?,
                    title: row.get("title"),
                    snippet: row.get("snippet"),
                })
            })
            .collect()
    }

    pub async fn get(&self, doc_id: Uuid) -> anyhow::Result<Option<KbDocument>> {
        let row = sqlx::query("SELECT * FROM kb_documents WHERE doc_id = ?")
            .bind(doc_id.to_string())
            .fetch_optional(self.pool)
            .await?;

        row.map(|row| {
            let doc_id: String = row.get("doc_id");
            let exchange: Option<String> = row.get("exchange");
            let tags: String = row.get("tags_json");
            let created_at: String = row.get("created_at");
            Ok(KbDocument {
                doc_id: Uuid::parse_str(&doc_id)?,
                doc_type: row.get("doc_type"),
                title: row.get("title"),
                content: row.get("content"),
                source_url: row.get("source_url"),
                symbol: row.get("symbol"),
                exchange: exchange.map(|e| e.parse()).transpose().map_err(|e: String| anyhow::anyhow!(e))?,
                tags: serde_json::from_str(&tags)?,
                created_at: created_at.parse()?,
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::Database;

    #[tokio::test]
    async fn search_finds_document_by_content_term() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = KbRepo::new(&db.pool);
        repo.create(
            "research_note",
            "Moutai pricing power",
            "Leading liquor maker with strong pricing power and a valuation near its historical midpoint",
            None,
            Some("600519".to_string()),
            Some(Exchange::Sse),
            vec!["liquor".to_string()],
        )
        .await
        .unwrap();

        let hits = repo.search("liquor", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Moutai pricing power");
    }
}
