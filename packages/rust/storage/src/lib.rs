//! libSQL storage layer (offline mode).
//!
//! The [`Storage`] struct wraps a local libSQL database holding post
//! summaries, extracted texts, and the retrieval corpus.
//!
//! **Access rules:**
//! - Update runs and imports: read-write via [`Storage::open`]
//! - Exports and inspection: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database, Transaction, params};
use tracing::{debug, info};

use postfeed_shared::{
    Document, PostArchive, PostId, PostStore, PostfeedError, RawText, Result, Summary,
};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

fn storage_err(e: libsql::Error) -> PostfeedError {
    PostfeedError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PostfeedError::io(parent, e))?;
        }

        let (db, conn) = Self::connect(path).await?;
        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PostfeedError::Storage(format!(
                "database not found: {}",
                path.display()
            )));
        }

        let (db, conn) = Self::connect(path).await?;
        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    async fn connect(path: &Path) -> Result<(Database, Connection)> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;
        Ok((db, conn))
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    PostfeedError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    pub async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            // Table doesn't exist yet
            Err(_) => 0,
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(PostfeedError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Summaries
    // -----------------------------------------------------------------------

    /// Get one summary by identifier.
    pub async fn get_summary(&self, id: &PostId) -> Result<Option<Summary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, url, title, summary FROM summaries WHERE id = ?1",
                params![id.as_str()],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_summary(&row)?)),
            None => Ok(None),
        }
    }

    /// Store many summaries in one transaction. Existing ids are overwritten.
    pub async fn store_summaries(&self, summaries: &[Summary]) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();

        let tx = self.conn.transaction().await.map_err(storage_err)?;
        let mut result = Ok(());
        for summary in summaries {
            result = upsert_summary(&tx, summary, &now).await;
            if result.is_err() {
                break;
            }
        }
        finish(tx, result).await?;

        info!(count = summaries.len(), "stored summaries");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Texts
    // -----------------------------------------------------------------------

    /// Stored raw text for `id`, if any.
    pub async fn get_text(&self, id: &PostId) -> Result<Option<RawText>> {
        let mut rows = self
            .conn
            .query("SELECT text FROM texts WHERE id = ?1", params![id.as_str()])
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(RawText {
                id: id.clone(),
                text: row.get::<String>(0).map_err(storage_err)?,
            })),
            None => Ok(None),
        }
    }
}

async fn upsert_summary(conn: &Connection, summary: &Summary, now: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO summaries (id, url, title, summary, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
           url = excluded.url,
           title = excluded.title,
           summary = excluded.summary",
        params![
            summary.id.as_str(),
            summary.url.as_str(),
            summary.title.as_str(),
            summary.summary.as_str(),
            now
        ],
    )
    .await
    .map_err(storage_err)?;
    Ok(())
}

/// Commit on success, roll back on error.
async fn finish(tx: Transaction, result: Result<()>) -> Result<()> {
    match result {
        Ok(()) => tx.commit().await.map_err(storage_err),
        Err(e) => {
            let _ = tx.rollback().await;
            Err(e)
        }
    }
}

async fn replace_documents(conn: &Connection, documents: &[Document]) -> Result<()> {
    conn.execute("DELETE FROM documents", params![])
        .await
        .map_err(storage_err)?;
    for (position, doc) in documents.iter().enumerate() {
        conn.execute(
            "INSERT INTO documents (position, metadata, text) VALUES (?1, ?2, ?3)",
            params![position as i64, doc.metadata.as_str(), doc.text.as_str()],
        )
        .await
        .map_err(storage_err)?;
    }
    Ok(())
}

fn row_to_summary(row: &libsql::Row) -> Result<Summary> {
    Ok(Summary {
        id: PostId::new(row.get::<String>(0).map_err(storage_err)?),
        url: row.get::<String>(1).map_err(storage_err)?,
        title: row.get::<String>(2).map_err(storage_err)?,
        summary: row.get::<String>(3).map_err(storage_err)?,
    })
}

#[async_trait]
impl PostStore for Storage {
    async fn list_ids(&self) -> Result<Vec<PostId>> {
        let mut rows = self
            .conn
            .query("SELECT id FROM summaries ORDER BY rowid", params![])
            .await
            .map_err(storage_err)?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            ids.push(PostId::new(row.get::<String>(0).map_err(storage_err)?));
        }
        debug!(count = ids.len(), "listed ids");
        Ok(ids)
    }

    async fn store_summary(&self, summary: &Summary) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        upsert_summary(&self.conn, summary, &now).await
    }

    async fn store_text(&self, id: &PostId, text: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO texts (id, text, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET text = excluded.text",
                params![id.as_str(), text, now.as_str()],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn get_documents(&self) -> Result<Vec<Document>> {
        let mut rows = self
            .conn
            .query(
                "SELECT metadata, text FROM documents ORDER BY position",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut documents = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            documents.push(Document {
                metadata: PostId::new(row.get::<String>(0).map_err(storage_err)?),
                text: row.get::<String>(1).map_err(storage_err)?,
            });
        }
        Ok(documents)
    }

    async fn store_documents(&self, documents: &[Document]) -> Result<()> {
        self.check_writable()?;

        let tx = self.conn.transaction().await.map_err(storage_err)?;
        let result = replace_documents(&tx, documents).await;
        finish(tx, result).await?;

        debug!(count = documents.len(), "stored corpus");
        Ok(())
    }
}

#[async_trait]
impl PostArchive for Storage {
    async fn list_summaries(&self) -> Result<Vec<Summary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, url, title, summary FROM summaries ORDER BY rowid",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut summaries = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            summaries.push(row_to_summary(&row)?);
        }
        Ok(summaries)
    }

    async fn load_text(&self, id: &PostId) -> Result<Option<String>> {
        Ok(self.get_text(id).await?.map(|raw| raw.text))
    }
}
