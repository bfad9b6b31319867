use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{Category, ModuleIdentity, RawEvent};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Row, Sqlite, Transaction};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{
    ModuleUsage, Result, Tier, UsageQuery, UsageStoreError,
    store::{RawEventStream, UsageStore},
};

/// Capacity of the queue in front of the writer task.
const WRITE_QUEUE_CAPACITY: usize = 1024;

/// Raw events fetched per round trip while streaming the log.
const READ_PAGE_SIZE: i64 = 1000;

/// Connection string for a private in-memory database.
pub const IN_MEMORY: &str = "sqlite::memory:";

struct RecordRequest {
    event: RawEvent,
    module: Option<ModuleIdentity>,
    reply: oneshot::Sender<Result<()>>,
}

enum WriterMessage {
    Record(RecordRequest),
    /// Stop accepting records once everything queued so far is written.
    Close,
}

#[derive(Clone)]
struct Writer {
    sender: mpsc::Sender<WriterMessage>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

/// SQLite-backed usage store implementation.
///
/// Reads go straight to the connection pool. Every `record` is handed to a
/// single writer task over a channel and applied there inside a transaction,
/// so the read-modify-write upserts are totally ordered. A caller that stops
/// waiting does not abort its write; the writer finishes it regardless, and
/// [`SqliteUsageStore::close`] waits for it.
#[derive(Clone)]
pub struct SqliteUsageStore {
    pool: SqlitePool,
    writer: Option<Writer>,
}

impl SqliteUsageStore {
    /// Opens (creating if needed) a store backed by the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        tracing::info!(path = %path.display(), "opened usage store");
        Self::from_pool(pool).await
    }

    /// Opens an existing database for reading only, as a replay source.
    ///
    /// The file is left exactly as found: the journal mode is not touched, no
    /// schema is created and no writer is started, so `record` fails with
    /// [`UsageStoreError::ReadOnly`]. Only an `events` table is needed, which
    /// lets logs written by older collectors be replayed.
    pub async fn open_read_only(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        tracing::info!(path = %path.display(), "opened usage store read-only");
        Ok(Self { pool, writer: None })
    }

    /// Opens a private in-memory store, used for staging imports.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str(IN_MEMORY)?;

        // The database lives only as long as its one connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Creates the schema if needed and starts the writer task.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        Self::create_schema(&pool).await?;

        let (sender, messages) = mpsc::channel(WRITE_QUEUE_CAPACITY);
        let task = tokio::spawn(run_writer(pool.clone(), messages));

        Ok(Self {
            pool,
            writer: Some(Writer {
                sender,
                task: Arc::new(Mutex::new(Some(task))),
            }),
        })
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Stops accepting records, waits for every queued record to be
    /// written, then closes the pool.
    ///
    /// Applies to all clones of this store.
    pub async fn close(&self) {
        if let Some(writer) = &self.writer {
            // Records queued before the marker are still written.
            let _ = writer.sender.send(WriterMessage::Close).await;

            let task = writer.task.lock().await.take();
            if let Some(task) = task
                && let Err(err) = task.await
            {
                tracing::error!(error = %err, "usage store writer failed");
            }
        }

        self.pool.close().await;
    }

    /// Returns the number of module-tier rows in each category.
    pub async fn module_counts(&self) -> Result<Vec<(Category, u64)>> {
        let mut counts = Vec::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            let sql = format!("SELECT COUNT(*) FROM {}_modules", category.as_str());
            let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
            counts.push((category, count as u64));
        }
        Ok(counts)
    }

    async fn create_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::raw_sql(include_str!("../migrations/001_create_usage_tables.sql"))
            .execute(pool)
            .await?;
        Ok(())
    }

    fn row_to_event(row: &SqliteRow) -> Result<RawEvent> {
        Ok(RawEvent {
            user: row.try_get("username")?,
            command: row.try_get("command")?,
            source_ip: row.try_get("ip")?,
            timestamp: row.try_get("time")?,
        })
    }

    fn row_to_usage(row: SqliteRow) -> Result<ModuleUsage> {
        Ok(ModuleUsage {
            module: row.try_get("module")?,
            user: row.try_get("username")?,
            count: row.try_get("count")?,
            first_use: row.try_get("firstuse")?,
            last_use: row.try_get("lastuse")?,
        })
    }
}

async fn last_event_seq(pool: &SqlitePool) -> Result<i64> {
    let seq = sqlx::query_scalar("SELECT COALESCE(MAX(rowid), 0) FROM events")
        .fetch_one(pool)
        .await?;
    Ok(seq)
}

/// Reads up to one page of events with sequence numbers in `(after, until]`.
async fn read_event_page(
    pool: &SqlitePool,
    after: i64,
    until: i64,
) -> Result<Vec<(i64, RawEvent)>> {
    // Older logs declared the text columns with NUMERIC affinity, so a purely
    // numeric command or address may be stored as a number.
    let rows = sqlx::query(
        "SELECT rowid AS seq, \
         COALESCE(CAST(username AS TEXT), '') AS username, \
         COALESCE(CAST(command AS TEXT), '') AS command, \
         COALESCE(CAST(ip AS TEXT), '') AS ip, \
         COALESCE(CAST(time AS INTEGER), 0) AS time \
         FROM events WHERE rowid > ? AND rowid <= ? ORDER BY rowid ASC LIMIT ?",
    )
    .bind(after)
    .bind(until)
    .bind(READ_PAGE_SIZE)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| Ok((row.try_get("seq")?, SqliteUsageStore::row_to_event(row)?)))
        .collect()
}

async fn run_writer(pool: SqlitePool, mut messages: mpsc::Receiver<WriterMessage>) {
    while let Some(message) = messages.recv().await {
        match message {
            WriterMessage::Record(request) => {
                let result = write_record(&pool, &request.event, request.module.as_ref()).await;
                // The caller may have gone away; the write stands either way.
                let _ = request.reply.send(result);
            }
            // Refuses new sends; whatever is already buffered is still received.
            WriterMessage::Close => messages.close(),
        }
    }

    tracing::debug!("usage store writer stopped");
}

async fn write_record(
    pool: &SqlitePool,
    event: &RawEvent,
    module: Option<&ModuleIdentity>,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO events (username, command, ip, time) VALUES (?, ?, ?, ?)")
        .bind(&event.user)
        .bind(&event.command)
        .bind(&event.source_ip)
        .bind(event.timestamp)
        .execute(&mut *tx)
        .await?;

    if let Some(module) = module {
        upsert_usage(&mut tx, module, &event.user, event.timestamp).await?;
    }

    tx.commit().await?;
    Ok(())
}

async fn upsert_usage(
    tx: &mut Transaction<'_, Sqlite>,
    module: &ModuleIdentity,
    user: &str,
    timestamp: i64,
) -> Result<()> {
    let prefix = module.category().as_str();

    let upsert_module = format!(
        "INSERT INTO {prefix}_modules (module, firstuse, lastuse) VALUES (?, ?, ?) \
         ON CONFLICT (module) DO UPDATE SET count = count + 1, \
         firstuse = MIN(firstuse, excluded.firstuse), lastuse = MAX(lastuse, excluded.lastuse)"
    );
    sqlx::query(&upsert_module)
        .bind(module.name())
        .bind(timestamp)
        .bind(timestamp)
        .execute(&mut **tx)
        .await?;

    let upsert_user = format!(
        "INSERT INTO {prefix}_usermodules (module, username, firstuse, lastuse) VALUES (?, ?, ?, ?) \
         ON CONFLICT (module, username) DO UPDATE SET count = count + 1, \
         firstuse = MIN(firstuse, excluded.firstuse), lastuse = MAX(lastuse, excluded.lastuse)"
    );
    sqlx::query(&upsert_user)
        .bind(module.name())
        .bind(user)
        .bind(timestamp)
        .bind(timestamp)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

#[async_trait]
impl UsageStore for SqliteUsageStore {
    async fn record(&self, event: RawEvent, module: Option<ModuleIdentity>) -> Result<()> {
        let Some(writer) = &self.writer else {
            return Err(UsageStoreError::ReadOnly);
        };
        let (reply, response) = oneshot::channel();

        writer
            .sender
            .send(WriterMessage::Record(RecordRequest {
                event,
                module,
                reply,
            }))
            .await
            .map_err(|_| UsageStoreError::WriterClosed)?;

        response.await.map_err(|_| UsageStoreError::WriterClosed)?
    }

    async fn read_raw_events(&self) -> Result<RawEventStream> {
        use futures_util::{TryStreamExt, stream};

        // The log is append-only, so bounding the scan by the last sequence
        // number at its start yields exactly the log as of that instant.
        let start = Some((self.pool.clone(), 0_i64, None::<i64>));
        let pages = stream::try_unfold(start, |cursor| async move {
            let Some((pool, after, until)) = cursor else {
                return Ok(None);
            };
            let until = match until {
                Some(until) => until,
                None => last_event_seq(&pool).await?,
            };

            let page = read_event_page(&pool, after, until).await?;
            let next = match page.last() {
                Some((seq, _)) if page.len() == READ_PAGE_SIZE as usize => {
                    Some((pool, *seq, Some(until)))
                }
                _ => None,
            };

            let events: Vec<Result<RawEvent>> = page.into_iter().map(|(_, e)| Ok(e)).collect();
            Ok::<_, UsageStoreError>(Some((stream::iter(events), next)))
        });

        Ok(Box::pin(pages.try_flatten()))
    }

    async fn usage(&self, query: UsageQuery) -> Result<Vec<ModuleUsage>> {
        let prefix = query.category.as_str();

        let mut sql = match query.tier {
            Tier::Module => format!(
                "SELECT module, '' AS username, count, firstuse, lastuse FROM {prefix}_modules WHERE 1=1"
            ),
            Tier::User => format!(
                "SELECT module, username, count, firstuse, lastuse FROM {prefix}_usermodules WHERE 1=1"
            ),
        };

        let user = match query.tier {
            Tier::Module => None,
            Tier::User => query.user,
        };

        if query.module.is_some() {
            sql.push_str(" AND module = ?");
        }
        if user.is_some() {
            sql.push_str(" AND username = ?");
        }
        sql.push_str(" ORDER BY module ASC, username ASC");

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(module) = query.module {
            sqlx_query = sqlx_query.bind(module);
        }
        if let Some(user) = user {
            sqlx_query = sqlx_query.bind(user);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_usage).collect()
    }

    async fn event_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn snapshot(&self, destination: &Path) -> Result<()> {
        if tokio::fs::try_exists(destination).await? {
            return Err(UsageStoreError::SnapshotExists(destination.to_path_buf()));
        }

        let target = destination.to_str().ok_or_else(|| {
            UsageStoreError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("snapshot path is not valid UTF-8: {}", destination.display()),
            ))
        })?;

        // VACUUM INTO reads inside its own transaction, so it sees only
        // committed records and never waits on the writer.
        sqlx::query("VACUUM INTO ?")
            .bind(target)
            .execute(&self.pool)
            .await?;

        tracing::info!(path = %destination.display(), "wrote usage store snapshot");
        Ok(())
    }
}
