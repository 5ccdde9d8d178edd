use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::{fs, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::dao::{
    models::{QuizEntity, SessionEntity},
    quiz_store::QuizStore,
    storage::{StorageError, StorageResult},
};

/// In-memory store, optionally mirrored to a JSON file after every write.
#[derive(Clone, Default)]
pub struct MemoryQuizStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    data: RwLock<StoreData>,
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    quizzes: IndexMap<Uuid, QuizEntity>,
    #[serde(default)]
    sessions: IndexMap<Uuid, SessionEntity>,
}

impl MemoryQuizStore {
    /// Store that never touches the disk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store from `path`, starting empty when the file does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let data = match fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str::<StoreData>(&contents).map_err(|source| {
                StorageError::Corrupt {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "store file not found; starting empty");
                StoreData::default()
            }
            Err(err) => {
                return Err(StorageError::unavailable(
                    format!("failed to read store file `{}`", path.display()),
                    err,
                ));
            }
        };

        info!(
            path = %path.display(),
            quizzes = data.quizzes.len(),
            sessions = data.sessions.len(),
            "loaded store file"
        );

        Ok(Self {
            inner: Arc::new(MemoryInner {
                data: RwLock::new(data),
                path: Some(path),
            }),
        })
    }
}

impl MemoryInner {
    /// Write the whole store to disk. Callers hold the write lock so flushes never interleave.
    async fn flush(&self, data: &StoreData) -> StorageResult<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        let contents = serde_json::to_vec_pretty(data)
            .map_err(|err| StorageError::unavailable("failed to encode store".into(), err))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|err| {
                StorageError::unavailable(
                    format!("failed to create store directory `{}`", parent.display()),
                    err,
                )
            })?;
        }

        // Write then rename so a crash mid-write never leaves a truncated file.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents).await.map_err(|err| {
            StorageError::unavailable(format!("failed to write `{}`", tmp.display()), err)
        })?;
        fs::rename(&tmp, path).await.map_err(|err| {
            StorageError::unavailable(format!("failed to replace `{}`", path.display()), err)
        })?;

        debug!(path = %path.display(), "store flushed");
        Ok(())
    }
}

impl QuizStore for MemoryQuizStore {
    fn find_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.data.read().await.quizzes.get(&id).cloned()) })
    }

    fn save_quiz(&self, quiz: QuizEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut data = inner.data.write().await;
            data.quizzes.insert(quiz.id, quiz);
            inner.flush(&data).await
        })
    }

    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut data = inner.data.write().await;
            data.sessions.insert(session.id, session);
            inner.flush(&data).await
        })
    }

    fn list_sessions(&self) -> BoxFuture<'static, StorageResult<Vec<SessionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.data.read().await.sessions.values().cloned().collect()) })
    }

    fn clear(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut data = inner.data.write().await;
            data.quizzes.clear();
            data.sessions.clear();
            inner.flush(&data).await
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            match inner.path.as_ref().and_then(|path| path.parent()) {
                Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
                    fs::create_dir_all(parent).await.map_err(|err| {
                        StorageError::unavailable(
                            format!("store directory `{}` is not writable", parent.display()),
                            err,
                        )
                    })
                }
                _ => Ok(()),
            }
        })
    }
}
