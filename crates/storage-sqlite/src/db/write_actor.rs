use super::{DbConnection, DbPool};
use crate::errors::StorageError;
use diesel::SqliteConnection;
use log::{debug, error};
use std::any::Any;
use tokio::sync::{mpsc, oneshot};
use tidemark_core::errors::{Error, Result};

// A write job runs against the actor's connection inside an immediate
// transaction and returns a core Result.
type Job<T> = Box<dyn FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static>;

type ErasedJob = Job<Box<dyn Any + Send + 'static>>;
type ErasedReply = oneshot::Sender<Result<Box<dyn Any + Send + 'static>>>;

/// Handle for sending jobs to the writer actor.
///
/// Every mutation of the snapshot log goes through one actor, so an append
/// and a compaction delete on the same account never interleave.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::Sender<(ErasedJob, ErasedReply)>,
}

impl WriteHandle {
    /// Executes a database job on the writer actor's dedicated connection.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static + Any,
    {
        let (ret_tx, ret_rx) = oneshot::channel();

        self.tx
            .send((
                Box::new(move |c| job(c).map(|v| Box::new(v) as Box<dyn Any + Send>)),
                ret_tx,
            ))
            .await
            .map_err(|_| StorageError::WriterUnavailable("writer actor stopped".to_string()))?;

        let boxed = ret_rx.await.map_err(|_| {
            StorageError::WriterUnavailable("writer actor dropped the reply".to_string())
        })??;

        boxed
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| Error::Unexpected("writer actor returned an unexpected type".to_string()))
    }
}

/// Spawns a background Tokio task that acts as the single writer to the
/// database. Jobs are processed serially, each in its own immediate
/// transaction.
///
/// The actor keeps one pooled connection. If the pool cannot hand one out the
/// pending job fails with `StoreUnavailable` and the next job tries again.
pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (tx, mut rx) = mpsc::channel::<(ErasedJob, ErasedReply)>(1024);

    tokio::spawn(async move {
        let mut held: Option<DbConnection> = None;

        while let Some((job, reply_tx)) = rx.recv().await {
            if held.is_none() {
                match pool.get() {
                    Ok(conn) => held = Some(conn),
                    Err(e) => {
                        error!("Writer actor could not acquire a connection: {}", e);
                        let _ = reply_tx.send(Err(StorageError::from(e).into()));
                        continue;
                    }
                }
            }
            let Some(conn) = held.as_mut() else {
                continue;
            };

            let result: Result<Box<dyn Any + Send + 'static>> = conn
                .immediate_transaction::<_, StorageError, _>(|c| job(c).map_err(StorageError::from))
                .map_err(|e: StorageError| e.into());

            if let Err(Error::StoreUnavailable(reason)) = &result {
                // Drop a connection that may be broken; the next job reacquires.
                debug!("Releasing writer connection after store failure: {}", reason);
                held = None;
            }

            // The requester may have gone away; nothing to do then.
            let _ = reply_tx.send(result);
        }
        debug!("Writer actor stopped");
    });

    WriteHandle { tx }
}
