//! Rollback registry.
//!
//! Collects compensating actions while a multi-step write is in progress and runs
//! them, in registration order, when the caller decides to undo. Running is
//! best-effort: a failing action is logged and collected, and the remaining actions
//! still run. The registry is cleared only by an explicit [`RollbackRegistry::clear`].
//!
//! # Example
//!
//! ```ignore
//! use docmapper::rollback::RollbackRegistry;
//!
//! let rollback = RollbackRegistry::new();
//! article.save(&registry).await?;
//!
//! let id = article.id();
//! let registry = registry.clone();
//! rollback.register(move || {
//!     let registry = registry.clone();
//!     async move {
//!         Article::mapper(&registry)?.remove(doc! { "_id": id }).await?;
//!         Ok(())
//!     }
//! }).await;
//!
//! if let Err(err) = publish(&article).await {
//!     let failures = rollback.rollback().await;
//! }
//! ```

use futures::future::BoxFuture;
use mea::rwlock::RwLock;
use std::{fmt, future::Future, sync::{Arc, LazyLock}};
use tracing::{debug, warn};

use crate::error::{MapperError, MapperResult};

type Action = Arc<dyn Fn() -> BoxFuture<'static, MapperResult<()>> + Send + Sync>;

static GLOBAL: LazyLock<RollbackRegistry> = LazyLock::new(RollbackRegistry::new);

/// An ordered list of compensating actions.
pub struct RollbackRegistry {
    actions: RwLock<Vec<Action>>,
}

impl fmt::Debug for RollbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollbackRegistry").finish_non_exhaustive()
    }
}

impl Default for RollbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RollbackRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            actions: RwLock::new(Vec::new()),
        }
    }

    /// Returns the process-wide registry.
    pub fn global() -> &'static RollbackRegistry {
        &GLOBAL
    }

    /// Appends an action. Actions may be run more than once if
    /// [`rollback`](RollbackRegistry::rollback) is called repeatedly without a clear.
    pub async fn register<F, Fut>(&self, action: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MapperResult<()>> + Send + 'static,
    {
        let action: Action = Arc::new(move || Box::pin(action()));
        self.actions.write().await.push(action);
    }

    /// Runs every registered action in order and returns the failures.
    ///
    /// The action list is snapshotted first, so actions may register further
    /// actions without deadlocking; those run on the next rollback.
    pub async fn rollback(&self) -> Vec<MapperError> {
        let actions = self.actions.read().await.to_vec();
        let mut failures = Vec::new();

        debug!(actions = actions.len(), "rolling back");

        for (position, action) in actions.iter().enumerate() {
            if let Err(err) = action().await {
                warn!(position, error = %err, "rollback action failed");
                failures.push(err);
            }
        }

        failures
    }

    /// Removes every registered action.
    pub async fn clear(&self) {
        self.actions.write().await.clear();
    }

    /// Returns the number of registered actions.
    pub async fn len(&self) -> usize {
        self.actions.read().await.len()
    }

    /// Returns `true` if no action is registered.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
