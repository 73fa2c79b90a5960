//! Loading a published key mapping for the run phase.

use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::mapping::{self, MappingStore};
use crate::remote::BoxedRemote;

#[derive(Debug)]
enum LoadState {
    Unloaded,
    Loaded(String),
    Failed,
}

/// Loads the key mapping published by a load run, exactly once per process.
///
/// Every worker calls [`ensure_loaded`](Self::ensure_loaded) before issuing its first read or
/// delete. The first caller fetches the mapping and fills the [`MappingStore`] while holding a
/// lock, so no caller returns before the table is complete.
#[derive(Debug)]
pub struct MappingBootstrapper {
    remote: BoxedRemote,
    mapping: MappingStore,
    state: Mutex<LoadState>,
}

impl MappingBootstrapper {
    /// Creates a bootstrapper that fills `mapping` from `remote`.
    pub fn new(remote: BoxedRemote, mapping: MappingStore) -> Self {
        Self {
            remote,
            mapping,
            state: Mutex::new(LoadState::Unloaded),
        }
    }

    /// Makes sure the mapping published under `token` has been loaded.
    ///
    /// A mapping that cannot be fetched or decoded is a configuration error. Once loading failed,
    /// all later calls fail with [`Error::BootstrapFailed`] without contacting the store again.
    pub async fn ensure_loaded(&self, token: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        match &*state {
            LoadState::Loaded(loaded) if loaded == token => return Ok(()),
            LoadState::Loaded(loaded) => {
                return Err(Error::MappingConflict {
                    loaded: loaded.clone(),
                    requested: token.to_owned(),
                });
            }
            LoadState::Failed => return Err(Error::BootstrapFailed),
            LoadState::Unloaded => (),
        }

        match self.load(token).await {
            Ok(()) => {
                *state = LoadState::Loaded(token.to_owned());
                Ok(())
            }
            Err(err) => {
                *state = LoadState::Failed;
                Err(err)
            }
        }
    }

    /// Returns `true` once a mapping has been loaded.
    pub async fn is_loaded(&self) -> bool {
        matches!(*self.state.lock().await, LoadState::Loaded(_))
    }

    async fn load(&self, token: &str) -> Result<()> {
        let bytes = self
            .remote
            .fetch(token)
            .await
            .map_err(|source| Error::MappingUnavailable {
                token: token.to_owned(),
                source,
            })?;

        let table = mapping::decode(&bytes).map_err(|source| Error::InvalidMapping {
            token: token.to_owned(),
            source,
        })?;

        let entries = table.len();
        self.mapping.extend(table);
        tracing::info!(token, entries, "loaded key mapping");

        Ok(())
    }
}
