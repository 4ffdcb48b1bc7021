//! Application state management

use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::handlers::ErrorNormalizer;
use crate::schema::{Document, EntitySchema};
use crate::store::MemoryStore;
use crate::tickets::{ticket_schema, TicketController, TICKETS};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    store: Arc<MemoryStore>,
    tickets: Arc<TicketController<MemoryStore>>,
    normalizer: Arc<ErrorNormalizer>,
}

impl AppState {
    /// Create a new builder
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::default()
    }

    /// State with an empty store and no seed data
    pub fn new(config: Config) -> Self {
        let schema = Arc::new(ticket_schema());
        let store = Arc::new(MemoryStore::new().with_schema(Arc::clone(&schema)));
        Self::assemble(config, store, schema)
    }

    fn assemble(config: Config, store: Arc<MemoryStore>, schema: Arc<EntitySchema>) -> Self {
        let normalizer = Arc::new(ErrorNormalizer::new(config.mode()));
        let tickets = Arc::new(TicketController::new(Arc::clone(&store), schema));
        Self {
            config: Arc::new(config),
            store,
            tickets,
            normalizer,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn tickets(&self) -> Arc<TicketController<MemoryStore>> {
        Arc::clone(&self.tickets)
    }

    pub fn normalizer(&self) -> Arc<ErrorNormalizer> {
        Arc::clone(&self.normalizer)
    }
}

/// Builder for [`AppState`]
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<Config>,
}

impl AppStateBuilder {
    /// Set the configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the state, inserting the configured seed tickets
    pub async fn build(self) -> Result<AppState> {
        let config = self.config.unwrap_or_default();
        let seed_file = config.store.seed_file.clone();
        let state = AppState::new(config);

        if let Some(path) = seed_file {
            let documents = read_seed_file(&path).await?;
            state.store.seed(TICKETS, documents).await?;
        }

        Ok(state)
    }
}

/// Read a JSON array of ticket documents
async fn read_seed_file(path: &Path) -> Result<Vec<Document>> {
    let seed_error = |reason: String| Error::Seed {
        path: path.to_path_buf(),
        reason,
    };

    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| seed_error(e.to_string()))?;
    let documents: Vec<Document> =
        serde_json::from_str(&raw).map_err(|e| seed_error(e.to_string()))?;

    tracing::info!(path = %path.display(), count = documents.len(), "read seed file");
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeMode;
    use std::io::Write;

    #[tokio::test]
    async fn test_builder_defaults() {
        let state = AppState::builder().build().await.unwrap();
        assert_eq!(state.config().service.port, 3000);
        assert_eq!(state.normalizer().mode(), RuntimeMode::Development);
        assert_eq!(state.store().count(TICKETS).await, 0);
    }

    #[tokio::test]
    async fn test_seed_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"title": "Printer jammed", "content": "Tray 2"}},
                {{"title": "VPN down", "content": "Office", "status": "PROGRESS"}}
            ]"#
        )
        .unwrap();

        let mut config = Config::default();
        config.store.seed_file = Some(file.path().to_path_buf());

        let state = AppState::builder().config(config).build().await.unwrap();
        assert_eq!(state.store().count(TICKETS).await, 2);
        assert_eq!(state.tickets().cancel_active().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_seed_file_errors() {
        let mut config = Config::default();
        config.store.seed_file = Some("/nonexistent/tickets.json".into());
        let result = AppState::builder().config(config.clone()).build().await;
        assert!(matches!(result, Err(Error::Seed { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"title": "not an array"}}"#).unwrap();
        config.store.seed_file = Some(file.path().to_path_buf());
        let result = AppState::builder().config(config.clone()).build().await;
        assert!(matches!(result, Err(Error::Seed { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"content": "missing title"}}]"#).unwrap();
        config.store.seed_file = Some(file.path().to_path_buf());
        let result = AppState::builder().config(config).build().await;
        assert!(matches!(result, Err(Error::Store(_))));
    }
}
