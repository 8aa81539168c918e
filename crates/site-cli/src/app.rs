//! Wiring between the configured backend, the session store and the
//! controller.

use crate::terminal::{TerminalNavigator, TerminalNotifier};
use backend_client::SupabaseClient;
use label_catalog::{ArtistService, ProfileService, TeamService};
use session_auth::{AuthController, AuthRoutes, SessionStore};
use session_storage::{FileStorage, SessionVault};
use site_config::{Config, Paths};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct App {
    pub config: Config,
    pub store: SessionStore,
    pub controller: AuthController,
    pub navigator: Arc<TerminalNavigator>,
    backend: Arc<SupabaseClient>,
}

impl App {
    /// Build the app with the store still loading. The session persisted
    /// under `paths` is picked up by [`App::initialize`].
    pub fn assemble(config: Config, paths: &Paths) -> anyhow::Result<Self> {
        paths.ensure_dirs()?;
        let vault = SessionVault::new(Box::new(FileStorage::new(paths.session_file())));
        let backend = Arc::new(SupabaseClient::new(
            config.supabase_url.clone(),
            config.supabase_anon_key.clone(),
            vault,
        ));

        let store = SessionStore::mount(backend.clone());
        let navigator = Arc::new(TerminalNavigator::default());
        let controller = AuthController::new(
            store.clone(),
            backend.clone(),
            backend.clone(),
            navigator.clone(),
            Arc::new(TerminalNotifier),
        )
        .with_routes(AuthRoutes {
            login: config.login_route.clone(),
            home: config.home_route.clone(),
        });

        debug!(api_url = %backend.api_url(), "App assembled");
        Ok(Self {
            config,
            store,
            controller,
            navigator,
            backend,
        })
    }

    /// Resolve the store. A failed fetch leaves the user signed out.
    pub async fn initialize(&self) {
        if let Err(e) = self.store.initialize().await {
            warn!(error = %e, "Could not restore the previous session");
        }
    }

    pub fn profiles(&self) -> ProfileService {
        ProfileService::new(self.backend.clone(), self.backend.clone())
    }

    pub fn artists(&self) -> ArtistService {
        ArtistService::new(self.backend.clone())
    }

    pub fn team(&self) -> TeamService {
        TeamService::new(self.backend.clone(), self.backend.clone())
    }

    pub fn shutdown(&self) {
        self.store.teardown();
    }
}
