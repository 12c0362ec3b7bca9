//! OtherLink workspace: the user's pages plus the one currently selected
//!
//! The selected id is mirrored to durable storage so the choice survives a
//! restart.

use crate::config::{WORKSPACE_PAGE, WORKSPACE_PAGE_SIZE};
use crate::manager::Loading;
use otherlink_core::{EntityId, Otherlink, StorageKey, TokenStore};
use otherlink_http::{ApiClient, ClientError, OtherlinkService};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkspaceState {
    pub otherlinks: Vec<Otherlink>,
    pub selected_id: Option<EntityId>,
    /// Full record of the selection, once loaded
    pub selected: Option<Otherlink>,
}

pub struct OtherlinkWorkspace {
    service: OtherlinkService,
    store: Arc<dyn TokenStore>,
    state: watch::Sender<WorkspaceState>,
    in_flight: AtomicUsize,
}

impl std::fmt::Debug for OtherlinkWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtherlinkWorkspace")
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl OtherlinkWorkspace {
    pub fn new(client: ApiClient, store: Arc<dyn TokenStore>) -> Self {
        let selected_id = store.get(StorageKey::SelectedOtherlinkId).map(EntityId::new);
        Self {
            service: OtherlinkService::new(client.with_token_store(store.clone())),
            store,
            state: watch::Sender::new(WorkspaceState {
                selected_id,
                ..WorkspaceState::default()
            }),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn service(&self) -> &OtherlinkService {
        &self.service
    }

    pub fn snapshot(&self) -> WorkspaceState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkspaceState> {
        self.state.subscribe()
    }

    pub fn otherlinks(&self) -> Vec<Otherlink> {
        self.state.borrow().otherlinks.clone()
    }

    pub fn selected(&self) -> Option<Otherlink> {
        self.state.borrow().selected.clone()
    }

    pub fn selected_id(&self) -> Option<EntityId> {
        self.state.borrow().selected_id.clone()
    }

    pub fn has_otherlinks(&self) -> bool {
        !self.state.borrow().otherlinks.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    fn persist_selection(&self, id: Option<&EntityId>) {
        let result = match id {
            Some(id) => self.store.set(StorageKey::SelectedOtherlinkId, id.as_str()),
            None => self.store.remove(StorageKey::SelectedOtherlinkId),
        };
        if let Err(e) = result {
            warn!("Failed to persist selected OtherLink: {e}");
        }
    }

    fn set_selection(&self, id: Option<EntityId>, selected: Option<Otherlink>) {
        self.persist_selection(id.as_ref());
        self.state.send_modify(|state| {
            state.selected_id = id;
            state.selected = selected;
        });
    }

    /// Fetch the user's pages, then settle the selection
    ///
    /// With nothing selected the first page is chosen; otherwise the
    /// selected record is reloaded.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<(), ClientError> {
        let _loading = Loading::begin(&self.in_flight);
        let page = self
            .service
            .list(WORKSPACE_PAGE, WORKSPACE_PAGE_SIZE, &[])
            .await?;
        debug!(count = page.otherlinks.len(), "Loaded OtherLinks");

        let first = page.otherlinks.first().map(|o| o.id.clone());
        self.state.send_modify(|state| state.otherlinks = page.otherlinks);

        match (self.selected_id(), first) {
            (None, Some(first)) => self.select(first).await,
            (Some(_), _) => self.load_selected().await,
            (None, None) => {}
        }
        Ok(())
    }

    /// Reload the selected record; a failure drops the selection
    pub async fn load_selected(&self) {
        let Some(id) = self.selected_id() else {
            return;
        };

        match self.service.get(&id).await {
            Ok(otherlink) => {
                self.state.send_modify(|state| state.selected = Some(otherlink));
            }
            Err(e) => {
                warn!(otherlink_id = %id, "Failed to load selected OtherLink: {e}");
                self.set_selection(None, None);
            }
        }
    }

    pub async fn select(&self, id: EntityId) {
        self.set_selection(Some(id), None);
        self.load_selected().await;
    }

    pub fn clear_selection(&self) {
        self.set_selection(None, None);
    }

    /// Prepend a newly created page and select it
    pub async fn add(&self, otherlink: Otherlink) {
        let id = otherlink.id.clone();
        self.state
            .send_modify(|state| state.otherlinks.insert(0, otherlink));
        self.select(id).await;
    }

    pub fn update(&self, otherlink: Otherlink) {
        self.state.send_modify(|state| {
            if let Some(existing) = state.otherlinks.iter_mut().find(|o| o.id == otherlink.id) {
                *existing = otherlink.clone();
            }
            if state.selected_id.as_ref() == Some(&otherlink.id) {
                state.selected = Some(otherlink);
            }
        });
    }

    /// Drop a page from the list, moving the selection to the first remaining one
    pub async fn remove(&self, id: &EntityId) {
        self.state
            .send_modify(|state| state.otherlinks.retain(|o| &o.id != id));

        if self.selected_id().as_ref() != Some(id) {
            return;
        }
        let next = self.state.borrow().otherlinks.first().map(|o| o.id.clone());
        match next {
            Some(next) => self.select(next).await,
            None => self.clear_selection(),
        }
    }

    pub async fn refresh(&self) -> Result<(), ClientError> {
        self.load().await
    }

    /// Forget everything, including the durable selection; used on logout
    pub fn clear(&self) {
        self.persist_selection(None);
        self.state.send_replace(WorkspaceState::default());
    }
}
