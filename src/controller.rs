//! Single owner of the selection.
//!
//! `InsightsController` holds the loaded entities, the membership graph and
//! the reconciled selection. Every edit goes through `apply`, which reconciles
//! the draft and publishes the result on a watch channel. The insight
//! scheduler reads that channel, so it always sees the latest selection.

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::facets::{self, FacetOptions};
use crate::models::graph::MembershipGraph;
use crate::models::{Entities, Selection, SelectionEdit};
use crate::store::{EntityStore, LoadState};
use crate::view::{self, FilteredView};
use crate::{Error, Result};

pub struct InsightsController {
    entities: Entities,
    graph: MembershipGraph,
    selection: Selection,
    load_state: LoadState,
    publisher: watch::Sender<Selection>,
}

impl Default for InsightsController {
    fn default() -> Self {
        Self::new()
    }
}

impl InsightsController {
    pub fn new() -> Self {
        let (publisher, _) = watch::channel(Selection::default());
        Self {
            entities: Entities::default(),
            graph: MembershipGraph::default(),
            selection: Selection::default(),
            load_state: LoadState::NotLoaded,
            publisher,
        }
    }

    /// Load entities from `store`.
    ///
    /// A failed load is not an error here: the controller keeps empty
    /// collections and reports `LoadState::Unavailable`. Either way the graph
    /// is rebuilt and the current selection reconciled against it.
    pub async fn load(&mut self, store: &dyn EntityStore) -> &LoadState {
        match store.load().await {
            Ok(entities) => {
                tracing::info!(
                    source = %store.describe(),
                    groups = entities.groups.len(),
                    projects = entities.projects.len(),
                    users = entities.users.len(),
                    tasks = entities.tasks.len(),
                    "entities loaded"
                );
                if entities.is_empty() {
                    tracing::warn!(source = %store.describe(), "entity source returned no records");
                }
                self.set_entities(entities, LoadState::Loaded);
            }
            Err(err) => {
                tracing::warn!(source = %store.describe(), error = %err, "unable to load entities");
                self.set_entities(Entities::default(), LoadState::Unavailable(err.to_string()));
            }
        }
        &self.load_state
    }

    /// Replace the entity collections directly (already loaded elsewhere).
    pub fn set_entities(&mut self, entities: Entities, state: LoadState) {
        self.entities = entities;
        self.graph = MembershipGraph::build(&self.entities);
        self.load_state = state;
        let reconciled = facets::reconcile(&self.selection, &self.graph, &self.entities);
        self.publish(reconciled);
    }

    /// Apply a user edit. Returns whether the reconciled selection changed.
    pub fn apply(&mut self, edit: &SelectionEdit) -> Result<bool> {
        let draft = edit.apply_to(&self.selection);
        self.replace(draft)
    }

    /// Replace the whole selection with `draft`, reconciled.
    pub fn replace(&mut self, draft: Selection) -> Result<bool> {
        if !self.load_state.is_settled() {
            return Err(Error::NotLoaded);
        }
        let reconciled = facets::reconcile(&draft, &self.graph, &self.entities);
        Ok(self.publish(reconciled))
    }

    fn publish(&mut self, selection: Selection) -> bool {
        if selection == self.selection {
            return false;
        }
        self.selection = selection.clone();
        self.publisher.send_replace(selection);
        true
    }

    /// Receiver that always holds the latest reconciled selection.
    pub fn subscribe(&self) -> watch::Receiver<Selection> {
        self.publisher.subscribe()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    pub fn graph(&self) -> &MembershipGraph {
        &self.graph
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn options(&self) -> FacetOptions {
        facets::facet_options(&self.selection, &self.graph, &self.entities)
    }

    pub fn view(&self, now: DateTime<Utc>) -> FilteredView {
        view::build_view(&self.selection, &self.graph, &self.entities, now)
    }
}
