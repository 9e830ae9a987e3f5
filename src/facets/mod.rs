//! Facet consistency engine.
//!
//! Three facets (groups, projects, users) narrow each other. This module holds
//! the reconciliation closure that repairs a draft selection, and the option
//! lists offered for each facet given the current selection.

mod options;
mod reconcile;

pub use options::{FacetOption, FacetOptions, facet_options};
pub use reconcile::reconcile;

pub(crate) use reconcile::projects_in_scope;

use crate::models::{Entities, Project};

/// A project can be picked in a facet when it is open and its group resolves.
///
/// Projects with a dangling group id cannot satisfy upward closure, so they are
/// kept out of the selectable pool alongside closed projects.
pub(crate) fn is_selectable(project: &Project, entities: &Entities) -> bool {
    !project.is_closed()
        && project
            .group_id
            .as_ref()
            .is_some_and(|gid| entities.group(gid).is_some())
}
