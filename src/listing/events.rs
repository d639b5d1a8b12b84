use crate::contribution::Contribution;

/// Change notification published by the catalog.
///
/// Events are sent after the list and the category index are both updated,
/// so a subscriber reading the catalog on receipt sees the new state.
#[derive(Debug, Clone)]
pub enum ListingEvent {
    Added(Contribution),
    Removed(Contribution),
    /// `old` was swapped for `new` at the same position
    Changed {
        old: Contribution,
        new: Contribution,
    },
}

impl ListingEvent {
    /// The contribution the event leaves in (or removes from) the catalog.
    pub fn contribution(&self) -> &Contribution {
        match self {
            ListingEvent::Added(c) | ListingEvent::Removed(c) => c,
            ListingEvent::Changed { new, .. } => new,
        }
    }
}
