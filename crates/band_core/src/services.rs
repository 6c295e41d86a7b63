//! Collaborator bundle handed to every flow step

use std::sync::Arc;

use crate::hosting::FileHosting;
use crate::messenger::Messenger;
use crate::records::{Band, Event, Member, Song, Voice};
use crate::store::{Collection, MemoryCollection};

/// External collaborators reachable from a step.
#[derive(Clone)]
pub struct Services {
    pub songs: Arc<dyn Collection<Song>>,
    pub bands: Arc<dyn Collection<Band>>,
    pub members: Arc<dyn Collection<Member>>,
    pub events: Arc<dyn Collection<Event>>,
    pub voices: Arc<dyn Collection<Voice>>,
    pub files: Arc<dyn FileHosting>,
    pub messenger: Arc<dyn Messenger>,
}

impl Services {
    /// Services backed by in-memory collections.
    pub fn in_memory(files: Arc<dyn FileHosting>, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            songs: Arc::new(MemoryCollection::<Song>::new()),
            bands: Arc::new(MemoryCollection::<Band>::new()),
            members: Arc::new(MemoryCollection::<Member>::new()),
            events: Arc::new(MemoryCollection::<Event>::new()),
            voices: Arc::new(MemoryCollection::<Voice>::new()),
            files,
            messenger,
        }
    }
}
