//! Registry of live playback sessions
//!
//! Views open one session per mounted player. Every session shares the same
//! services (adapter factory, telemetry feed, progress sink) but owns its
//! element id, state and adapter.

use crate::descriptor::VideoDescriptor;
use crate::session::{PlaybackSession, SessionServices};
use crate::types::{PlaybackState, SessionId, SessionOptions};
use crate::Result;
use std::collections::HashMap;
use tracing::{debug, info};

pub struct SessionManager {
    services: SessionServices,
    sessions: HashMap<SessionId, PlaybackSession>,
}

impl SessionManager {
    pub fn new(services: SessionServices) -> Self {
        Self {
            services,
            sessions: HashMap::new(),
        }
    }

    /// Open an idle session
    pub fn open(&mut self, options: SessionOptions) -> SessionId {
        let session = PlaybackSession::spawn(self.services.clone(), options);
        let id = session.id();
        debug!(session_id = %id, element_id = %session.element_id(), "Session opened");
        self.sessions.insert(id, session);
        id
    }

    /// Open a session and start a video in it
    pub fn open_video(&mut self, descriptor: VideoDescriptor, options: SessionOptions) -> Result<SessionId> {
        let id = self.open(options);
        if let Some(session) = self.sessions.get(&id) {
            session.start(descriptor)?;
        }
        Ok(id)
    }

    pub fn get(&self, id: &SessionId) -> Option<&PlaybackSession> {
        self.sessions.get(id)
    }

    /// Latest state of one session
    pub fn state(&self, id: &SessionId) -> Option<PlaybackState> {
        self.sessions.get(id).map(|s| s.state())
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    /// Tear down one session; false when it was not open
    pub async fn close(&mut self, id: &SessionId) -> bool {
        match self.sessions.remove(id) {
            Some(session) => {
                session.close().await;
                true
            }
            None => false,
        }
    }

    pub async fn close_all(&mut self) {
        let count = self.sessions.len();
        for (_, session) in self.sessions.drain() {
            session.close().await;
        }
        info!(count, "All sessions closed");
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
