//! Ownership of the single engine session.
//!
//! Every store operation goes through [`ConnectionSupervisor::acquire`], which
//! re-checks health, reconnects at most once, and hands out a [`Session`]
//! holding the supervisor lock. Concurrent callers are therefore serialized:
//! one physical session, one operation at a time. There is no background
//! reconnect and no retry beyond that single attempt.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard};

use tracing::{info, warn};

use crate::engine::Engine;
use crate::errors::ConnectionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

#[derive(Debug)]
struct SupervisorInner<E> {
    engine: E,
    state: ConnectionState,
    closed: bool,
}

#[derive(Debug)]
pub struct ConnectionSupervisor<E: Engine> {
    inner: Mutex<SupervisorInner<E>>,
    endpoint: String,
}

impl<E: Engine> ConnectionSupervisor<E> {
    /// Takes ownership of the engine. The session itself is opened lazily on
    /// the first `acquire`.
    pub fn open(engine: E) -> Self {
        let endpoint = engine.endpoint().to_string();
        Self {
            inner: Mutex::new(SupervisorInner {
                engine,
                state: ConnectionState::Disconnected,
                closed: false,
            }),
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        match self.inner.lock() {
            Ok(inner) => inner.state,
            Err(_) => ConnectionState::Failed,
        }
    }

    /// Returns a live session, reconnecting once if the previous one is gone.
    pub fn acquire(&self) -> Result<Session<'_, E>, ConnectionError> {
        let mut inner = self.inner.lock().map_err(|_| ConnectionError::Poisoned)?;
        if inner.closed {
            return Err(ConnectionError::Closed {
                endpoint: self.endpoint.clone(),
            });
        }

        if inner.state == ConnectionState::Connected && !inner.engine.is_connected() {
            warn!(endpoint = %self.endpoint, "engine session lost; reconnecting");
            inner.state = ConnectionState::Disconnected;
        }

        if inner.state != ConnectionState::Connected {
            let previous = inner.state;
            inner.state = ConnectionState::Connecting;
            match inner.engine.connect() {
                Ok(()) => {
                    inner.state = ConnectionState::Connected;
                    info!(endpoint = %self.endpoint, ?previous, "engine session established");
                }
                Err(source) => {
                    inner.state = ConnectionState::Failed;
                    warn!(endpoint = %self.endpoint, %source, "engine connect failed");
                    return Err(ConnectionError::Connect {
                        endpoint: self.endpoint.clone(),
                        source,
                    });
                }
            }
        }

        Ok(Session { inner })
    }

    /// Closes the session. Only the first call closes; later calls are
    /// no-ops and return `false`.
    pub fn shutdown(&self) -> bool {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        if inner.closed {
            return false;
        }

        inner.closed = true;
        inner.state = ConnectionState::Disconnected;
        if let Err(error) = inner.engine.close() {
            warn!(endpoint = %self.endpoint, %error, "engine close reported an error");
        }
        info!(endpoint = %self.endpoint, "engine session closed");
        true
    }

    pub fn is_shut_down(&self) -> bool {
        match self.inner.lock() {
            Ok(inner) => inner.closed,
            Err(poisoned) => poisoned.into_inner().closed,
        }
    }
}

/// Exclusive use of the engine for the duration of one operation.
pub struct Session<'a, E> {
    inner: MutexGuard<'a, SupervisorInner<E>>,
}

impl<E> Session<'_, E> {
    /// Records a transport failure seen mid-operation; the next `acquire`
    /// reconnects.
    pub fn mark_disconnected(&mut self) {
        self.inner.state = ConnectionState::Disconnected;
    }
}

impl<E> Deref for Session<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.inner.engine
    }
}

impl<E> DerefMut for Session<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.inner.engine
    }
}
