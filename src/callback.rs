//! Client sessions and the callback handles that point back into them.

use std::rc::Rc;
use std::rc::Weak;

/// Shared handle to a [`Session`].
pub type SessionRef = Rc<Session>;

/// Shared handle to a [`Callback`].
pub type CallbackRef = Rc<Callback>;

/// A connected client session.
///
/// The engine never talks to the transport itself; it only needs a session
/// identity to build claim callbacks from and to let the environment route
/// completions. Sessions are owned by the connection layer, so every edge
/// from engine state back into a session is weak.
#[derive(Debug)]
pub struct Session {
    name: String,
}

impl Session {
    /// Create a session with a diagnostic name.
    pub fn new(name: impl Into<String>) -> SessionRef {
        Rc::new(Session { name: name.into() })
    }

    /// The diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An opaque destination inside a client session.
///
/// Carries the session plus the client-side address and context words the
/// session registered. A zero address marks a callback whose client has
/// gone away. Used both for request completions and for a disk's claim
/// (the claim-release callback of the owning session).
#[derive(Debug)]
pub struct Callback {
    session: Weak<Session>,
    address: u64,
    context: u64,
}

impl Callback {
    /// Create a callback into `session`.
    pub fn new(session: &SessionRef, address: u64, context: u64) -> CallbackRef {
        Rc::new(Callback {
            session: Rc::downgrade(session),
            address,
            context,
        })
    }

    /// The owning session, if it is still alive.
    pub fn session(&self) -> Option<SessionRef> {
        self.session.upgrade()
    }

    /// The client-side destination address; zero when the client is gone.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// The client-side context word.
    pub fn context(&self) -> u64 {
        self.context
    }
}
