//! Per-message ambient state handed to receivers by the transport.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{HandlingError, HandlingResult};
use crate::executor::{Executor, Task};

/// Which way a message travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    ToClient,
    ToServer,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToClient => f.write_str("to_client"),
            Self::ToServer => f.write_str("to_server"),
        }
    }
}

/// Type-erased handle to the host state a participant lives in.
pub type WorldHandle = Arc<dyn Any + Send + Sync>;

/// A screen session a participant has open, tagged with the sync id both
/// sides agreed on when it was opened.
#[derive(Clone)]
pub struct OpenScreen {
    pub sync_id: i32,
    pub handler: Arc<dyn Any + Send + Sync>,
}

impl fmt::Debug for OpenScreen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenScreen")
            .field("sync_id", &self.sync_id)
            .finish_non_exhaustive()
    }
}

/// The local identity a message is handled on behalf of.
///
/// On the server this is the peer that sent the message; on the client it
/// is the local player.
pub trait Participant: Send + Sync {
    fn name(&self) -> &str;

    /// The world the participant is currently in, if any.
    fn world(&self) -> Option<WorldHandle>;

    /// The screen the participant currently has open.
    fn open_screen(&self) -> Option<OpenScreen> {
        None
    }
}

/// Per-message handling state: where to run work, who it is for, and how
/// to drop the connection that delivered it.
#[derive(Clone)]
pub struct HandlingContext {
    executor: Arc<dyn Executor>,
    participant: Option<Arc<dyn Participant>>,
    disconnect: Arc<dyn Fn(String) + Send + Sync>,
}

impl HandlingContext {
    pub fn new(
        executor: Arc<dyn Executor>,
        participant: Option<Arc<dyn Participant>>,
        disconnect: Arc<dyn Fn(String) + Send + Sync>,
    ) -> Self {
        Self {
            executor,
            participant,
            disconnect,
        }
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    /// Schedule `task` on the main loop this message belongs to.
    pub fn execute(&self, task: Task) {
        self.executor.execute(task);
    }

    pub fn participant(&self) -> Option<&Arc<dyn Participant>> {
        self.participant.as_ref()
    }

    pub fn must_get_participant(&self) -> HandlingResult<&Arc<dyn Participant>> {
        self.participant
            .as_ref()
            .ok_or_else(|| HandlingError::error("No participant associated with this payload."))
    }

    pub fn world(&self) -> Option<WorldHandle> {
        self.participant.as_ref().and_then(|p| p.world())
    }

    /// The participant's world, downcast to the host's concrete type.
    pub fn must_get_world<W: Any + Send + Sync>(&self) -> HandlingResult<Arc<W>> {
        let world = self
            .world()
            .ok_or_else(|| HandlingError::error("No world associated with this payload."))?;
        world.downcast::<W>().map_err(|_| {
            HandlingError::error(format!(
                "World is not a {}.",
                std::any::type_name::<W>()
            ))
        })
    }

    /// Close the connection that delivered this message.
    pub fn disconnect(&self, reason: impl Into<String>) {
        (self.disconnect)(reason.into());
    }
}

impl fmt::Debug for HandlingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlingContext")
            .field("participant", &self.participant.as_ref().map(|p| p.name()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::executor::ImmediateExecutor;

    #[derive(Debug)]
    struct Level {
        name: &'static str,
    }

    struct Player {
        world: Option<WorldHandle>,
    }

    impl Participant for Player {
        fn name(&self) -> &str {
            "alex"
        }

        fn world(&self) -> Option<WorldHandle> {
            self.world.clone()
        }
    }

    fn context(
        participant: Option<Arc<dyn Participant>>,
    ) -> (HandlingContext, Arc<Mutex<Vec<String>>>) {
        let reasons = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reasons);
        let ctx = HandlingContext::new(
            Arc::new(ImmediateExecutor),
            participant,
            Arc::new(move |reason: String| sink.lock().unwrap().push(reason)),
        );
        (ctx, reasons)
    }

    #[test]
    fn world_downcasts_to_host_type() {
        let world: WorldHandle = Arc::new(Level { name: "overworld" });
        let (ctx, _) = context(Some(Arc::new(Player { world: Some(world) })));
        let level = ctx.must_get_world::<Level>().unwrap();
        assert_eq!(level.name, "overworld");
        assert!(ctx.must_get_world::<String>().is_err());
    }

    #[test]
    fn missing_participant_or_world_is_an_error() {
        let (ctx, _) = context(None);
        assert!(ctx.must_get_participant().is_err());
        let err = ctx.must_get_world::<Level>().unwrap_err();
        assert_eq!(err.to_string(), "No world associated with this payload.");

        let (ctx, _) = context(Some(Arc::new(Player { world: None })));
        assert_eq!(ctx.must_get_participant().unwrap().name(), "alex");
        assert!(ctx.world().is_none());
    }

    #[test]
    fn disconnect_reaches_transport_hook() {
        let (ctx, reasons) = context(None);
        ctx.disconnect("bye");
        assert_eq!(*reasons.lock().unwrap(), vec!["bye".to_string()]);
    }
}
