//! Named channels and the single boundary where handling failures are
//! turned into an outcome.

mod contextual;
mod no_context;

use std::error::Error as StdError;

use ctxnet_buf::{BufConfig, BufError, Identifier, NetBuf};
use tracing::{debug, error};

use crate::error::{HandlingPolicy, HandlingResult};
use crate::handling::{Direction, HandlingContext};

pub use contextual::ContextualChannel;
pub use no_context::NoContextChannel;

/// A channel as seen by transports and the registry.
pub trait Channel: Send + Sync {
    fn name(&self) -> &Identifier;

    /// Buffer settings used on both ends of this channel.
    fn buf_config(&self) -> &BufConfig;

    /// Decode and dispatch one inbound payload.
    fn receive(&self, direction: Direction, buf: &mut NetBuf, ctx: HandlingContext);

    fn is_to_client(&self) -> bool;

    fn is_to_server(&self) -> bool;

    fn handles(&self, direction: Direction) -> bool {
        match direction {
            Direction::ToClient => self.is_to_client(),
            Direction::ToServer => self.is_to_server(),
        }
    }
}

/// Render an error and its causes as `outer: cause: root`.
///
/// Causes whose text the wrapper already printed are skipped.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.ends_with(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}

/// Apply the outcome policy to a finished handler run.
pub(crate) fn apply_outcome(
    channel: &Identifier,
    direction: Direction,
    result: HandlingResult,
    ctx: &HandlingContext,
) {
    let Err(err) = result else {
        return;
    };
    match err.policy() {
        HandlingPolicy::Silent => {}
        HandlingPolicy::Disconnect => {
            let detail = error_chain(&err);
            debug!(channel = %channel, %direction, error = %detail, "disconnecting after handler failure");
            ctx.disconnect(format!("Channel {channel} error: {detail}"));
        }
        HandlingPolicy::Log => {
            error!(channel = %channel, %direction, error = %error_chain(&err), "error handling payload");
        }
    }
}

pub(crate) fn log_decode_failure(channel: &Identifier, direction: Direction, err: &BufError) {
    error!(channel = %channel, %direction, error = %err, "dropping malformed payload");
}


#[cfg(test)]
mod tests {
    use super::test_support::{counting, immediate};
    use super::*;
    use crate::error::HandlingError;

    fn name() -> Identifier {
        Identifier::parse("test:outcome").unwrap()
    }

    #[test]
    fn test_silent_emits_nothing() {
        let (ctx, reasons) = immediate();
        let ((), logs) = counting(|| {
            apply_outcome(&name(), Direction::ToServer, Err(HandlingError::silent()), &ctx);
        });
        assert_eq!(logs.total(), 0);
        assert!(reasons.lock().unwrap().is_empty());
    }

    #[test]
    fn test_disconnect_names_channel() {
        let (ctx, reasons) = immediate();
        let ((), logs) = counting(|| {
            apply_outcome(
                &name(),
                Direction::ToServer,
                Err(HandlingError::disconnect("bad slot")),
                &ctx,
            );
        });
        assert_eq!(logs.error_count(), 0);
        assert_eq!(
            *reasons.lock().unwrap(),
            vec!["Channel test:outcome error: bad slot".to_string()]
        );
    }

    #[test]
    fn test_other_failures_are_logged_only() {
        let (ctx, reasons) = immediate();
        let ((), logs) = counting(|| {
            for err in [
                HandlingError::error("oops"),
                HandlingError::resolution("gone"),
                HandlingError::from(BufError::InvalidUtf8),
            ] {
                apply_outcome(&name(), Direction::ToClient, Err(err), &ctx);
            }
        });
        assert_eq!(logs.error_count(), 3);
        assert!(reasons.lock().unwrap().is_empty());
    }

    #[test]
    fn test_success_is_quiet() {
        let (ctx, _) = immediate();
        let ((), logs) = counting(|| apply_outcome(&name(), Direction::ToClient, Ok(()), &ctx));
        assert_eq!(logs.total(), 0);
    }

    #[test]
    fn test_error_chain_skips_repeated_cause() {
        let err = HandlingError::from(BufError::InvalidUtf8);
        assert_eq!(error_chain(&err), err.to_string());

        let err = HandlingError::error_with("lookup failed", BufError::UnknownPaletteKey(3));
        assert_eq!(
            error_chain(&err),
            "lookup failed: palette key 3 was never assigned"
        );
    }
}
