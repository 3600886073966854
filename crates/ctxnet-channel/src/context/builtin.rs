//! Root contexts for the object kinds every host has: entities addressed
//! by id, block entities addressed by position, and the screen a
//! participant has open, addressed by its sync id.

use std::any::{type_name, Any};
use std::sync::Arc;

use ctxnet_buf::{GridPos, PayloadCodec};

use super::RootContext;
use crate::error::HandlingError;
use crate::handling::OpenScreen;
use crate::ids::{EntityId, PartitionId};

/// Host state a participant can be in.
pub trait HostWorld: Any + Send + Sync {
    fn partition(&self) -> PartitionId;
}

/// A world that can look entities up by id.
pub trait EntityWorld: HostWorld {
    type Entity: 'static;

    fn entity_by_id(&self, id: EntityId) -> Option<Self::Entity>;

    fn entity_id(entity: &Self::Entity) -> EntityId;
}

/// A world that can look block entities up by position.
pub trait BlockEntityWorld: HostWorld {
    type BlockEntity: 'static;

    fn block_entity_at(&self, pos: GridPos) -> Option<Self::BlockEntity>;

    fn block_entity_pos(block_entity: &Self::BlockEntity) -> GridPos;
}

/// Entities of `W`, located by their id as a fixed-width `i32`.
pub fn entity_context<W: EntityWorld>() -> RootContext<W::Entity, EntityId> {
    RootContext::new(
        PayloadCodec::new(
            |buf, id: &EntityId| {
                buf.write_i32(id.0);
                Ok(())
            },
            |buf| buf.read_i32().map(EntityId),
        ),
        |id, ctx| {
            let world = ctx.must_get_world::<W>()?;
            world.entity_by_id(*id).ok_or_else(|| {
                HandlingError::resolution(format!(
                    "no entity with id {id} in {}",
                    world.partition()
                ))
            })
        },
        W::entity_id,
    )
}

/// Block entities of `W`, located by their grid position.
pub fn block_entity_context<W: BlockEntityWorld>() -> RootContext<W::BlockEntity, GridPos> {
    RootContext::new(
        PayloadCodec::new(
            |buf, pos: &GridPos| {
                buf.write_grid_pos(*pos);
                Ok(())
            },
            |buf| buf.read_grid_pos(),
        ),
        |pos, ctx| {
            let world = ctx.must_get_world::<W>()?;
            world.block_entity_at(*pos).ok_or_else(|| {
                HandlingError::resolution(format!(
                    "no block entity at {pos} in {}",
                    world.partition()
                ))
            })
        },
        W::block_entity_pos,
    )
}

/// Host-side state of an open screen session.
pub trait ScreenHandler: Any + Send + Sync {
    fn sync_id(&self) -> i32;
}

/// The screen the receiving participant has open, located by its sync id
/// as a fixed-width `i32`.
///
/// Resolution fails when the participant has no screen open, when the open
/// screen's sync id differs from the payload's, or when it is not an `S`.
pub fn screen_context<S: ScreenHandler>() -> RootContext<Arc<S>, i32> {
    RootContext::new(
        PayloadCodec::new(
            |buf, sync_id: &i32| {
                buf.write_i32(*sync_id);
                Ok(())
            },
            |buf| buf.read_i32(),
        ),
        |sync_id, ctx| {
            let participant = ctx.must_get_participant()?;
            let name = participant.name();
            let Some(OpenScreen {
                sync_id: open,
                handler,
            }) = participant.open_screen()
            else {
                return Err(HandlingError::resolution(format!(
                    "screen {sync_id} for {name}, who has no screen open"
                )));
            };
            if open != *sync_id {
                return Err(HandlingError::resolution(format!(
                    "screen {sync_id} for {name}, whose open screen is {open}"
                )));
            }
            handler.downcast::<S>().map_err(|_| {
                HandlingError::resolution(format!(
                    "screen {sync_id} for {name} is not a {}",
                    type_name::<S>()
                ))
            })
        },
        |screen| screen.sync_id(),
    )
}
