//! Server renames an entity; each client resolves the entity in its own
//! world and applies the new name on its main loop.
//!
//! Run with:
//!   cargo run --example rename-entity

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ctxnet::buf::{Identifier, PayloadCodec};
use ctxnet::channel::{
    entity_context, ChannelRegistry, ContextualChannel, EntityId, EntityWorld, HandlingError,
    HostWorld, Participant, PartitionId, WorldHandle,
};
use ctxnet::loopback::{LoopbackConfig, LoopbackNetwork};

#[derive(Clone)]
struct Entity {
    id: EntityId,
    name: Arc<Mutex<String>>,
}

struct World {
    partition: PartitionId,
    entities: HashMap<EntityId, Entity>,
}

impl HostWorld for World {
    fn partition(&self) -> PartitionId {
        self.partition.clone()
    }
}

impl EntityWorld for World {
    type Entity = Entity;

    fn entity_by_id(&self, id: EntityId) -> Option<Entity> {
        self.entities.get(&id).cloned()
    }

    fn entity_id(entity: &Entity) -> EntityId {
        entity.id
    }
}

struct Player(Arc<World>);

impl Participant for Player {
    fn name(&self) -> &str {
        "example-player"
    }

    fn world(&self) -> Option<WorldHandle> {
        Some(Arc::clone(&self.0) as WorldHandle)
    }
}

fn world(partition: &PartitionId) -> Arc<World> {
    let id = EntityId(7);
    let entity = Entity {
        id,
        name: Arc::new(Mutex::new("Slime".to_string())),
    };
    Arc::new(World {
        partition: partition.clone(),
        entities: HashMap::from([(id, entity)]),
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let rename = ContextualChannel::new(
        Identifier::parse("example:rename")?,
        entity_context::<World>(),
        PayloadCodec::new(|buf, name: &String| buf.write_string(name), |buf| buf.read_string()),
    )
    .recv_client(|entity: Entity, name: String, _ctx| {
        if name.is_empty() {
            return Err(HandlingError::silent());
        }
        let mut current = entity
            .name
            .lock()
            .map_err(|_| HandlingError::error("name lock poisoned"))?;
        eprintln!("entity {} renamed {} -> {}", entity.id, current, name);
        *current = name;
        Ok(())
    });

    let mut registry = ChannelRegistry::new();
    let rename = registry.register(rename)?;

    let overworld = PartitionId(Identifier::new("example", "overworld")?);
    let server_world = world(&overworld);
    let client_world = world(&overworld);
    let mut network = LoopbackNetwork::new(LoopbackConfig::default())?;
    let server_view: Arc<dyn Participant> = Arc::new(Player(Arc::clone(&server_world)));
    let client_view: Arc<dyn Participant> = Arc::new(Player(Arc::clone(&client_world)));
    let mut client = network.connect(Some(server_view), Some(client_view))?;
    registry.install(&mut network);
    registry.install(&mut client);
    network.track_entity(client.peer_id(), EntityId(7));

    let entity = server_world
        .entity_by_id(EntityId(7))
        .ok_or("server has no entity 7")?;
    rename.send_to_tracking_entity(&network, entity.id, &entity, &"King Slime".to_string())?;

    if client.run_next(Duration::from_secs(5)) {
        eprintln!("client handled the rename on its main loop");
    } else {
        eprintln!("timed out waiting for the rename");
    }
    Ok(())
}
