use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use ctxnet::buf::{
    BufConfig, GridPos, Identifier, NetBuf, NetPayload, PayloadCodec, Result as BufResult,
};
use ctxnet::channel::{
    block_entity_context, BlockEntityWorld, CastContext, Channel, ChannelContext, ChannelRegistry,
    ContextualChannel, HandlingContext, HandlingError, HandlingResult, HostWorld, Narrow,
    Participant, PartitionId, RootContext, WorldHandle,
};
use ctxnet::loopback::{ClientEndpoint, LoopbackConfig, LoopbackNetwork};
use tracing::{debug, info, warn};

use crate::cmd::DemoArgs;
use crate::exit::{
    buf_error, channel_error, registry_error, transport_error, CliError, CliResult, INTERNAL,
    SUCCESS, TIMEOUT,
};
use crate::output::{print_demo, ClientReport, DemoReport, OutputFormat};

const LIGHT_POS: GridPos = GridPos::new(12, 64, -7);
const CHEST_POS: GridPos = GridPos::new(13, 64, -7);
const PALETTE_SLOTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColorUpdate {
    value: u8,
    index: u8,
}

impl NetPayload for ColorUpdate {
    fn encode(&self, buf: &mut NetBuf) -> BufResult<()> {
        buf.write_u8(self.value);
        buf.write_u8(self.index);
        Ok(())
    }

    fn decode(buf: &mut NetBuf) -> BufResult<Self> {
        Ok(Self {
            value: buf.read_u8()?,
            index: buf.read_u8()?,
        })
    }
}

#[derive(Debug, Clone)]
struct FancyLight {
    pos: GridPos,
    colors: Arc<Mutex<[u8; PALETTE_SLOTS]>>,
}

impl FancyLight {
    fn new(pos: GridPos) -> Self {
        Self {
            pos,
            colors: Arc::new(Mutex::new([0; PALETTE_SLOTS])),
        }
    }

    fn colors(&self) -> [u8; PALETTE_SLOTS] {
        *self.colors.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone)]
enum Block {
    Light(FancyLight),
    Chest(GridPos),
}

impl Narrow<FancyLight> for Block {
    fn narrow(self) -> Result<FancyLight, Self> {
        match self {
            Block::Light(light) => Ok(light),
            other => Err(other),
        }
    }

    fn widen(light: &FancyLight) -> Self {
        Block::Light(light.clone())
    }

    fn kind_name(&self) -> String {
        match self {
            Block::Light(_) => "fancy_light".to_string(),
            Block::Chest(_) => "chest".to_string(),
        }
    }
}

/// One side's copy of the workshop: same layout, separate state.
struct Workshop {
    partition: PartitionId,
    blocks: HashMap<GridPos, Block>,
}

impl Workshop {
    fn new(partition: PartitionId) -> Self {
        let blocks = HashMap::from([
            (LIGHT_POS, Block::Light(FancyLight::new(LIGHT_POS))),
            (CHEST_POS, Block::Chest(CHEST_POS)),
        ]);
        Self { partition, blocks }
    }

    fn light(&self) -> Option<FancyLight> {
        self.block_entity_at(LIGHT_POS)?.narrow().ok()
    }
}

impl HostWorld for Workshop {
    fn partition(&self) -> PartitionId {
        self.partition.clone()
    }
}

impl BlockEntityWorld for Workshop {
    type BlockEntity = Block;

    fn block_entity_at(&self, pos: GridPos) -> Option<Block> {
        self.blocks.get(&pos).cloned()
    }

    fn block_entity_pos(block: &Block) -> GridPos {
        match block {
            Block::Light(light) => light.pos,
            Block::Chest(pos) => *pos,
        }
    }
}

struct Player {
    name: String,
    world: Arc<Workshop>,
}

impl Participant for Player {
    fn name(&self) -> &str {
        &self.name
    }

    fn world(&self) -> Option<WorldHandle> {
        Some(Arc::clone(&self.world) as WorldHandle)
    }
}

type ColorChannel =
    ContextualChannel<CastContext<RootContext<Block, GridPos>, FancyLight>, ColorUpdate>;

/// Handler threads seen per client participant.
type Handled = Arc<Mutex<HashMap<String, Vec<String>>>>;

fn color_channel(passthrough: bool, handled: Handled) -> CliResult<ColorChannel> {
    let name =
        Identifier::parse("ctxnet:color_update").map_err(|err| buf_error("channel name", err))?;
    let config = if passthrough {
        BufConfig::passthrough()
    } else {
        BufConfig::default()
    };
    let context = block_entity_context::<Workshop>().cast::<FancyLight>();
    Ok(ContextualChannel::new(name, context, PayloadCodec::of())
        .with_buf_config(config)
        .recv_client(move |light: FancyLight, update: ColorUpdate, ctx: &HandlingContext| {
            apply_update(&light, update, ctx, &handled)
        }))
}

fn apply_update(
    light: &FancyLight,
    update: ColorUpdate,
    ctx: &HandlingContext,
    handled: &Handled,
) -> HandlingResult {
    let who = ctx.must_get_participant()?.name().to_string();
    let thread = thread::current().name().unwrap_or("unnamed").to_string();
    handled
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(who)
        .or_default()
        .push(thread);

    let index = usize::from(update.index);
    if index >= PALETTE_SLOTS {
        return Err(HandlingError::disconnect(format!(
            "color index {index} out of range for {PALETTE_SLOTS} slots"
        )));
    }
    light.colors.lock().unwrap_or_else(PoisonError::into_inner)[index] = update.value;
    debug!(pos = %light.pos, index, value = update.value, "light recolored");
    Ok(())
}

struct DemoClient {
    name: String,
    endpoint: ClientEndpoint,
    world: Arc<Workshop>,
}

pub fn run(args: DemoArgs, format: OutputFormat) -> CliResult<i32> {
    let partition = PartitionId(
        Identifier::parse("ctxnet:workshop").map_err(|err| buf_error("partition name", err))?,
    );
    let timeout = Duration::from_millis(args.timeout_ms);
    let handled: Handled = Arc::default();

    let mut registry = ChannelRegistry::new();
    let channel = registry
        .register(color_channel(args.passthrough, Arc::clone(&handled))?)
        .map_err(|err| registry_error("register channel", err))?;

    let mut network = LoopbackNetwork::new(LoopbackConfig::default())
        .map_err(|err| transport_error("start server", err))?;
    registry.install(&mut network);

    let server_world = Arc::new(Workshop::new(partition.clone()));
    let mut clients = Vec::with_capacity(usize::from(args.clients));
    for i in 1..=args.clients {
        let name = format!("player-{i}");
        let world = Arc::new(Workshop::new(partition.clone()));
        let server_view: Arc<dyn Participant> = Arc::new(Player {
            name: name.clone(),
            world: Arc::clone(&server_world),
        });
        let client_view: Arc<dyn Participant> = Arc::new(Player {
            name: name.clone(),
            world: Arc::clone(&world),
        });
        let mut endpoint = network
            .connect(Some(server_view), Some(client_view))
            .map_err(|err| transport_error("connect client", err))?;
        registry.install(&mut endpoint);
        network.set_partition(endpoint.peer_id(), partition.clone());
        network.track_chunk(endpoint.peer_id(), partition.clone(), LIGHT_POS.into());
        clients.push(DemoClient {
            name,
            endpoint,
            world,
        });
    }

    let light = server_world
        .light()
        .ok_or_else(|| CliError::new(INTERNAL, "server workshop has no light"))?;
    let update = ColorUpdate {
        value: args.value,
        index: args.index,
    };
    let packet_bytes = channel
        .packet(&light, &update)
        .map_err(|err| channel_error("encode update", err))?
        .payload
        .len();
    info!(clients = clients.len(), value = update.value, index = update.index, "broadcasting color update");
    channel
        .send_to_tracking_block(&network, partition, LIGHT_POS, &light, &update)
        .map_err(|err| channel_error("send update", err))?;

    for client in &clients {
        if !client.endpoint.settle(timeout) {
            return Err(CliError::new(
                TIMEOUT,
                format!("{} did not receive the update in time", client.name),
            ));
        }
        let ran = client.endpoint.run_pending();
        if ran == 0 {
            warn!(client = %client.name, "no task queued for client");
        }
    }

    let handled = handled.lock().unwrap_or_else(PoisonError::into_inner);
    let main_thread = thread::current().name().map(str::to_string);
    let reports = clients
        .iter()
        .map(|client| {
            let threads = handled.get(&client.name).cloned().unwrap_or_default();
            let handler_thread = threads.first().cloned();
            ClientReport {
                peer: client.endpoint.peer_id().to_string(),
                colors: client.world.light().map(|l| l.colors()).unwrap_or_default(),
                handled: threads.len(),
                on_main_loop: handler_thread.is_some() && handler_thread == main_thread,
                handler_thread,
                disconnect_reason: client.endpoint.disconnect_reason(),
            }
        })
        .collect();

    print_demo(
        &DemoReport {
            channel: channel.name().to_string(),
            value: update.value,
            index: update.index,
            passthrough: args.passthrough,
            packet_bytes,
            clients: reports,
        },
        format,
    );
    Ok(SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chest_is_not_a_light() {
        let chest = Block::Chest(CHEST_POS);
        let err = <Block as Narrow<FancyLight>>::narrow(chest).unwrap_err();
        assert_eq!(<Block as Narrow<FancyLight>>::kind_name(&err), "chest");
    }

    #[test]
    fn demo_run_updates_every_client() {
        let args = DemoArgs {
            clients: 2,
            value: 200,
            index: 0,
            passthrough: false,
            timeout_ms: 5000,
        };
        assert_eq!(run(args, OutputFormat::Pretty).unwrap(), SUCCESS);
    }
}
