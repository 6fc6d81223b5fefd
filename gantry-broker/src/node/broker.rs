//! Broker node assembly: membership, election, and replication control.

// Layer 1: Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// Layer 3: Internal module imports
use super::error::NodeError;
use super::status::{NodeState, NodeStatus};
use crate::config::BrokerConfig;
use crate::coordination::{
    parse_sequence, Coordination, CoordinationError, CONTAINER_PATHS, ID_BLOCK_PREFIX,
    LEADER_PATH, NODES_PATH, NODE_PREFIX,
};
use crate::replication::{ReplicationPipeline, SyncConnector, SyncService};
use crate::service::BrokerHandler;
use gantry_mq::dispatch::Dispatcher;
use gantry_mq::queue::{MessageQueue, ServeMode};

/// One broker process: dispatcher, replication control, and the membership
/// state machine.
///
/// A node starts as a replica, joins the membership as an ephemeral
/// sequential child, and watches the member list. Whenever the list changes,
/// the lowest live sequence number is the leader; the node that finds itself
/// there completes the election by promoting every engine, flipping its
/// role, and advertising its address at the leader path. The leader also
/// keeps the replication pipeline's follower set in step with membership,
/// sending each new follower a full snapshot before any live update.
pub struct BrokerNode<Q, C, S>
where
    Q: MessageQueue,
    C: Coordination,
    S: SyncConnector + Clone,
{
    config: BrokerConfig,
    coordination: Arc<C>,
    connector: S,
    dispatcher: Arc<Dispatcher<Q>>,
    pipeline: Arc<ReplicationPipeline<S::Client>>,
    sync: Arc<SyncService<Q>>,
    status: Arc<NodeStatus>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<Q, C, S> BrokerNode<Q, C, S>
where
    Q: MessageQueue,
    C: Coordination,
    S: SyncConnector + Clone,
{
    /// Assemble a node. Nothing touches the coordination service until
    /// [`BrokerNode::start`].
    pub fn new(config: BrokerConfig, coordination: C, connector: S) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(ServeMode::Replica, 0));
        Self {
            sync: Arc::new(SyncService::new(Arc::clone(&dispatcher))),
            pipeline: Arc::new(ReplicationPipeline::new()),
            status: Arc::new(NodeStatus::new()),
            coordination: Arc::new(coordination),
            connector,
            dispatcher,
            tasks: Mutex::new(Vec::new()),
            config,
        }
    }

    /// The local dispatcher.
    pub fn dispatcher(&self) -> Arc<Dispatcher<Q>> {
        Arc::clone(&self.dispatcher)
    }

    /// Shared node identity and role.
    pub fn status(&self) -> Arc<NodeStatus> {
        Arc::clone(&self.status)
    }

    /// The follower-facing sync surface, for the transport to expose.
    pub fn sync_service(&self) -> Arc<SyncService<Q>> {
        Arc::clone(&self.sync)
    }

    /// A client-facing handler over this node.
    pub fn handler(&self) -> BrokerHandler<Q, S::Client> {
        BrokerHandler::new(
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.pipeline),
            Arc::clone(&self.status),
            self.config.pop_timeout,
        )
    }

    fn controller(&self) -> Controller<Q, C, S> {
        Controller {
            address: self.config.address.clone(),
            coordination: Arc::clone(&self.coordination),
            connector: self.connector.clone(),
            dispatcher: Arc::clone(&self.dispatcher),
            pipeline: Arc::clone(&self.pipeline),
            status: Arc::clone(&self.status),
        }
    }

    /// Join the cluster: create containers, allocate the id block, register
    /// membership, and install the member watch.
    ///
    /// # Errors
    ///
    /// Any coordination failure here is fatal; the process should exit.
    pub async fn start(&self) -> Result<(), NodeError> {
        for path in CONTAINER_PATHS {
            self.coordination.ensure_container(path).await?;
        }

        let address = self.config.address.as_bytes();
        let block = self
            .coordination
            .create_ephemeral_sequential(ID_BLOCK_PREFIX, address)
            .await?;
        self.dispatcher.install_id_block(block);

        let node_id = self
            .coordination
            .create_ephemeral_sequential(NODE_PREFIX, address)
            .await?;
        self.status.set_node_id(node_id);
        self.status.set_state(NodeState::Follower);
        info!(node_id, block, address = %self.config.address, "joined broker membership");

        let (initial, mut updates) = self.coordination.watch_children(NODES_PATH).await?;
        let controller = self.controller();
        controller.handle_membership(initial).await;

        let watch_controller = controller.clone();
        let watch = tokio::spawn(async move {
            while let Some(children) = updates.recv().await {
                watch_controller.handle_membership(children).await;
            }
        });

        let monitor = tokio::spawn(monitor_id_block(
            controller,
            self.config.id_block_low_water,
        ));

        self.tasks.lock().extend([watch, monitor]);
        Ok(())
    }

    /// Stop background work and end the coordination session, releasing
    /// every ephemeral node this broker created.
    pub async fn shutdown(&self) {
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            task.abort();
        }
        if let Err(error) = self.coordination.close().await {
            warn!(%error, "coordination session close failed");
        }
        info!("broker node stopped");
    }
}

/// Membership-driven control logic shared by the watch task.
struct Controller<Q, C, S>
where
    Q: MessageQueue,
    C: Coordination,
    S: SyncConnector + Clone,
{
    address: String,
    coordination: Arc<C>,
    connector: S,
    dispatcher: Arc<Dispatcher<Q>>,
    pipeline: Arc<ReplicationPipeline<S::Client>>,
    status: Arc<NodeStatus>,
}

impl<Q, C, S> Clone for Controller<Q, C, S>
where
    Q: MessageQueue,
    C: Coordination,
    S: SyncConnector + Clone,
{
    fn clone(&self) -> Self {
        Self {
            address: self.address.clone(),
            coordination: Arc::clone(&self.coordination),
            connector: self.connector.clone(),
            dispatcher: Arc::clone(&self.dispatcher),
            pipeline: Arc::clone(&self.pipeline),
            status: Arc::clone(&self.status),
        }
    }
}

impl<Q, C, S> Controller<Q, C, S>
where
    Q: MessageQueue,
    C: Coordination,
    S: SyncConnector + Clone,
{
    /// React to a changed member list.
    async fn handle_membership(&self, children: Vec<String>) {
        let mut members: Vec<(u32, String)> = children
            .into_iter()
            .filter_map(|child| parse_sequence(&child).map(|seq| (seq, child)))
            .collect();
        members.sort_by_key(|(seq, _)| *seq);

        let Some(my_id) = self.status.node_id() else {
            return;
        };
        let Some(leader_id) = members.first().map(|(id, _)| *id) else {
            // Transient empty view while our own registration propagates.
            return;
        };

        if leader_id != my_id {
            debug!(leader = leader_id, members = members.len(), "membership changed");
            return;
        }
        if !self.status.is_leader() {
            self.become_leader().await;
        }
        self.reconcile_followers(my_id, &members).await;
    }

    /// Election completion: promote engines, flip the role, advertise.
    async fn become_leader(&self) {
        self.dispatcher.start_serving_all();
        self.status.set_state(NodeState::Leader);
        info!(address = %self.address, "elected primary");

        if let Err(error) = self
            .coordination
            .create_ephemeral(LEADER_PATH, self.address.as_bytes())
            .await
        {
            match error {
                CoordinationError::NodeExists(_) => {
                    warn!("stale leader advertisement still present");
                }
                error => warn!(%error, "could not advertise the leader endpoint"),
            }
        }
    }

    /// Bring the pipeline's follower set in step with membership.
    async fn reconcile_followers(&self, my_id: u32, members: &[(u32, String)]) {
        let live: Vec<u32> = members
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| *id != my_id)
            .collect();
        self.pipeline.retain(&live);

        for (node_id, child) in members {
            if *node_id == my_id || self.pipeline.has_follower(*node_id) {
                continue;
            }
            let path = format!("{NODES_PATH}/{child}");
            let address = match self.coordination.get_data(&path).await {
                Ok(Some(data)) => String::from_utf8_lossy(&data).into_owned(),
                // Departed between the watch event and the read.
                Ok(None) => continue,
                Err(error) => {
                    warn!(follower = node_id, %error, "could not read member address");
                    continue;
                }
            };
            match self.connector.connect(&address).await {
                Ok(client) => {
                    // Snapshot-first: the follower replays from a full
                    // capture before any live update reaches it.
                    let dispatcher = Arc::clone(&self.dispatcher);
                    self.pipeline
                        .add_follower(*node_id, address, client, move || dispatcher.snapshot());
                }
                Err(error) => {
                    warn!(follower = node_id, %address, %error, "could not connect to follower");
                }
            }
        }
    }
}

/// Roll to a fresh id block before the current one runs dry.
async fn monitor_id_block<Q, C, S>(controller: Controller<Q, C, S>, low_water: u64)
where
    Q: MessageQueue,
    C: Coordination,
    S: SyncConnector + Clone,
{
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if controller.dispatcher.ids_remaining() >= low_water {
            continue;
        }
        match controller
            .coordination
            .create_ephemeral_sequential(ID_BLOCK_PREFIX, controller.address.as_bytes())
            .await
        {
            Ok(block) => {
                controller.dispatcher.install_id_block(block);
                info!(block, "rolled to a fresh id block");
            }
            Err(error) => warn!(%error, "could not allocate a fresh id block"),
        }
    }
}
