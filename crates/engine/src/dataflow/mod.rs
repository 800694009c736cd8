// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directed multigraph of handler nodes connected by bounded edges, driven
//! by a fixed-size worker pool.
//!
//! Each node has one unbounded inbox fed by `push` and by any inbound
//! edges. Each outbound edge owns a bounded queue. A worker scans the node
//! list, drains whatever inboxes it can claim, and invokes handlers with an
//! [`Emit`] handle bound to that node — handlers forward downstream through
//! it or simply consume the item. [`Touched`] enforces, in debug builds,
//! that a handler does one or the other before its item is dropped.

#[cfg(test)]
#[path = "dataflow_tests.rs"]
mod tests;

use parking_lot::Mutex;
use rt_adapters::{Channel, SendError, TryRecvOutcome, UNBOUNDED};
use rt_core::{DataflowError, EdgeId, GraphId, NodeId, PortIndex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// An item handed to a handler that has not yet been consumed or forwarded.
///
/// Dropping one while it still holds an item is a bug in the handler; in
/// debug builds this panics (`debug_assert!`) to enforce "a handler must
/// consume or forward every item it receives". Release builds drop
/// silently — the contract is documented, not enforced, there.
pub struct Touched<Item> {
    item: Option<Item>,
}

impl<Item> Touched<Item> {
    fn new(item: Item) -> Self {
        Self { item: Some(item) }
    }

    /// Take ownership of the item, marking this guard as touched.
    pub fn take(mut self) -> Item {
        self.item.take().expect("dataflow guard invariant: item present until taken")
    }
}

impl<Item> Drop for Touched<Item> {
    fn drop(&mut self) {
        if self.item.is_some() && !std::thread::panicking() {
            debug_assert!(false, "dataflow handler dropped an item without consuming or forwarding it");
        }
    }
}

type Handler<Item> = dyn Fn(Touched<Item>, &Emit<Item>) + Send + Sync;

struct NodeEntry<Item> {
    num_ports: usize,
    outs: Vec<Vec<EdgeId>>,
    inbox: Channel<Item>,
    handler: Arc<Handler<Item>>,
    busy: Arc<Mutex<()>>,
}

struct EdgeEntry<Item> {
    source: NodeId,
    port: PortIndex,
    dest: NodeId,
    inbox: Channel<Item>,
}

struct Inner<Item> {
    nodes: HashMap<NodeId, NodeEntry<Item>>,
    edges: HashMap<EdgeId, EdgeEntry<Item>>,
}

struct Shared<Item> {
    id: GraphId,
    pool_size: usize,
    running: AtomicBool,
    inner: Mutex<Inner<Item>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// A dataflow graph handle. Cloning shares the same underlying graph.
pub struct Graph<Item: Clone + Send + 'static> {
    shared: Arc<Shared<Item>>,
}

impl<Item: Clone + Send + 'static> Clone for Graph<Item> {
    fn clone(&self) -> Self {
        Self { shared: self.shared.clone() }
    }
}

/// Bound to a single node; handlers use this to forward items downstream.
pub struct Emit<Item> {
    shared: Arc<Shared<Item>>,
    node: NodeId,
}

impl<Item: Clone + Send + 'static> Emit<Item> {
    /// Fan out `item` to every outbound edge on `port`. Continues past a
    /// closed edge (the item bound for it is simply dropped) so one dead
    /// edge can't block delivery to the rest.
    pub fn emit(&self, port: PortIndex, item: Item) -> Result<(), DataflowError> {
        emit_from(&self.shared, self.node, port, item)
    }

    /// Convenience: take `guard`'s item and forward it on `port`.
    pub fn forward(&self, port: PortIndex, guard: Touched<Item>) -> Result<(), DataflowError> {
        self.emit(port, guard.take())
    }
}

fn emit_from<Item: Clone + Send + 'static>(
    shared: &Arc<Shared<Item>>,
    node: NodeId,
    port: PortIndex,
    item: Item,
) -> Result<(), DataflowError> {
    let edge_ids: Vec<EdgeId> = {
        let inner = shared.inner.lock();
        let entry = inner.nodes.get(&node).ok_or(DataflowError::NotRunning)?;
        if port >= entry.num_ports {
            return Err(DataflowError::PortOutOfRange { port, num_ports: entry.num_ports });
        }
        entry.outs[port].clone()
    };
    if edge_ids.is_empty() {
        return Ok(());
    }
    let last = edge_ids.len() - 1;
    let mut item = Some(item);
    for (index, edge_id) in edge_ids.iter().enumerate() {
        let inbox = {
            let inner = shared.inner.lock();
            match inner.edges.get(edge_id) {
                Some(edge) => edge.inbox.clone(),
                None => continue,
            }
        };
        let payload = if index == last {
            item.take().expect("item present until the last edge consumes it")
        } else {
            item.as_ref().expect("item present before the last edge consumes it").clone()
        };
        if let Err(SendError(dropped)) = inbox.send(payload) {
            tracing::debug!(graph = %shared.id, edge = %edge_id, "dropping item on closed edge");
            drop(dropped);
        }
    }
    Ok(())
}

impl<Item: Clone + Send + 'static> Graph<Item> {
    pub fn new(pool_size: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: GraphId::new(),
                pool_size: pool_size.max(1),
                running: AtomicBool::new(false),
                inner: Mutex::new(Inner { nodes: HashMap::new(), edges: HashMap::new() }),
                workers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> GraphId {
        self.shared.id
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Register a node with `num_ports` outbound ports and its handler.
    pub fn add_node(
        &self,
        num_ports: usize,
        handler: impl Fn(Touched<Item>, &Emit<Item>) + Send + Sync + 'static,
    ) -> NodeId {
        let id = NodeId::new();
        let entry = NodeEntry {
            num_ports,
            outs: vec![Vec::new(); num_ports],
            inbox: Channel::unbounded(),
            handler: Arc::new(handler),
            busy: Arc::new(Mutex::new(())),
        };
        self.shared.inner.lock().nodes.insert(id, entry);
        tracing::debug!(graph = %self.shared.id, node = %id, num_ports, "node added");
        id
    }

    /// Remove a node. Rejected while it still has outbound edges.
    pub fn remove_node(&self, node: NodeId) -> Result<(), DataflowError> {
        let mut inner = self.shared.inner.lock();
        let Some(entry) = inner.nodes.get(&node) else { return Ok(()) };
        if entry.outs.iter().any(|port| !port.is_empty()) {
            return Err(DataflowError::NodeHasOutboundEdges);
        }
        inner.nodes.remove(&node);
        Ok(())
    }

    /// Connect `source`'s `port` to `dest` with a bounded edge of the given
    /// capacity (`0` = unbounded, matching [`UNBOUNDED`]). The new edge is
    /// inserted at the head of the port's edge list.
    pub fn connect(
        &self,
        source: NodeId,
        port: PortIndex,
        dest: NodeId,
        capacity: usize,
    ) -> Result<EdgeId, DataflowError> {
        let mut inner = self.shared.inner.lock();
        let num_ports = inner.nodes.get(&source).map(|n| n.num_ports).ok_or(DataflowError::NotRunning)?;
        if port >= num_ports {
            return Err(DataflowError::PortOutOfRange { port, num_ports });
        }
        if !inner.nodes.contains_key(&dest) {
            return Err(DataflowError::NotRunning);
        }
        let id = EdgeId::new();
        let inbox = if capacity == UNBOUNDED { Channel::unbounded() } else { Channel::new(capacity) };
        inner.edges.insert(id, EdgeEntry { source, port, dest, inbox });
        inner.nodes.get_mut(&source).expect("checked above").outs[port].insert(0, id);
        tracing::debug!(graph = %self.shared.id, edge = %id, %source, %dest, port, "edge connected");
        Ok(id)
    }

    /// Disconnect an edge, closing and draining its inbox (items still
    /// queued in it are simply dropped).
    pub fn disconnect(&self, edge: EdgeId) -> Result<(), DataflowError> {
        let mut inner = self.shared.inner.lock();
        let Some(entry) = inner.edges.remove(&edge) else { return Ok(()) };
        entry.inbox.close();
        if let Some(source_node) = inner.nodes.get_mut(&entry.source) {
            for port in &mut source_node.outs {
                port.retain(|id| *id != edge);
            }
        }
        Ok(())
    }

    /// External injection: push `item` directly into `node`'s inbox.
    pub fn push(&self, node: NodeId, item: Item) -> Result<(), DataflowError> {
        let inner = self.shared.inner.lock();
        let entry = inner.nodes.get(&node).ok_or(DataflowError::NotRunning)?;
        entry.inbox.send(item).map_err(|_| DataflowError::EdgeClosed)
    }

    /// Fan out `item` from `node`'s `port` to every outbound edge there.
    pub fn emit(&self, node: NodeId, port: PortIndex, item: Item) -> Result<(), DataflowError> {
        emit_from(&self.shared, node, port, item)
    }

    /// Start the worker pool. Submits exactly `pool_size` worker threads.
    pub fn start(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(graph = %self.shared.id, pool_size = self.shared.pool_size, "starting dataflow graph");
        let mut workers = self.shared.workers.lock();
        for index in 0..self.shared.pool_size {
            let shared = self.shared.clone();
            let name = format!("rt-dataflow-{}-{index}", self.shared.id);
            let handle = std::thread::Builder::new()
                .name(name)
                .spawn(move || worker_loop(shared))
                .expect("spawning a dataflow worker thread");
            workers.push(handle);
        }
    }

    /// Stop the worker pool: clears the running flag and joins every
    /// worker. A second call is a no-op.
    pub fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }
        tracing::info!(graph = %self.shared.id, "stopping dataflow graph");
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.shared.workers.lock());
        for handle in handles {
            let _ = handle.join();
        }
    }
}

/// Drain one item (if any) off `edge_id`'s inbox and hand it to the
/// destination node's inbox. Returns whether an item was relayed.
fn relay_edge<Item: Clone + Send + 'static>(shared: &Arc<Shared<Item>>, edge_id: EdgeId) -> bool {
    let Some((inbox, source, port, dest)) = (|| {
        let inner = shared.inner.lock();
        let edge = inner.edges.get(&edge_id)?;
        Some((edge.inbox.clone(), edge.source, edge.port, edge.dest))
    })() else {
        return false;
    };
    let TryRecvOutcome::Got(item) = inbox.try_recv() else { return false };
    let dest_inbox = shared.inner.lock().nodes.get(&dest).map(|n| n.inbox.clone());
    match dest_inbox {
        Some(dest_inbox) => {
            if let Err(SendError(dropped)) = dest_inbox.send(item) {
                tracing::debug!(graph = %shared.id, edge = %edge_id, %source, port, node = %dest, "dropping item: destination node inbox closed");
                drop(dropped);
            }
        }
        None => tracing::debug!(graph = %shared.id, edge = %edge_id, %source, port, node = %dest, "dropping item: destination node gone"),
    }
    true
}

fn worker_loop<Item: Clone + Send + 'static>(shared: Arc<Shared<Item>>) {
    while shared.running.load(Ordering::SeqCst) {
        let mut did_work = false;

        let edge_ids: Vec<EdgeId> = shared.inner.lock().edges.keys().copied().collect();
        for edge_id in edge_ids {
            if relay_edge(&shared, edge_id) {
                did_work = true;
            }
        }

        let node_ids: Vec<NodeId> = shared.inner.lock().nodes.keys().copied().collect();
        for node_id in node_ids {
            let Some((inbox, handler, busy)) = (|| {
                let inner = shared.inner.lock();
                let entry = inner.nodes.get(&node_id)?;
                Some((entry.inbox.clone(), entry.handler.clone(), entry.busy.clone()))
            })() else {
                continue;
            };
            let Some(_guard) = busy.try_lock() else { continue };
            if let TryRecvOutcome::Got(item) = inbox.try_recv() {
                did_work = true;
                let emit = Emit { shared: shared.clone(), node: node_id };
                let guard = Touched::new(item);
                (handler)(guard, &emit);
            }
        }
        if !did_work {
            std::thread::sleep(IDLE_SLEEP);
        }
    }
}
