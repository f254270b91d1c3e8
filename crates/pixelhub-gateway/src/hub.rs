//! Broadcast hub — the single serialized writer of canvas and slot state.
//!
//! Every mutation and every slot lifecycle change flows through one task
//! draining one FIFO command channel. That gives a total order over accepted
//! changes without locking the grid on the hot path: all viewers observe
//! pixel writes in the same sequence.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use pixelhub_core::canvas::Canvas;
use pixelhub_core::protocol::PixelUpdate;

/// Item on a slot's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundFrame {
    /// An accepted change, fanned out to every occupied slot.
    Change(PixelUpdate),
    /// Liveness acknowledgement for this slot only.
    Pong,
}

/// What a successful connect hands to the connection pipelines.
///
/// The pipelines know their own index but do not own slot lifecycle; the
/// hub frees the slot when a matching release arrives or when the slot's
/// queue overflows.
pub struct SlotHandle {
    pub slot: usize,
    pub generation: u64,
    /// Drained by the egress pipeline.
    pub frames: mpsc::Receiver<OutboundFrame>,
    /// Clone of the slot's queue sender, used by ingress for pong replies.
    pub frame_tx: mpsc::Sender<OutboundFrame>,
    /// Cancelled when the hub releases the slot.
    pub cancel: CancellationToken,
}

pub enum HubCommand {
    Connect {
        reply: oneshot::Sender<Option<SlotHandle>>,
    },
    Release {
        slot: usize,
        generation: u64,
    },
    Paint {
        update: PixelUpdate,
        reply: oneshot::Sender<bool>,
    },
    Stats {
        reply: oneshot::Sender<(usize, usize)>,
    },
}

/// Cloneable handle for submitting commands to the hub task.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    /// Reserve a viewer slot. `None` means the pool is full — a normal
    /// steady-state condition, not an error.
    pub async fn connect(&self) -> Option<SlotHandle> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(HubCommand::Connect { reply }).ok()?;
        rx.await.ok().flatten()
    }

    /// Notify the hub that this occupancy of the slot is over. Stale
    /// generations are ignored, so sending this after a forced disconnect
    /// is harmless.
    pub fn release(&self, slot: usize, generation: u64) {
        let _ = self.tx.send(HubCommand::Release { slot, generation });
    }

    /// Submit a mutation intent and wait for the hub's verdict.
    /// `None` means the hub is gone (shutdown).
    pub async fn paint(&self, update: PixelUpdate) -> Option<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(HubCommand::Paint { update, reply }).ok()?;
        rx.await.ok()
    }

    pub async fn stats(&self) -> Option<(usize, usize)> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(HubCommand::Stats { reply }).ok()?;
        rx.await.ok()
    }
}

struct SlotState {
    tx: mpsc::Sender<OutboundFrame>,
    cancel: CancellationToken,
}

/// Fixed-capacity table of viewer slots. Only the hub task touches it.
///
/// Each index carries a generation counter bumped on allocation, so a
/// release raced against slot reuse can never free the new occupant.
struct SlotPool {
    slots: Vec<Option<SlotState>>,
    generations: Vec<u64>,
}

impl SlotPool {
    fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            generations: vec![0; capacity],
        }
    }

    /// Reserve the lowest free index, or `None` when the table is full.
    fn allocate(&mut self, tx: mpsc::Sender<OutboundFrame>, cancel: CancellationToken) -> Option<(usize, u64)> {
        let slot = self.slots.iter().position(Option::is_none)?;
        self.generations[slot] += 1;
        self.slots[slot] = Some(SlotState { tx, cancel });
        Some((slot, self.generations[slot]))
    }

    /// Free the slot if `generation` matches its current occupancy.
    fn release(&mut self, slot: usize, generation: u64) -> bool {
        if slot >= self.slots.len() || self.generations[slot] != generation {
            return false;
        }
        match self.slots[slot].take() {
            Some(state) => {
                state.cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn generation(&self, slot: usize) -> u64 {
        self.generations[slot]
    }

    fn state(&self, slot: usize) -> Option<&SlotState> {
        self.slots[slot].as_ref()
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

struct Hub {
    pool: SlotPool,
    canvas: Arc<Mutex<Canvas>>,
    queue_depth: usize,
    rx: mpsc::UnboundedReceiver<HubCommand>,
}

/// Spawn the hub task over the given canvas; returns the command handle.
pub fn spawn_hub(canvas: Arc<Mutex<Canvas>>, slots: usize, queue_depth: usize) -> HubHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let hub = Hub {
        pool: SlotPool::new(slots),
        canvas,
        queue_depth,
        rx,
    };
    tokio::spawn(hub.run());
    HubHandle { tx }
}

impl Hub {
    async fn run(mut self) {
        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                HubCommand::Connect { reply } => {
                    let (tx, frames) = mpsc::channel(self.queue_depth);
                    let cancel = CancellationToken::new();
                    let handle =
                        self.pool
                            .allocate(tx.clone(), cancel.clone())
                            .map(|(slot, generation)| {
                                debug!(slot, "viewer slot allocated");
                                SlotHandle {
                                    slot,
                                    generation,
                                    frames,
                                    frame_tx: tx,
                                    cancel,
                                }
                            });
                    let _ = reply.send(handle);
                }
                HubCommand::Release { slot, generation } => {
                    if self.pool.release(slot, generation) {
                        debug!(slot, "viewer slot released");
                    }
                }
                HubCommand::Paint { update, reply } => {
                    let accepted =
                        self.canvas
                            .lock()
                            .await
                            .set(update.x, update.y, update.color);
                    if accepted {
                        debug!(
                            x = update.x,
                            y = update.y,
                            color = %update.color.to_hex(),
                            "pixel accepted"
                        );
                        self.fan_out(update);
                    }
                    let _ = reply.send(accepted);
                }
                HubCommand::Stats { reply } => {
                    let _ = reply.send((self.pool.occupied(), self.pool.capacity()));
                }
            }
        }
    }

    /// Push an accepted change onto every occupied slot's queue.
    ///
    /// Queues are bounded and the push never waits: a full queue means the
    /// viewer is too slow to keep the ordered stream, so that slot is
    /// dropped on the spot rather than letting it stall delivery to the
    /// rest.
    fn fan_out(&mut self, update: PixelUpdate) {
        let mut stalled = Vec::new();
        for slot in 0..self.pool.capacity() {
            let Some(state) = self.pool.state(slot) else {
                continue;
            };
            match state.tx.try_send(OutboundFrame::Change(update)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(slot, "outbound queue full, disconnecting slow viewer");
                    stalled.push(slot);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(slot, "outbound queue closed, releasing slot");
                    stalled.push(slot);
                }
            }
        }
        for slot in stalled {
            let generation = self.pool.generation(slot);
            self.pool.release(slot, generation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelhub_core::protocol::Rgba;

    fn test_hub(slots: usize, queue_depth: usize) -> HubHandle {
        let canvas = Arc::new(Mutex::new(Canvas::new(4, 4)));
        spawn_hub(canvas, slots, queue_depth)
    }

    fn red_at(x: i32, y: i32) -> PixelUpdate {
        PixelUpdate::new(x, y, Rgba::new(255, 0, 0, 255))
    }

    #[test]
    fn test_slot_pool_allocate_release_reuse() {
        let (tx, _rx) = mpsc::channel(1);
        let mut pool = SlotPool::new(2);

        let (s0, g0) = pool.allocate(tx.clone(), CancellationToken::new()).unwrap();
        let (s1, _g1) = pool.allocate(tx.clone(), CancellationToken::new()).unwrap();
        assert_eq!((s0, s1), (0, 1));
        assert!(pool.allocate(tx.clone(), CancellationToken::new()).is_none());
        assert_eq!(pool.occupied(), 2);

        assert!(pool.release(s0, g0));
        assert_eq!(pool.occupied(), 1);

        // Freed index is reused with a fresh generation.
        let (s2, g2) = pool.allocate(tx, CancellationToken::new()).unwrap();
        assert_eq!(s2, 0);
        assert_ne!(g2, g0);

        // The stale generation no longer releases anything.
        assert!(!pool.release(s2, g0));
        assert_eq!(pool.occupied(), 2);
    }

    #[test]
    fn test_slot_pool_release_cancels() {
        let (tx, _rx) = mpsc::channel(1);
        let mut pool = SlotPool::new(1);
        let cancel = CancellationToken::new();
        let (slot, generation) = pool.allocate(tx, cancel.clone()).unwrap();

        assert!(!cancel.is_cancelled());
        assert!(pool.release(slot, generation));
        assert!(cancel.is_cancelled());

        // Double release is a no-op.
        assert!(!pool.release(slot, generation));
    }

    #[tokio::test]
    async fn test_connect_until_full_then_release() {
        let hub = test_hub(2, 8);

        let a = hub.connect().await.unwrap();
        let b = hub.connect().await.unwrap();
        assert!(hub.connect().await.is_none(), "third connect must be full");
        assert_eq!(hub.stats().await, Some((2, 2)));

        hub.release(a.slot, a.generation);
        let c = hub.connect().await.unwrap();
        assert_eq!(c.slot, a.slot, "freed index is reused");
        drop(b);
    }

    #[tokio::test]
    async fn test_paint_fans_out_in_order() {
        let hub = test_hub(3, 8);
        let mut handles = Vec::new();
        for _ in 0..3 {
            handles.push(hub.connect().await.unwrap());
        }

        let updates = [red_at(0, 0), red_at(1, 1), red_at(2, 2), red_at(3, 3)];
        for update in updates {
            assert_eq!(hub.paint(update).await, Some(true));
        }

        // Every slot observes exactly the accepted changes, in hub order.
        for handle in &mut handles {
            for update in updates {
                assert_eq!(handle.frames.recv().await, Some(OutboundFrame::Change(update)));
            }
            assert!(handle.frames.try_recv().is_err(), "no extra frames");
        }
    }

    #[tokio::test]
    async fn test_out_of_bounds_paint_rejected_and_not_broadcast() {
        let hub = test_hub(1, 8);
        let mut handle = hub.connect().await.unwrap();

        assert_eq!(hub.paint(red_at(9, 9)).await, Some(false));
        assert_eq!(hub.paint(red_at(-1, 0)).await, Some(false));
        assert!(handle.frames.try_recv().is_err());

        // The hub loop survives rejections.
        assert_eq!(hub.paint(red_at(1, 1)).await, Some(true));
        assert_eq!(
            handle.frames.recv().await,
            Some(OutboundFrame::Change(red_at(1, 1)))
        );
    }

    #[tokio::test]
    async fn test_slow_viewer_disconnected_others_unaffected() {
        let hub = test_hub(2, 2);
        let slow = hub.connect().await.unwrap();
        let mut live = hub.connect().await.unwrap();

        // The slow slot never drains; its queue holds 2, the third paint
        // overflows it and forces a disconnect.
        for i in 0..3 {
            assert_eq!(hub.paint(red_at(i, 0)).await, Some(true));
        }

        assert!(slow.cancel.is_cancelled(), "stalled slot must be dropped");
        assert_eq!(hub.stats().await, Some((1, 2)));

        // The live slot still gets the whole ordered stream.
        for i in 0..3 {
            assert_eq!(
                live.frames.recv().await,
                Some(OutboundFrame::Change(red_at(i, 0)))
            );
        }
    }

    #[tokio::test]
    async fn test_stale_release_does_not_free_new_occupant() {
        let hub = test_hub(1, 8);
        let old = hub.connect().await.unwrap();
        hub.release(old.slot, old.generation);

        let new = hub.connect().await.unwrap();
        assert_eq!(new.slot, old.slot);

        // A second release from the old occupancy must not touch the slot.
        hub.release(old.slot, old.generation);
        assert_eq!(hub.stats().await, Some((1, 1)));
        assert!(!new.cancel.is_cancelled());
    }
}
