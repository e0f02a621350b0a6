//! Deferred scene mutation queues.
//!
//! Worker threads register scene changes here while a step is in flight; the
//! scene drains everything atomically between steps. A single mutex covers
//! all queues; critical sections are O(1) appends and swaps only.

use parking_lot::{Mutex, MutexGuard};

use crate::backend::{ActorId, ColliderId, JointId, MaterialId, ObjectId};

/// Action applied to an actor during the next flush.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActionKind {
    Sleep,
}

/// The seven pending-mutation sequences, each preserving submission order.
#[derive(Debug, Default)]
pub struct Buffers {
    pub new_actors: Vec<ActorId>,
    pub actions: Vec<(ActionKind, ActorId)>,
    pub dead_actors: Vec<ActorId>,
    pub dead_colliders: Vec<ColliderId>,
    pub dead_joints: Vec<JointId>,
    pub dead_materials: Vec<MaterialId>,
    pub dead_objects: Vec<ObjectId>,
}

impl Buffers {
    pub fn is_empty(&self) -> bool {
        self.new_actors.is_empty()
            && self.actions.is_empty()
            && self.dead_actors.is_empty()
            && self.dead_colliders.is_empty()
            && self.dead_joints.is_empty()
            && self.dead_materials.is_empty()
            && self.dead_objects.is_empty()
    }
}

/// Thread-safe pending-mutation set shared by all scene mutation entry points.
#[derive(Debug, Default)]
pub struct PendingChanges {
    buffers: Mutex<Buffers>,
}

impl PendingChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the buffers for a compound enqueue (e.g. add + sleep action).
    pub fn lock(&self) -> MutexGuard<'_, Buffers> {
        self.buffers.lock()
    }

    pub fn push_new_actor(&self, actor: ActorId) {
        self.buffers.lock().new_actors.push(actor);
    }

    pub fn push_action(&self, kind: ActionKind, actor: ActorId) {
        self.buffers.lock().actions.push((kind, actor));
    }

    pub fn push_dead_actor(&self, actor: ActorId) {
        self.buffers.lock().dead_actors.push(actor);
    }

    pub fn push_dead_collider(&self, collider: ColliderId) {
        self.buffers.lock().dead_colliders.push(collider);
    }

    pub fn push_dead_joint(&self, joint: JointId) {
        self.buffers.lock().dead_joints.push(joint);
    }

    pub fn push_dead_material(&self, material: MaterialId) {
        self.buffers.lock().dead_materials.push(material);
    }

    pub fn push_dead_object(&self, object: ObjectId) {
        self.buffers.lock().dead_objects.push(object);
    }

    /// Swaps the buffers out atomically for draining.
    pub fn take(&self) -> Buffers {
        std::mem::take(&mut *self.buffers.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_drains_all_queues() {
        let pending = PendingChanges::new();
        pending.push_new_actor(ActorId(1));
        pending.push_action(ActionKind::Sleep, ActorId(1));
        pending.push_dead_actor(ActorId(2));
        pending.push_dead_collider(ColliderId(3));
        pending.push_dead_joint(JointId(4));
        pending.push_dead_material(MaterialId(5));
        pending.push_dead_object(ObjectId(6));

        let drained = pending.take();
        assert_eq!(drained.new_actors, vec![ActorId(1)]);
        assert_eq!(drained.actions, vec![(ActionKind::Sleep, ActorId(1))]);
        assert_eq!(drained.dead_actors, vec![ActorId(2)]);
        assert!(pending.take().is_empty());
    }

    #[test]
    fn concurrent_enqueues_lose_no_updates() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 500;

        let pending = PendingChanges::new();
        std::thread::scope(|scope| {
            for t in 0..THREADS {
                let pending = &pending;
                scope.spawn(move || {
                    for i in 0..PER_THREAD {
                        let id = t * PER_THREAD + i;
                        pending.push_new_actor(ActorId(id));
                        pending.push_dead_collider(ColliderId(id));
                    }
                });
            }
        });

        let drained = pending.take();
        assert_eq!(drained.new_actors.len(), (THREADS * PER_THREAD) as usize);
        assert_eq!(drained.dead_colliders.len(), (THREADS * PER_THREAD) as usize);

        // Per-thread submission order is preserved within each queue
        for t in 0..THREADS {
            let ids: Vec<u64> = drained
                .new_actors
                .iter()
                .map(|a| a.0)
                .filter(|id| id / PER_THREAD == t)
                .collect();
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
