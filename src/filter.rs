//! Collision pair filtering.
//!
//! Pure functions invoked by the backend per potentially-colliding shape
//! pair, deciding whether the pair is solved, which notifications it raises,
//! or whether it is dropped entirely.

use bitflags::bitflags;

bitflags! {
    /// Attributes of one shape in a candidate pair.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct FilterObjectFlags: u32 {
        const KINEMATIC = 1 << 0;
        const TRIGGER = 1 << 1;
    }
}

bitflags! {
    /// Notifications and solver work requested for a pair.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    pub struct PairFlags: u32 {
        const SOLVE_CONTACT = 1 << 0;
        const DETECT_DISCRETE_CONTACT = 1 << 1;
        const NOTIFY_TOUCH_FOUND = 1 << 2;
        const NOTIFY_TOUCH_PERSISTS = 1 << 3;
        const NOTIFY_TOUCH_LOST = 1 << 4;
        const POST_SOLVER_VELOCITY = 1 << 5;
        const NOTIFY_CONTACT_POINTS = 1 << 6;
    }
}

/// Per-shape filter words. `word0` is the shape's group bits, `word1` the
/// mask of groups it collides with, `word3` the vehicle-shape masking id.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct FilterData {
    pub word0: u32,
    pub word1: u32,
    pub word2: u32,
    pub word3: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FilterVerdict {
    /// Process the pair normally.
    Default,
    /// Raise notifications but skip contact solving.
    Suppress,
    /// Drop the pair: no events, no solve.
    Kill,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum QueryHit {
    Ignore,
    Block,
}

/// Scene-wide pair filter.
pub fn filter_pair(
    attrs0: FilterObjectFlags,
    data0: FilterData,
    attrs1: FilterObjectFlags,
    data1: FilterData,
) -> (FilterVerdict, PairFlags) {
    // Let triggers through
    if attrs0.contains(FilterObjectFlags::TRIGGER) || attrs1.contains(FilterObjectFlags::TRIGGER) {
        let flags = PairFlags::NOTIFY_TOUCH_FOUND
            | PairFlags::NOTIFY_TOUCH_LOST
            | PairFlags::DETECT_DISCRETE_CONTACT;
        return (FilterVerdict::Default, flags);
    }

    // Send events for the kinematic actors but don't solve the contact
    if attrs0.contains(FilterObjectFlags::KINEMATIC) && attrs1.contains(FilterObjectFlags::KINEMATIC)
    {
        let flags = PairFlags::NOTIFY_TOUCH_FOUND
            | PairFlags::NOTIFY_TOUCH_PERSISTS
            | PairFlags::NOTIFY_TOUCH_LOST
            | PairFlags::DETECT_DISCRETE_CONTACT;
        return (FilterVerdict::Suppress, flags);
    }

    // Full solve for pairs (A,B) where the mask of A contains the group of B
    // and vice versa
    if (data0.word0 & data1.word1) != 0 && (data1.word0 & data0.word1) != 0 {
        let flags = PairFlags::SOLVE_CONTACT
            | PairFlags::DETECT_DISCRETE_CONTACT
            | PairFlags::NOTIFY_TOUCH_FOUND
            | PairFlags::NOTIFY_TOUCH_PERSISTS
            | PairFlags::POST_SOLVER_VELOCITY
            | PairFlags::NOTIFY_CONTACT_POINTS;
        return (FilterVerdict::Default, flags);
    }

    (FilterVerdict::Kill, PairFlags::empty())
}

/// Pre-filter for batched wheel suspension raycasts. Shapes sharing the
/// vehicle masking id (`word3`) never block their own wheels.
pub fn wheel_raycast_prefilter(wheel: FilterData, shape: FilterData) -> QueryHit {
    if wheel.word3 == shape.word3 {
        return QueryHit::Ignore;
    }
    if (wheel.word0 & shape.word1) != 0 && (shape.word0 & wheel.word1) != 0 {
        return QueryHit::Block;
    }
    QueryHit::Ignore
}
