// ============================================================================
// spark-spawn - Flag Bits
// What a graph node is, what state it is in, and what it is doing right now
// ============================================================================
//
//   0x00ff  kind      SOURCE, DERIVED, SPAWNER, EAGER
//   0x0f00  status    exactly one of CLEAN, DIRTY, MAYBE_DIRTY
//   0xf000  markers   UPDATING, REENTERED, QUEUED
// ============================================================================

// =============================================================================
// KIND
// =============================================================================

/// Holds a value that can be read and written (signals, deriveds)
pub const SOURCE: u32 = 0x0001;

/// Computed from other sources and cached
pub const DERIVED: u32 = 0x0002;

/// Produces the children of one node
pub const SPAWNER: u32 = 0x0004;

/// Spawner that also goes through the frame refresh pass
pub const EAGER: u32 = 0x0008;

// =============================================================================
// STATUS
// =============================================================================

/// Output matches every input
pub const CLEAN: u32 = 0x0100;

/// A direct input changed; the next run is certain
pub const DIRTY: u32 = 0x0200;

/// Only an upstream derived was touched; re-run if it actually changed
pub const MAYBE_DIRTY: u32 = 0x0400;

/// All status bits
pub const STATUS_BITS: u32 = CLEAN | DIRTY | MAYBE_DIRTY;

// =============================================================================
// MARKERS
// =============================================================================

/// A tracked run is on the stack
pub const UPDATING: u32 = 0x1000;

/// Something tried to start a second run while UPDATING was set
pub const REENTERED: u32 = 0x2000;

/// Waiting in the frame refresh queue
pub const QUEUED: u32 = 0x4000;

// =============================================================================
// TESTS
// =============================================================================
