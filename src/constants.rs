//! Fixed sizes and sampling parameters shared by every stage.

/// Number of values in one vector, the unit of encode, decode, pack and unpack.
pub const VECTOR_SIZE: usize = 1024;

/// Number of vectors in one row group.
pub const N_VECTORS_PER_ROWGROUP: usize = 100;

/// Number of values in one row group.
pub const ROWGROUP_SIZE: usize = N_VECTORS_PER_ROWGROUP * VECTOR_SIZE;

/// Vectors sampled from each row group during segment analysis.
pub const ROWGROUP_VECTOR_SAMPLES: usize = 8;

/// Values sampled from each sampled vector.
pub const SAMPLES_PER_VECTOR: usize = 32;

/// Default number of candidate combinations kept for per-vector refinement.
pub const MAX_K_COMBINATIONS: usize = 5;

/// Consecutive non-improving candidates after which per-vector refinement stops.
pub const SAMPLING_EARLY_EXIT_THRESHOLD: usize = 2;

/// Bits used to store one exception position.
pub const EXCEPTION_POSITION_BITS: usize = 16;

/// Largest left-part width tried by the real-double fallback.
pub const CUTTING_LIMIT: u8 = 16;

/// Maximum number of left parts kept in the real-double dictionary.
pub const MAX_RD_DICTIONARY_SIZE: usize = 8;

/// Bits used to store one real-double exception (left part plus position).
pub const RD_EXCEPTION_BITS: usize = 16 + EXCEPTION_POSITION_BITS;

// Exception positions are stored as u16.
const _: () = assert!(VECTOR_SIZE <= u16::MAX as usize + 1);
