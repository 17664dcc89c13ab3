//! # Event Values
//!
//! An event is a fixed-layout value copied by value into ring buffers and
//! handed to handlers by reference. `Copy` rules out owned heap pointers, so
//! dispatch never allocates, boxes or drops payload memory.

/// Marker for types that can travel through the bus.
///
/// Blanket-implemented for every `Copy + Send + Sync + 'static` type.
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Debug)]
/// struct BlockBroken { pos: [i32; 3], block_type: u32 }
///
/// bus.publish(BlockBroken { pos: [1, 2, 3], block_type: 7 });
/// ```
pub trait Event: Copy + Send + Sync + 'static {}

impl<T: Copy + Send + Sync + 'static> Event for T {}
