//! # Event Buffers
//!
//! One fixed-capacity ring buffer per event type.
//!
//! ## Design Philosophy
//!
//! Storage is allocated once, when the type is first used. During gameplay:
//! - Publishing copies the value into a pre-allocated slot
//! - Draining copies it back out
//! - A full buffer is resolved by the type's [`OverflowPolicy`]
//!
//! Only [`OverflowPolicy::Resize`] ever touches the allocator after creation.

mod policy;
mod ring;

pub use policy::OverflowPolicy;
pub use ring::EventBuffer;
