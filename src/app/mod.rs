//! Application boundary.
//!
//! The connectivity core talks to radio, sockets, broker and flash only
//! through the **port traits** in [`ports`], and reports what it does
//! through the structured [`events`].  Adapters implement both sides.

pub mod events;
pub mod ports;
