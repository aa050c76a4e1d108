//! hoard-service: the object service behind the `hoard` CLI
//!
//! ```text
//! Client ──▶ StreamingService ──▶ link (chunk, LINK, decode)
//!                  │                       │
//!                  └──────▶ Hoard ◀────────┘
//!                       (convergent crypto, grants)
//!                             │
//!                   ContentAddressedStore
//! ```

pub mod client;
pub mod frames;
pub mod hoard;
pub mod link;
pub mod streaming;

pub use client::Client;
pub use frames::{AddressStat, PlaintextAndGrantSpec, ReferenceAndCiphertext, ReferenceAndGrantSpec};
pub use hoard::Hoard;
pub use link::MAX_LINK_DEPTH;
pub use streaming::StreamingService;
