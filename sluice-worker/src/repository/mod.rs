//! Repository layer
//!
//! Thin trait-based access to the remote control plane. The HTTP
//! implementation delegates to `sluice_client::ControlPlaneClient`; services
//! depend only on the trait so they can be exercised without a network.

mod control_plane;

pub use control_plane::ControlPlaneRepository;

pub use control_plane::HttpControlPlaneRepository;
