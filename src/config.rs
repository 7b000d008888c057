// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Configuration constants shared by both sides of a tunnel.

/// Delay between a broken tunnel and the next connection attempt.
pub const RECONNECT_BACKOFF_MILLIS: u64 = 1_000;

/// Route on the remote horizon that accepts an `OpenTunnel` handshake.
pub const TUNNEL_ROUTE: &str = "/v1/horizon/tunnel";

/// Capacity of the producer-side broadcast of committed streams.
pub const HORIZON_CHANNEL_CAPACITY: usize = 1024;
