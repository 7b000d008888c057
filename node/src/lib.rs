// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod config;
pub mod errors;
pub mod telemetry;
pub mod store;
pub mod processing;
pub mod network;
pub mod tunnel;
pub mod supervisor;
pub mod horizon;
pub mod server;
