//! cpnode - control-plane node reconciliation
//!
//! A [`node::Node`] is bound to a hypervisor taken from an
//! [`infra::HypervisorList`] and reconciles the Kubernetes API server,
//! controller manager and scheduler on it. Nodes round-trip through the
//! versioned manifests in [`versioned`].

pub mod cli;
pub mod config;
pub mod controller;
pub mod infra;
pub mod node;
pub mod runtime;
pub mod versioned;
