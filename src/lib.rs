//! Premium Sync - Stripe subscription lifecycle synchronizer
//!
//! Keeps a local mirror of each user's Stripe subscription, drives checkout
//! and the billing portal, reconciles the mirror from verified webhooks, and
//! answers premium entitlement checks for the content platform.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
