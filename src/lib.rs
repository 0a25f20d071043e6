//! PIX Checkout API Library
//!
//! HTTP backend for a lead-capture and PIX checkout flow: creates charges with
//! one of several interchangeable gateways, records leads, receives payment
//! postbacks, stores receipt uploads and exposes admin exports.
//!
//! # Modules
//!
//! - `api`: HTTP-facing handlers.
//! - `core`: Checkout domain logic (amounts, tracking, QR values, leads).
//! - `integrations`: Gateways and outbound services.
//! - `app`: Router assembly.
//! - `config`: Configuration management.
//! - `db`: Database pool and migrations.
//! - `storage`: Lead/receipt persistence behind the `Store` trait.
//! - `errors`: Error handling types.
//! - `gateways`: `PaymentGateway` trait and the Blackcat, FreePay and SealPay adapters.
//! - `gateway_client`: Shared HTTP plumbing for the gateways.
//! - `handlers`: Payment, status, funnel and QR proxy handlers.
//! - `webhook_handler`: Gateway postback handler.
//! - `admin_handler`: Receipt list and CSV export.
//! - `upload_handler`: Multipart receipt upload.
//! - `services`: UTMify conversion reporting.
//! - `blob_storage`: Receipt file storage.

pub mod api;
pub mod core;
pub mod integrations;

pub mod admin_handler;
pub mod amount;
pub mod app;
pub mod blob_storage;
pub mod config;
pub mod db;
pub mod errors;
pub mod gateway_client;
pub mod gateways;
pub mod handlers;
pub mod lead_recorder;
pub mod models;
pub mod qr;
pub mod services;
pub mod storage;
pub mod tracking;
pub mod upload_handler;
pub mod webhook_handler;
pub mod webhook_models;
