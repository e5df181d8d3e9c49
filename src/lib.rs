//! # Report Harness
//!
//! A local-first ingestion and query pipeline for property report documents.
//!
//! Report Harness takes an uploaded file — a zip of PDFs, a single PDF, or a
//! single report image — and turns it into two durable artifacts: a semantic
//! index for question answering and a structured record in SQLite. Extraction
//! is delegated to an external language-model oracle; embeddings power
//! retrieval over the indexed text.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌───────────────┐
//! │  Upload   │──▶│   Pipeline    │──▶│ Index (files) │
//! │ zip/pdf/ │   │ unpack·extract│   │ Record (SQLite)│
//! │  image   │   │  index·save   │   └───────┬───────┘
//! └──────────┘   └───────────────┘           │
//!                                            ▼
//!                                     ┌────────────┐
//!                                     │ CLI (rpt)  │
//!                                     │ query·list │
//!                                     └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rpt init                          # create database
//! rpt ingest disclosures.zip        # build index + structured record
//! rpt query <id> "What year was the house built?"
//! rpt list                          # dashboard grouped by report type
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`unpack`] | Archive extraction and document discovery |
//! | [`chunk`] | Text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`oracle`] | Extraction oracle transport |
//! | [`extract`] | Instructions and oracle-output decoding |
//! | [`index`] | Semantic index build/load |
//! | [`pipeline`] | End-to-end ingestion |
//! | [`query`] | Query engine gateway |
//! | [`repo`] | Structured record repository |
//! | [`dashboard`] | Grouped dashboard summary |
//! | [`db`] | Database connection and migrations |

pub mod chunk;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod models;
pub mod oracle;
pub mod pipeline;
pub mod query;
pub mod repo;
pub mod unpack;
