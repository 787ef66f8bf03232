//! # Report Server
//!
//! Serves GitHub compliance and collaborator reports from JSON documents,
//! as HTML pages or as the raw JSON they were uploaded as.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌──────────────┐
//! │  Server  │──▶│   Views   │──▶│ ItemList │──▶│   Storage    │
//! │  (axum)  │   │ typed/raw │   │ load once│   │ file | kv    │
//! └──────────┘   └───────────┘   └──────────┘   └──────────────┘
//! ```
//!
//! Uploads (`POST /{docpath}`) go straight to storage; reads either pass the
//! stored JSON through or build a view and render it.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`store`] | Storage backends (file, SQLite key-value, memory) |
//! | [`item_list`] | Load-once document parsing with empty fallback |
//! | [`views`] | Typed record views and the docpath registry |
//! | [`render`] | HTML pages |
//! | [`server`] | HTTP server |
//! | [`logging`] | Tracing subscriber setup |

pub mod config;
pub mod item_list;
pub mod logging;
pub mod render;
pub mod server;
pub mod store;
pub mod views;
