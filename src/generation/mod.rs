// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption generation backend

pub mod backend;
pub mod config;
pub mod http;
pub mod types;

pub use backend::CaptionBackend;
pub use config::GenerationConfig;
pub use http::{parse_captions, HttpCaptionBackend};
pub use types::{BackendError, GenerationInput};
