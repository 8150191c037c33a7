// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Error types for flowlib
//!
//! Defines the core error types used throughout flowlib. Invalid typed
//! callables never reach this surface (they fail trait resolution at
//! compile time); these variants cover the uniform API and cycle-time
//! defects.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("uniform node input {index} refers to a removed port")]
    DeadInputPort { index: usize },

    #[error("uniform node returned {got} required outputs, expected {expected}")]
    OutputShape { expected: usize, got: usize },

    #[error("node input became unavailable before execution")]
    InputUnavailable,

    #[error("node body panicked: {0}")]
    NodePanic(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type that uses FlowError
pub type Result<T> = std::result::Result<T, FlowError>;
