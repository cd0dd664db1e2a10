// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property values shared by notifications and serialized records.

use alloc::string::String;
use kurbo::Affine;
use serde::{Deserialize, Serialize};

/// A node property value.
///
/// Serialized untagged, so records read naturally as JSON
/// (`true`, `1700000000000`, `"name"`, `[1.0, 0.0, 0.0, 1.0, 0.0, 0.0]`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// A flag such as `visible`.
    Bool(bool),
    /// An unsigned integer such as `createdTime`.
    UInt(u64),
    /// A string such as `name` or `materialId`.
    String(String),
    /// Affine coefficients `[a, b, c, d, e, f]`, see [`Affine::as_coeffs`].
    Transform([f64; 6]),
}

impl Value {
    /// The flag, if this is a [`Value::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is a [`Value::UInt`].
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(n) => Some(*n),
            _ => None,
        }
    }

    /// The string, if this is a [`Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The transform, if this is a [`Value::Transform`].
    pub fn as_transform(&self) -> Option<Affine> {
        match self {
            Self::Transform(c) => Some(Affine::new(*c)),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(String::from(value))
    }
}

impl From<Affine> for Value {
    fn from(value: Affine) -> Self {
        Self::Transform(value.as_coeffs())
    }
}
