//! # Mover Error Types
//!
//! Errors surfaced by construction, settings and replay decoding. Inside a
//! tick these are absorbed by the driver (logged, then replaced by a safe
//! fallback) and never reach the host.

use strider_shared::ModeId;
use thiserror::Error;

use crate::state::MixMode;

/// Errors that can occur in the movement core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoverError {
    /// A mode ran without the settings group it depends on.
    #[error("mode {mode} is missing its {group} settings")]
    MissingSettings {
        /// Mode that needed the group.
        mode: ModeId,
        /// Name of the missing group.
        group: &'static str,
    },

    /// A transition or hint named a mode that is not registered.
    #[error("transition {transition} targets unregistered mode {target}")]
    UnknownMode {
        /// Rule (or source) that produced the target.
        transition: &'static str,
        /// The unregistered target.
        target: ModeId,
    },

    /// A layered move was built with a mix mode its kind cannot produce.
    #[error("layered move {kind} does not support mix mode {mix:?}")]
    UnsupportedMixMode {
        /// Layered move kind.
        kind: &'static str,
        /// Declared mix mode.
        mix: MixMode,
    },

    /// NaN/infinite values or zero-length normals where a direction is required.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(&'static str),

    /// Settings failed validation.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Settings document could not be parsed.
    #[error("settings parse error: {0}")]
    SettingsParse(String),

    /// A replay buffer was shorter than its record size.
    #[error("replay buffer truncated: need {expected} bytes, have {actual}")]
    Truncated {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// A replay buffer contained an unknown discriminant.
    #[error("invalid {what} discriminant {value}")]
    InvalidDiscriminant {
        /// Field being decoded.
        what: &'static str,
        /// Raw value found.
        value: u8,
    },

    /// An actor was built without any registered mode.
    #[error("no movement mode registered for the starting mode {0}")]
    NoStartingMode(ModeId),
}

/// Result type for the movement core.
pub type MoverResult<T> = Result<T, MoverError>;
