//! Per-tick input bundle.
//!
//! Inputs are immutable for the duration of a tick. Edge flags
//! (`*_just_pressed`) are true only on the tick the button went down.

use serde::{Deserialize, Serialize};

use crate::math::{Vec3, KINDA_SMALL_NUMBER};

/// Button state for movement abilities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbilityInputs {
    /// Sprint went down this tick.
    pub sprint_just_pressed: bool,
    /// Sprint is held.
    pub sprint_held: bool,
    /// Jump went down this tick.
    pub jump_just_pressed: bool,
    /// Jump is held.
    pub jump_held: bool,
    /// Dash went down this tick.
    pub dash_just_pressed: bool,
    /// Vault went down this tick.
    pub vault_just_pressed: bool,
    /// Crouch went down this tick.
    pub crouch_just_pressed: bool,
}

impl AbilityInputs {
    const SPRINT_JUST_PRESSED: u8 = 1 << 0;
    const SPRINT_HELD: u8 = 1 << 1;
    const JUMP_JUST_PRESSED: u8 = 1 << 2;
    const JUMP_HELD: u8 = 1 << 3;
    const DASH_JUST_PRESSED: u8 = 1 << 4;
    const VAULT_JUST_PRESSED: u8 = 1 << 5;
    const CROUCH_JUST_PRESSED: u8 = 1 << 6;

    /// Packs the flags into one byte.
    #[must_use]
    pub const fn pack(self) -> u8 {
        let mut bits = 0;
        if self.sprint_just_pressed {
            bits |= Self::SPRINT_JUST_PRESSED;
        }
        if self.sprint_held {
            bits |= Self::SPRINT_HELD;
        }
        if self.jump_just_pressed {
            bits |= Self::JUMP_JUST_PRESSED;
        }
        if self.jump_held {
            bits |= Self::JUMP_HELD;
        }
        if self.dash_just_pressed {
            bits |= Self::DASH_JUST_PRESSED;
        }
        if self.vault_just_pressed {
            bits |= Self::VAULT_JUST_PRESSED;
        }
        if self.crouch_just_pressed {
            bits |= Self::CROUCH_JUST_PRESSED;
        }
        bits
    }

    /// Unpacks a byte produced by [`AbilityInputs::pack`]. Unknown bits are ignored.
    #[must_use]
    pub const fn unpack(bits: u8) -> Self {
        Self {
            sprint_just_pressed: bits & Self::SPRINT_JUST_PRESSED != 0,
            sprint_held: bits & Self::SPRINT_HELD != 0,
            jump_just_pressed: bits & Self::JUMP_JUST_PRESSED != 0,
            jump_held: bits & Self::JUMP_HELD != 0,
            dash_just_pressed: bits & Self::DASH_JUST_PRESSED != 0,
            vault_just_pressed: bits & Self::VAULT_JUST_PRESSED != 0,
            crouch_just_pressed: bits & Self::CROUCH_JUST_PRESSED != 0,
        }
    }

    /// ORs `other` into `self`, so no press is lost when frames are coalesced.
    pub fn merge(&mut self, other: Self) {
        *self = Self::unpack(self.pack() | other.pack());
    }

    /// Copy with every edge flag cleared, held flags kept.
    #[must_use]
    pub const fn without_edges(self) -> Self {
        Self {
            sprint_just_pressed: false,
            jump_just_pressed: false,
            dash_just_pressed: false,
            vault_just_pressed: false,
            crouch_just_pressed: false,
            ..self
        }
    }
}

/// Everything the simulation reads from the player for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MoverInputs {
    /// World-space movement intent. Length is the fraction of max speed (<= 1).
    pub move_intent: Vec3,
    /// World-space facing intent. Zero keeps the current orientation.
    pub orientation_intent: Vec3,
    /// Ability buttons.
    pub abilities: AbilityInputs,
}

impl MoverInputs {
    /// Creates inputs with the given movement intent and no buttons.
    #[must_use]
    pub const fn moving(move_intent: Vec3) -> Self {
        Self {
            move_intent,
            orientation_intent: Vec3::ZERO,
            abilities: AbilityInputs {
                sprint_just_pressed: false,
                sprint_held: false,
                jump_just_pressed: false,
                jump_held: false,
                dash_just_pressed: false,
                vault_just_pressed: false,
                crouch_just_pressed: false,
            },
        }
    }

    /// Sets the ability buttons.
    #[must_use]
    pub const fn with_abilities(mut self, abilities: AbilityInputs) -> Self {
        self.abilities = abilities;
        self
    }

    /// Sets the orientation intent.
    #[must_use]
    pub const fn with_orientation_intent(mut self, orientation_intent: Vec3) -> Self {
        self.orientation_intent = orientation_intent;
        self
    }

    /// True when there is a usable movement intent.
    #[must_use]
    pub fn has_move_intent(&self) -> bool {
        !self.move_intent.is_nearly_zero(KINDA_SMALL_NUMBER)
    }

    /// Copy with non-finite vectors zeroed and the intent clamped to unit length.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        Self {
            move_intent: self.move_intent.finite_or_zero().clamp_length(1.0),
            orientation_intent: self.orientation_intent.finite_or_zero(),
            abilities: self.abilities,
        }
    }

    /// Copy used for refund substeps: edges already fired this tick.
    #[must_use]
    pub fn without_edges(&self) -> Self {
        Self {
            abilities: self.abilities.without_edges(),
            ..*self
        }
    }
}
