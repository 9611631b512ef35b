//! Weapons that can be picked up from the track
//!
//! All weapon variants share one small capability surface: `use_weapon`,
//! `update_timed_effect` and `sound_cue`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::missile::Missile;
use super::physics::RigidBody;
use super::vehicle::VehicleId;
use crate::tuning::Tuning;

/// Pickup icon size
pub const WEAPON_ICON_SIZE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponKind {
    Gun,
    Turbo,
    MissileLauncher,
}

impl WeaponKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeaponKind::Gun => "gun",
            WeaponKind::Turbo => "turbo",
            WeaponKind::MissileLauncher => "missile launcher",
        }
    }
}

/// Sound the audio sink should play this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoundCue {
    Gunshot,
    Turbo,
    Rocket,
}

/// Result of ticking a timed effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectTick {
    /// No timed effect running
    Idle,
    /// Effect applies this tick
    Active,
    /// Effect just ran out; the weapon is done
    Expired,
}

/// Who is firing, and from where
#[derive(Debug, Clone, Copy)]
pub struct Trigger<'a> {
    pub owner: VehicleId,
    pub body: &'a RigidBody,
    /// First checkpoint a launched missile should seek
    pub next_checkpoint: usize,
    /// Race clock (seconds)
    pub now: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Gun {
    /// A shot is waiting for its sound
    fired: bool,
}

#[derive(Debug, Clone)]
pub struct Turbo {
    duration: f64,
    started_at: Option<f64>,
}

impl Turbo {
    pub fn is_active(&self) -> bool {
        self.started_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct MissileLauncher {
    missile: Missile,
    used: bool,
}

#[derive(Debug, Clone)]
pub enum Weapon {
    Gun(Gun),
    Turbo(Turbo),
    MissileLauncher(MissileLauncher),
}

impl Weapon {
    pub fn new(kind: WeaponKind, tuning: &Arc<Tuning>) -> Self {
        match kind {
            WeaponKind::Gun => Weapon::Gun(Gun::default()),
            WeaponKind::Turbo => Weapon::Turbo(Turbo {
                duration: tuning.turbo_duration,
                started_at: None,
            }),
            WeaponKind::MissileLauncher => Weapon::MissileLauncher(MissileLauncher {
                missile: Missile::new(tuning.clone()),
                used: false,
            }),
        }
    }

    pub fn kind(&self) -> WeaponKind {
        match self {
            Weapon::Gun(_) => WeaponKind::Gun,
            Weapon::Turbo(_) => WeaponKind::Turbo,
            Weapon::MissileLauncher(_) => WeaponKind::MissileLauncher,
        }
    }

    /// Pull the trigger; returns false when nothing happened
    ///
    /// Gun shots come out of the owner's bullet pool, so the gun only
    /// records that it fired.
    pub fn use_weapon(&mut self, trigger: &Trigger) -> bool {
        match self {
            Weapon::Gun(gun) => {
                gun.fired = true;
                true
            }
            Weapon::Turbo(turbo) => {
                if turbo.is_active() {
                    return false;
                }
                turbo.started_at = Some(trigger.now);
                true
            }
            Weapon::MissileLauncher(launcher) => {
                if launcher.used {
                    return false;
                }
                launcher.used = true;
                launcher
                    .missile
                    .launch(trigger.owner, trigger.next_checkpoint, trigger.body);
                true
            }
        }
    }

    /// Tick a timed effect against the race clock
    pub fn update_timed_effect(&mut self, now: f64) -> EffectTick {
        match self {
            Weapon::Turbo(turbo) => match turbo.started_at {
                None => EffectTick::Idle,
                Some(start) if start + turbo.duration - now <= 0.0 => {
                    turbo.started_at = None;
                    EffectTick::Expired
                }
                Some(_) => EffectTick::Active,
            },
            Weapon::Gun(_) | Weapon::MissileLauncher(_) => EffectTick::Idle,
        }
    }

    /// Sound to play this tick; a gunshot plays once per shot
    pub fn sound_cue(&mut self) -> Option<SoundCue> {
        match self {
            Weapon::Gun(gun) => std::mem::take(&mut gun.fired).then_some(SoundCue::Gunshot),
            Weapon::Turbo(turbo) => turbo.is_active().then_some(SoundCue::Turbo),
            Weapon::MissileLauncher(launcher) => {
                launcher.missile.is_flying().then_some(SoundCue::Rocket)
            }
        }
    }

    pub fn missile(&self) -> Option<&Missile> {
        match self {
            Weapon::MissileLauncher(launcher) => Some(&launcher.missile),
            _ => None,
        }
    }

    pub fn missile_mut(&mut self) -> Option<&mut Missile> {
        match self {
            Weapon::MissileLauncher(launcher) => Some(&mut launcher.missile),
            _ => None,
        }
    }

    /// A launcher whose single missile is gone
    pub fn is_spent(&self) -> bool {
        match self {
            Weapon::MissileLauncher(launcher) => launcher.used && launcher.missile.is_destroyed(),
            _ => false,
        }
    }
}
