//! Game balance configuration
//!
//! Every knob the simulation reads lives in [`Tuning`]. A race holds one
//! immutable copy behind an `Arc`, so concurrent races (and tests) can run
//! with different values.

use std::path::Path;

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Tunable simulation constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    // === Kinematics ===
    pub acc: f64,
    pub missile_acc: f64,
    pub reverse_acc: f64,
    pub max_speed: f64,
    pub missile_speed: f64,
    pub bullet_speed: f64,
    pub speed_decay: f64,
    pub brake_stop_speed: f64,

    // === Steering ===
    pub ang_vel: f64,
    pub ai_ang_vel: f64,
    pub missile_ang_vel: f64,
    pub heading_tolerance: f64,

    // === Collisions ===
    pub elastic_coeff: f64,
    pub push_out: f64,
    pub fast_impact_speed: f64,
    pub collision_nudge: f64,
    pub collision_grace: f64,
    pub fix_interval: f64,
    pub rotate_debounce: f64,

    // === Damage ===
    pub vehicle_hp: i32,
    pub wall_dmg: i32,
    pub bullet_dmg: i32,
    pub missile_dmg: i32,

    // === Weapons ===
    pub gun_ammo: usize,
    pub turbo_duration: f64,
    pub turbo_boost: f64,
    pub turbo_cap_factor: f64,
    pub missile_range: f64,
    pub missile_fuel: f64,
    pub world_bound: f64,
    pub oil_spin: f64,

    // === Track economy ===
    pub first_spawn_delay: f64,
    pub min_spawn_interval: u32,
    pub max_spawn_interval: u32,
    pub max_pending_weapons: usize,
    pub max_missile_launchers: u32,
    pub obstacle_count: usize,

    // === Race ===
    pub total_laps: u32,
    pub countdown: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            acc: ACC,
            missile_acc: MISSILE_ACC,
            reverse_acc: REVERSE_ACC,
            max_speed: MAX_SPEED,
            missile_speed: MISSILE_SPEED,
            bullet_speed: BULLET_SPEED,
            speed_decay: SPEED_DECAY,
            brake_stop_speed: BRAKE_STOP_SPEED,

            ang_vel: ANG_VEL,
            ai_ang_vel: AI_ANG_VEL,
            missile_ang_vel: MISSILE_ANG_VEL,
            heading_tolerance: HEADING_TOLERANCE,

            elastic_coeff: ELASTIC_COEFF,
            push_out: PUSH_OUT,
            fast_impact_speed: FAST_IMPACT_SPEED,
            collision_nudge: COLLISION_NUDGE,
            collision_grace: COLLISION_GRACE,
            fix_interval: FIX_INTERVAL,
            rotate_debounce: ROTATE_DEBOUNCE,

            vehicle_hp: VEHICLE_HP,
            wall_dmg: WALL_DMG,
            bullet_dmg: BULLET_DMG,
            missile_dmg: MISSILE_DMG,

            gun_ammo: GUN_AMMO,
            turbo_duration: TURBO_DURATION,
            turbo_boost: TURBO_BOOST,
            turbo_cap_factor: TURBO_CAP_FACTOR,
            missile_range: MISSILE_RANGE,
            missile_fuel: MISSILE_FUEL,
            world_bound: WORLD_BOUND,
            oil_spin: OIL_SPIN,

            first_spawn_delay: FIRST_SPAWN_DELAY,
            min_spawn_interval: MIN_SPAWN_INTERVAL,
            max_spawn_interval: MAX_SPAWN_INTERVAL,
            max_pending_weapons: MAX_PENDING_WEAPONS,
            max_missile_launchers: MAX_MISSILE_LAUNCHERS,
            obstacle_count: OBSTACLE_COUNT,

            total_laps: TOTAL_LAPS,
            countdown: COUNTDOWN,
        }
    }
}

impl Tuning {
    /// Parse tuning from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let tuning: Tuning = serde_json::from_str(json).context("invalid tuning JSON")?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Load tuning from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read tuning file {}", path.display()))?;
        let tuning = Self::from_json(&json)?;
        log::info!("Loaded tuning from {}", path.display());
        Ok(tuning)
    }

    /// Load tuning, falling back to defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(tuning) => tuning,
            Err(err) => {
                log::warn!("Using default tuning: {err:#}");
                Self::default()
            }
        }
    }

    /// Reject values that would break the simulation
    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_speed > 0.0, "max_speed must be positive");
        ensure!(self.missile_speed > 0.0, "missile_speed must be positive");
        ensure!(
            self.speed_decay > 0.0 && self.speed_decay < 1.0,
            "speed_decay must be in (0, 1)"
        );
        ensure!(self.vehicle_hp > 0, "vehicle_hp must be positive");
        ensure!(
            self.min_spawn_interval <= self.max_spawn_interval,
            "spawn interval range is empty"
        );
        ensure!(self.total_laps > 0, "total_laps must be positive");
        ensure!(self.countdown >= 0.0, "countdown cannot be negative");
        Ok(())
    }
}
