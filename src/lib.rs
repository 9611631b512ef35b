//! Slick Racers - simulation core for a top-down racing game
//!
//! Core modules:
//! - `sim`: Deterministic simulation (kinematics, polygon collisions, race rules)
//! - `runner`: Update thread that owns a race and serves snapshots
//! - `laptimes`: Best-lap log persisted between sessions
//! - `tuning`: Data-driven game balance

pub mod laptimes;
pub mod runner;
pub mod sim;
pub mod tuning;

pub use laptimes::LapLog;
pub use runner::{Command, RaceRunner, RunnerConfig};
pub use tuning::Tuning;

use glam::DVec2;

/// Default tuning values (see [`Tuning`] for the live configuration)
pub mod consts {
    /// Forward acceleration of a vehicle (units/s²)
    pub const ACC: f64 = 200.0;
    /// Forward acceleration of a missile (units/s²)
    pub const MISSILE_ACC: f64 = 800.0;
    /// Reverse gear acceleration
    pub const REVERSE_ACC: f64 = 50.0;
    /// Vehicle speed cap, enforced softly
    pub const MAX_SPEED: f64 = 1300.0;
    /// Missile speed cap, also the muzzle velocity addend for launches
    pub const MISSILE_SPEED: f64 = 2600.0;
    /// Muzzle velocity addend for bullets
    pub const BULLET_SPEED: f64 = 3000.0;

    /// Player turn rate (degrees/s)
    pub const ANG_VEL: f64 = 150.0;
    /// AI turn rate; the AI cheats a bit
    pub const AI_ANG_VEL: f64 = 300.0;
    pub const MISSILE_ANG_VEL: f64 = 600.0;
    /// Bearing error (degrees) below which the autopilot drives straight
    pub const HEADING_TOLERANCE: f64 = 10.0;

    /// Velocity kept after bouncing off a wall
    pub const ELASTIC_COEFF: f64 = 0.5;
    /// Push-out distance after a wall hit
    pub const PUSH_OUT: f64 = 8.0;
    /// Impact speed above which the push-out doubles
    pub const FAST_IMPACT_SPEED: f64 = 500.0;
    /// Nudge applied to rotation on every wall hit (degrees)
    pub const COLLISION_NUDGE: f64 = 5.0;

    /// Seconds after a collision before accelerating regains grip
    pub const COLLISION_GRACE: f64 = 0.3;
    /// Minimum seconds between two direction fixes
    pub const FIX_INTERVAL: f64 = 0.1;
    /// Minimum seconds between two `rotate` calls
    pub const ROTATE_DEBOUNCE: f64 = 0.05;
    /// Below this speed a braking body comes to a full stop
    pub const BRAKE_STOP_SPEED: f64 = 30.0;
    /// Per-tick velocity factor once the speed cap is exceeded
    pub const SPEED_DECAY: f64 = 0.98;

    pub const VEHICLE_HP: i32 = 150;
    pub const WALL_DMG: i32 = 10;
    pub const BULLET_DMG: i32 = 40;
    pub const MISSILE_DMG: i32 = 10;

    /// Bullets granted by a gun pickup
    pub const GUN_AMMO: usize = 20;
    pub const TURBO_DURATION: f64 = 3.0;
    /// Per-tick speed multiplier while a turbo burns
    pub const TURBO_BOOST: f64 = 1.05;
    /// Turbo stops boosting above `MAX_SPEED * TURBO_CAP_FACTOR`
    pub const TURBO_CAP_FACTOR: f64 = 1.2;
    /// Lock-on radius of a homing missile
    pub const MISSILE_RANGE: f64 = 250.0;
    /// Seconds a missile flies before self-destructing
    pub const MISSILE_FUEL: f64 = 10.0;
    /// Bullets beyond this distance on either axis are culled
    pub const WORLD_BOUND: f64 = 4000.0;
    /// Spin applied by an oil slick (degrees/s)
    pub const OIL_SPIN: f64 = 100.0;

    pub const TOTAL_LAPS: u32 = 5;

    /// Weapon spawner
    pub const FIRST_SPAWN_DELAY: f64 = 2.0;
    pub const MIN_SPAWN_INTERVAL: u32 = 6;
    pub const MAX_SPAWN_INTERVAL: u32 = 15;
    pub const MAX_PENDING_WEAPONS: usize = 3;
    pub const MAX_MISSILE_LAUNCHERS: u32 = 2;
    pub const OBSTACLE_COUNT: usize = 3;
    /// Attempts at finding a free spawn point before giving up
    pub const SPAWN_POINT_RETRIES: usize = 20;

    /// Countdown length before the race starts (seconds)
    pub const COUNTDOWN: f64 = 3.0;
}

/// Convert degrees to radians
#[inline]
pub fn deg_to_rad(degrees: f64) -> f64 {
    degrees * std::f64::consts::PI / 180.0
}

/// Convert radians to degrees
#[inline]
pub fn rad_to_deg(radians: f64) -> f64 {
    radians * 180.0 / std::f64::consts::PI
}

/// Unit vector pointing along a rotation in degrees (0 = +x, clockwise on screen)
#[inline]
pub fn heading(degrees: f64) -> DVec2 {
    let rad = deg_to_rad(degrees);
    DVec2::new(rad.cos(), rad.sin())
}

/// Normalize an angle in degrees to [0, 360)
#[inline]
pub fn normalize_degrees(degrees: f64) -> f64 {
    degrees.rem_euclid(360.0)
}
