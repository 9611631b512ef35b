//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must stay deterministic:
//! - Time only enters through `dt`
//! - Seeded RNG only
//! - Stable iteration order (players first, then AI, by id)
//! - No rendering, audio or platform dependencies

pub mod bullet;
pub mod geometry;
pub mod input;
pub mod missile;
pub mod physics;
pub mod race;
pub mod snapshot;
pub mod steering;
pub mod track;
pub mod vector;
pub mod vehicle;
pub mod weapon;

pub use bullet::Bullet;
pub use geometry::{Aabb, Polygon, Rect, Segment, do_intersect};
pub use input::{Action, InputEvent};
pub use missile::{Missile, Target};
pub use physics::{BodyKind, MotionState, RigidBody, WallProbe};
pub use race::{Race, RaceEvent, RaceKind, RacePhase, RaceSetup, standings_order};
pub use snapshot::{PickupView, RaceSnapshot, VehicleView};
pub use steering::{Autopilot, Steer, steer, wrap_checkpoint_index};
pub use track::{Pickup, Track, TrackLayout, TrackSource};
pub use vector::{Axis, VectorExt};
pub use vehicle::{Controller, Vehicle, VehicleId, VehicleModel};
pub use weapon::{EffectTick, SoundCue, Weapon, WeaponKind};
