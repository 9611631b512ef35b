//! Track geometry and the weapon economy
//!
//! Walls, checkpoints and the finish line are static. Oil slicks are placed
//! once at random weapon points. Weapons spawn on a timer at free weapon
//! points until the track holds the maximum number of pending pickups.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail, ensure};
use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::geometry::{Rect, Segment};
use super::physics::WallProbe;
use super::weapon::{WEAPON_ICON_SIZE, Weapon, WeaponKind};
use crate::consts::SPAWN_POINT_RETRIES;
use crate::tuning::Tuning;

/// Oil slick size
pub const OBSTACLE_SIZE: f64 = 70.0;

/// Geometry handed over by a track provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackLayout {
    #[serde(default)]
    pub name: String,
    pub finish_line: Rect,
    pub walls: Vec<Rect>,
    /// Visited in order every lap
    pub checkpoints: Vec<Rect>,
    /// Candidate positions for weapons and oil slicks
    pub weapon_points: Vec<DVec2>,
    /// Vehicle start positions; defaults are used when empty
    #[serde(default)]
    pub start_positions: Vec<DVec2>,
}

impl TrackLayout {
    pub fn from_json(json: &str) -> Result<Self> {
        let layout: TrackLayout = serde_json::from_str(json).context("invalid track JSON")?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read track {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("bad track {}", path.display()))
    }

    /// Reject geometry a race cannot run on
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.walls.is_empty(), "track has no walls");
        ensure!(!self.checkpoints.is_empty(), "track has no checkpoints");
        ensure!(!self.weapon_points.is_empty(), "track has no weapon spawn points");
        ensure!(self.finish_line.is_valid(), "finish line is malformed");
        for (i, wall) in self.walls.iter().enumerate() {
            ensure!(wall.is_valid(), "wall {i} is malformed");
        }
        for (i, checkpoint) in self.checkpoints.iter().enumerate() {
            ensure!(checkpoint.is_valid(), "checkpoint {i} is malformed");
        }
        let points = self.weapon_points.iter().chain(&self.start_positions);
        for point in points {
            ensure!(point.is_finite(), "spawn point ({}, {}) is not finite", point.x, point.y);
        }
        Ok(())
    }

    /// Start positions, falling back to a column near the top-left corner
    pub fn start_positions(&self) -> Vec<DVec2> {
        if self.start_positions.is_empty() {
            (0..4)
                .map(|i| DVec2::new(100.0, 100.0 + i as f64 * 50.0))
                .collect()
        } else {
            self.start_positions.clone()
        }
    }
}

/// Supplies track geometry (a map file, an editor, a test fixture...)
pub trait TrackSource {
    fn layout(&self) -> Result<TrackLayout>;
}

impl TrackSource for TrackLayout {
    fn layout(&self) -> Result<TrackLayout> {
        self.validate()?;
        Ok(self.clone())
    }
}

impl TrackSource for Path {
    fn layout(&self) -> Result<TrackLayout> {
        TrackLayout::load(self)
    }
}

/// A weapon lying on the track
#[derive(Debug, Clone)]
pub struct Pickup {
    pub weapon: Weapon,
    pub shape: Rect,
    /// Reserved weapon point
    slot: usize,
}

impl Pickup {
    pub fn kind(&self) -> WeaponKind {
        self.weapon.kind()
    }
}

#[derive(Debug, Clone)]
pub struct Track {
    name: String,
    tuning: Arc<Tuning>,
    finish_line: Rect,
    walls: Vec<Rect>,
    checkpoints: Vec<Rect>,
    weapon_points: Vec<DVec2>,
    start_positions: Vec<DVec2>,
    obstacles: Vec<Rect>,
    pickups: Vec<Pickup>,
    /// Weapon points currently holding a pickup
    reserved: Vec<usize>,
    launchers_spawned: u32,
    spawn_timer: f64,
    next_spawn: f64,
    rng: Pcg32,
}

impl Track {
    pub fn new(layout: TrackLayout, tuning: Arc<Tuning>, seed: u64) -> Result<Self> {
        layout.validate()?;
        let mut rng = Pcg32::seed_from_u64(seed);
        let start_positions = layout.start_positions();

        let obstacles = (0..tuning.obstacle_count)
            .map(|_| {
                let index = rng.random_range(0..layout.weapon_points.len());
                Rect::new(
                    layout.weapon_points[index],
                    DVec2::splat(OBSTACLE_SIZE),
                    0.0,
                )
            })
            .collect();

        log::info!(
            "Track '{}': {} walls, {} checkpoints, {} weapon points",
            layout.name,
            layout.walls.len(),
            layout.checkpoints.len(),
            layout.weapon_points.len()
        );

        Ok(Self {
            name: layout.name,
            next_spawn: tuning.first_spawn_delay,
            tuning,
            finish_line: layout.finish_line,
            walls: layout.walls,
            checkpoints: layout.checkpoints,
            weapon_points: layout.weapon_points,
            start_positions,
            obstacles,
            pickups: Vec::new(),
            reserved: Vec::new(),
            launchers_spawned: 0,
            spawn_timer: 0.0,
            rng,
        })
    }

    // === Accessors ===

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn finish_line(&self) -> &Rect {
        &self.finish_line
    }

    pub fn walls(&self) -> &[Rect] {
        &self.walls
    }

    pub fn checkpoints(&self) -> &[Rect] {
        &self.checkpoints
    }

    pub fn weapon_points(&self) -> &[DVec2] {
        &self.weapon_points
    }

    pub fn start_positions(&self) -> &[DVec2] {
        &self.start_positions
    }

    pub fn obstacles(&self) -> &[Rect] {
        &self.obstacles
    }

    pub fn pickups(&self) -> &[Pickup] {
        &self.pickups
    }

    pub fn launchers_spawned(&self) -> u32 {
        self.launchers_spawned
    }

    // === Queries ===

    /// Edge-level wall test, bounding-box culled per wall
    pub fn is_wall_hit(&self, shape: &Rect) -> bool {
        self.walls.iter().any(|wall| shape.overlaps(wall))
    }

    /// First wall edge crossed by `shape`, or [`Segment::none`]
    pub fn crashed_edge(&self, shape: &Rect) -> Segment {
        let poly = shape.polygon();
        self.walls
            .iter()
            .find(|wall| shape.overlaps(wall))
            .map(|wall| poly.crashed_edge(&wall.polygon()))
            .unwrap_or_else(Segment::none)
    }

    pub fn is_on_finish_line(&self, shape: &Rect) -> bool {
        shape.polygon().intersects(&self.finish_line.polygon())
    }

    /// Whether `shape` touches checkpoint `index`; out-of-range is a miss
    pub fn is_checkpoint_hit(&self, shape: &Rect, index: usize) -> bool {
        self.checkpoints
            .get(index)
            .is_some_and(|checkpoint| shape.polygon().intersects(&checkpoint.polygon()))
    }

    pub fn is_oil_hit(&self, shape: &Rect) -> bool {
        let poly = shape.polygon();
        self.obstacles
            .iter()
            .any(|oil| poly.intersects(&oil.polygon()))
    }

    /// Index of the first pickup whose box overlaps `shape`
    pub fn weapon_hit(&self, shape: &Rect) -> Option<usize> {
        let bounds = shape.bounds();
        self.pickups
            .iter()
            .position(|p| p.shape.bounds().intersects(&bounds))
    }

    // === Weapon economy ===

    /// Hand the pickup at `index` over to the caller and free its slot
    pub fn pick_weapon(&mut self, index: usize) -> Result<Weapon> {
        if index >= self.pickups.len() {
            bail!(
                "invalid pickup index {index} ({} pickups on track)",
                self.pickups.len()
            );
        }
        let pickup = self.pickups.remove(index);
        self.reserved.retain(|&slot| slot != pickup.slot);
        Ok(pickup.weapon)
    }

    /// Roll a new weapon if there is room; returns what spawned
    pub fn spawn_weapon(&mut self) -> Option<WeaponKind> {
        if self.pickups.len() >= self.tuning.max_pending_weapons {
            return None;
        }

        let roll = self.rng.random_range(0..=100);
        let kind = if roll <= 30 {
            WeaponKind::Gun
        } else if roll >= 90 && self.launchers_spawned < self.tuning.max_missile_launchers {
            self.launchers_spawned += 1;
            WeaponKind::MissileLauncher
        } else if roll < 90 {
            WeaponKind::Turbo
        } else if self.rng.random_range(0..=1) == 1 {
            WeaponKind::Gun
        } else {
            WeaponKind::Turbo
        };

        let slot = self.free_slot();
        self.push_pickup(kind, slot);
        Some(kind)
    }

    /// Put a weapon of `kind` on the free weapon point `slot`
    pub fn place_weapon(&mut self, kind: WeaponKind, slot: usize) -> Result<()> {
        ensure!(
            slot < self.weapon_points.len(),
            "invalid weapon point {slot} ({} on track)",
            self.weapon_points.len()
        );
        ensure!(!self.reserved.contains(&slot), "weapon point {slot} is taken");
        ensure!(
            self.pickups.len() < self.tuning.max_pending_weapons,
            "track already holds {} weapons",
            self.pickups.len()
        );
        if kind == WeaponKind::MissileLauncher {
            self.launchers_spawned += 1;
        }
        self.push_pickup(kind, slot);
        Ok(())
    }

    fn push_pickup(&mut self, kind: WeaponKind, slot: usize) {
        self.reserved.push(slot);
        let shape = Rect::new(
            self.weapon_points[slot],
            DVec2::splat(WEAPON_ICON_SIZE),
            0.0,
        );
        self.pickups.push(Pickup {
            weapon: Weapon::new(kind, &self.tuning),
            shape,
            slot,
        });
        log::info!("Spawned {} at weapon point {slot}", kind.as_str());
    }

    /// Random weapon point, re-rolled a bounded number of times while taken
    fn free_slot(&mut self) -> usize {
        let count = self.weapon_points.len();
        let mut slot = self.rng.random_range(0..count);
        for _ in 0..SPAWN_POINT_RETRIES {
            if !self.reserved.contains(&slot) {
                break;
            }
            slot = self.rng.random_range(0..count);
        }
        slot
    }

    /// Advance the spawn timer; returns a weapon spawned this tick
    pub fn update(&mut self, dt: f64) -> Option<WeaponKind> {
        self.spawn_timer += dt;
        if self.spawn_timer <= self.next_spawn {
            return None;
        }
        self.spawn_timer = 0.0;
        let (min, max) = (self.tuning.min_spawn_interval, self.tuning.max_spawn_interval);
        self.next_spawn = self.rng.random_range(min..=max) as f64;
        self.spawn_weapon()
    }
}

impl WallProbe for Track {
    fn is_wall_hit(&self, shape: &Rect) -> bool {
        Track::is_wall_hit(self, shape)
    }
}
