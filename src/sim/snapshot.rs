//! Read-only view of a race for the render and audio side
//!
//! Everything is copied out, so a snapshot can cross threads and outlive the
//! tick that produced it.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::race::{Race, RaceKind, RacePhase};
use super::vehicle::{Vehicle, VehicleId};
use super::weapon::{SoundCue, WeaponKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleView {
    pub id: VehicleId,
    pub is_ai: bool,
    /// Input slot for human drivers
    pub slot: Option<usize>,
    pub corners: [DVec2; 4],
    pub position: DVec2,
    pub rotation: f64,
    pub speed: f64,
    /// Drift angle, for skid marks
    pub sliding_angle: f64,
    pub hp: i32,
    pub destroyed: bool,
    pub laps: u32,
    pub visited: usize,
    pub place: Option<usize>,
    /// Held weapons, oldest first
    pub weapons: Vec<WeaponKind>,
    pub bullets: Vec<[DVec2; 4]>,
    pub missiles: Vec<[DVec2; 4]>,
}

impl VehicleView {
    fn capture(vehicle: &Vehicle) -> Self {
        let body = vehicle.body();
        Self {
            id: vehicle.id(),
            is_ai: vehicle.is_ai(),
            slot: vehicle.slot(),
            corners: vehicle.shape().corners(),
            position: body.position(),
            rotation: body.rotation(),
            speed: body.speed(),
            sliding_angle: body.sliding_angle(),
            hp: vehicle.hp(),
            destroyed: vehicle.is_destroyed(),
            laps: vehicle.laps(),
            visited: vehicle.visited(),
            place: vehicle.place(),
            weapons: vehicle.weapons().iter().map(|w| w.kind()).collect(),
            bullets: vehicle
                .bullets()
                .iter()
                .filter(|b| b.is_flying())
                .map(|b| b.shape().corners())
                .collect(),
            missiles: vehicle
                .weapons()
                .iter()
                .filter_map(|w| w.missile())
                .filter(|m| m.is_flying())
                .map(|m| m.shape().corners())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupView {
    pub kind: WeaponKind,
    pub corners: [DVec2; 4],
}

/// Everything a frame needs to draw and play
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceSnapshot {
    pub kind: RaceKind,
    pub phase: RacePhase,
    /// Seconds since the start signal
    pub race_time: f64,
    /// Current lap clock (time trial)
    pub lap_time: f64,
    pub laps_driven: u32,
    pub total_laps: u32,
    pub best_lap: Option<f64>,
    pub last_lap: Option<f64>,
    pub winner: Option<VehicleId>,
    pub vehicles: Vec<VehicleView>,
    pub pickups: Vec<PickupView>,
    pub obstacles: Vec<[DVec2; 4]>,
    /// Sounds requested during the last tick (since the last read when served by a runner)
    pub sounds: Vec<(VehicleId, SoundCue)>,
}

impl RaceSnapshot {
    pub fn capture(race: &Race) -> Self {
        let track = race.track();
        Self {
            kind: race.kind(),
            phase: race.phase(),
            race_time: race.race_time(),
            lap_time: race.lap_time(),
            laps_driven: race.laps_driven(),
            total_laps: race.total_laps(),
            best_lap: race.lap_log().best(),
            last_lap: race.lap_log().last(),
            winner: race.winner(),
            vehicles: race.vehicles().iter().map(VehicleView::capture).collect(),
            pickups: track
                .pickups()
                .iter()
                .map(|p| PickupView {
                    kind: p.kind(),
                    corners: p.shape.corners(),
                })
                .collect(),
            obstacles: track.obstacles().iter().map(|o| o.corners()).collect(),
            sounds: race.sounds().to_vec(),
        }
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&VehicleView> {
        self.vehicles.iter().find(|v| v.id == id)
    }

    /// Vehicle ids, leader first
    pub fn standings(&self) -> Vec<VehicleId> {
        let mut ranked: Vec<_> = self
            .vehicles
            .iter()
            .map(|v| (v.place.unwrap_or(usize::MAX), v.id))
            .collect();
        ranked.sort();
        ranked.into_iter().map(|(_, id)| id).collect()
    }
}
