//! Robot arm boundary.
//!
//! The session hands back the engine's literal vertex; this module turns it
//! into a physical target and drives an [`Actuator`]. The only arm shipped
//! here is [`SimulatedArm`], which logs every motion instead of moving.

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::board::Color;
use crate::coord::Vertex;

/// Physical layout of the board and stone containers, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Distance between neighbouring intersections.
    pub cell_size_mm: f64,
    /// Arm coordinates of `A1`. X grows to the right, Y grows upward.
    pub origin_x_mm: f64,
    pub origin_y_mm: f64,
    pub z_safe_mm: f64,
    pub z_place_mm: f64,
    pub z_pickup_mm: f64,
    pub black_container: (f64, f64),
    pub white_container: (f64, f64),
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            cell_size_mm: 20.0,
            origin_x_mm: 150.0,
            origin_y_mm: 100.0,
            z_safe_mm: 50.0,
            z_place_mm: 2.0,
            z_pickup_mm: -95.0,
            black_container: (20.0, 20.0),
            white_container: (20.0, 40.0),
        }
    }
}

impl Calibration {
    pub fn container(&self, color: Color) -> (f64, f64) {
        match color {
            Color::Black => self.black_container,
            Color::White => self.white_container,
        }
    }
}

/// Map a GTP vertex such as `"Q16"` to arm coordinates.
pub fn to_robot_coords(gtp: &str, calibration: &Calibration) -> Option<(f64, f64)> {
    let Some(vertex) = Vertex::parse(gtp) else {
        warn!(vertex = gtp, "not a board vertex, no arm target");
        return None;
    };
    let x = calibration.origin_x_mm + vertex.col() as f64 * calibration.cell_size_mm;
    let y = calibration.origin_y_mm + vertex.row() as f64 * calibration.cell_size_mm;
    info!(%vertex, col = vertex.col(), row = vertex.row(), x, y, "vertex mapped to arm target");
    Some((x, y))
}

/// Something that can put stones on the physical board.
pub trait Actuator {
    fn connect(&mut self) -> Result<()>;
    fn disconnect(&mut self) -> Result<()>;
    /// Clear every stone from the board.
    fn reset_board(&mut self) -> Result<()>;
    /// Pick up a stone of `color` from its container.
    fn pick_stone(&mut self, color: Color) -> Result<()>;
    /// Put the held stone down at arm coordinates `(x, y)`.
    fn place_stone(&mut self, x: f64, y: f64) -> Result<()>;
}

/// An arm that only logs.
#[derive(Debug)]
pub struct SimulatedArm {
    calibration: Calibration,
    connected: bool,
    holding: Option<Color>,
    position: (f64, f64, f64),
}

impl SimulatedArm {
    pub fn new(calibration: Calibration) -> Self {
        Self {
            calibration,
            connected: false,
            holding: None,
            position: (0.0, 0.0, calibration.z_safe_mm),
        }
    }

    pub fn position(&self) -> (f64, f64, f64) {
        self.position
    }

    fn ensure_connected(&self) -> Result<()> {
        if !self.connected {
            bail!("arm is not connected");
        }
        Ok(())
    }

    pub fn move_to(&mut self, x: f64, y: f64, z: f64) {
        info!(x, y, z, "arm move");
        self.position = (x, y, z);
    }
}

impl Actuator for SimulatedArm {
    fn connect(&mut self) -> Result<()> {
        info!("arm connected (simulated)");
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        info!("arm disconnected (simulated)");
        self.connected = false;
        Ok(())
    }

    fn reset_board(&mut self) -> Result<()> {
        self.ensure_connected()?;
        info!("clearing physical board (simulated)");
        Ok(())
    }

    fn pick_stone(&mut self, color: Color) -> Result<()> {
        self.ensure_connected()?;
        let (x, y) = self.calibration.container(color);
        let c = self.calibration;
        self.move_to(x, y, c.z_safe_mm);
        self.move_to(x, y, c.z_pickup_mm);
        info!(%color, "gripper on");
        self.move_to(x, y, c.z_safe_mm);
        self.holding = Some(color);
        Ok(())
    }

    fn place_stone(&mut self, x: f64, y: f64) -> Result<()> {
        self.ensure_connected()?;
        let Some(color) = self.holding.take() else {
            bail!("no stone held");
        };
        let c = self.calibration;
        self.move_to(x, y, c.z_safe_mm);
        self.move_to(x, y, c.z_place_mm);
        info!(%color, "gripper off");
        self.move_to(x, y, c.z_safe_mm);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corner_mapping() {
        let c = Calibration::default();
        assert_eq!(to_robot_coords("A1", &c), Some((150.0, 100.0)));
        assert_eq!(to_robot_coords("T19", &c), Some((510.0, 460.0)));
        // J is the ninth column because I is skipped.
        assert_eq!(to_robot_coords("j1", &c), Some((310.0, 100.0)));
    }

    #[test]
    fn test_invalid_vertex_has_no_target() {
        let c = Calibration::default();
        for bad in ["pass", "I5", "Z99", "D0", "D20", ""] {
            assert_eq!(to_robot_coords(bad, &c), None, "{bad:?}");
        }
    }

    #[test]
    fn test_pick_and_place() {
        let mut arm = SimulatedArm::new(Calibration::default());
        assert!(arm.pick_stone(Color::White).is_err(), "must connect first");
        arm.connect().unwrap();
        assert!(arm.place_stone(0.0, 0.0).is_err(), "nothing held yet");
        arm.pick_stone(Color::White).unwrap();
        arm.place_stone(210.0, 160.0).unwrap();
        assert_eq!(arm.position(), (210.0, 160.0, 50.0));
    }
}
