//! Differential-drive vehicle kinematics and ray sensors.
//!
//! Every attached part (wheels, sensors, body corners) is stored once as a
//! polar offset from the vehicle center in the canonical frame, where a
//! heading of 0 faces +x. Absolute positions are re-derived from the pose
//! after every move by rotating these offsets.
//!
//! Sign convention: `heading += (right - left) / width`. With screen
//! coordinates (y down) a positive heading change turns clockwise.

use serde::{Deserialize, Serialize};

use super::geometry::{Point, Segment, distance, intersect, normalize_angle, point_on_circle};
use crate::schema::VehicleConfig;

/// Offset of a part relative to the vehicle center, as (angle, distance).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct PolarOffset {
    angle: f64,
    distance: f64,
}

impl PolarOffset {
    fn from_local(x: f64, y: f64) -> Self {
        Self {
            angle: y.atan2(x),
            distance: x.hypot(y),
        }
    }

    fn resolve(&self, center: Point, heading: f64) -> Point {
        point_on_circle(center, self.distance, heading + self.angle)
    }
}

/// A speed-controlled wheel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wheel {
    offset: PolarOffset,
    /// Absolute position, refreshed on every move.
    pub position: Point,
    /// Signed speed in world units per tick.
    pub speed: f64,
}

/// A distance sensor casting a ray at a fixed angle relative to the heading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sensor {
    /// Angle relative to the vehicle heading, in radians.
    pub angle: f64,
    /// Maximum ray length.
    pub range: f64,
    offset: PolarOffset,
    origin: Point,
    absolute_angle: f64,
}

impl Sensor {
    fn new(angle: f64, range: f64, offset: PolarOffset) -> Self {
        Self {
            angle,
            range,
            offset,
            origin: Point::default(),
            absolute_angle: angle,
        }
    }

    fn update(&mut self, center: Point, heading: f64) {
        self.origin = self.offset.resolve(center, heading);
        self.absolute_angle = heading + self.angle;
    }

    /// Where the ray starts.
    pub fn origin(&self) -> Point {
        self.origin
    }

    /// Absolute direction of the ray.
    pub fn absolute_angle(&self) -> f64 {
        self.absolute_angle
    }

    /// Far end of the ray at full range.
    pub fn ray_end(&self) -> Point {
        point_on_circle(self.origin, self.range, self.absolute_angle)
    }

    /// Current ray from the sensor origin out to its range.
    pub fn ray(&self) -> Segment {
        Segment::new(self.origin, self.ray_end())
    }

    /// Hit point and distance from the sensor origin, if the ray crosses `wall`.
    pub fn intersects(&self, wall: &Segment) -> Option<(Point, f64)> {
        intersect(&self.ray(), wall).map(|p| (p, distance(self.origin, p)))
    }
}

/// A rectangular differential-drive vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    center: Point,
    heading: f64,
    initial_heading: f64,
    width: f64,
    height: f64,
    max_speed: f64,
    /// Left and right wheel, in that order.
    wheels: [Wheel; 2],
    sensors: Vec<Sensor>,
    corners: [PolarOffset; 4],
}

impl Vehicle {
    /// Build a vehicle at rest at `center`, facing `config.initial_heading`.
    pub fn new(center: Point, config: &VehicleConfig) -> Self {
        let (hw, hh) = (config.width * 0.5, config.height * 0.5);
        let wheel = |y: f64| Wheel {
            offset: PolarOffset::from_local(0.0, y),
            position: center,
            speed: 0.0,
        };
        let sensor_offset = PolarOffset::from_local(hw, 0.0);
        let sensors = config
            .sensors
            .iter()
            .map(|s| Sensor::new(s.angle, s.range, sensor_offset))
            .collect();

        let mut vehicle = Self {
            center,
            heading: normalize_angle(config.initial_heading),
            initial_heading: normalize_angle(config.initial_heading),
            width: config.width,
            height: config.height,
            max_speed: config.max_speed,
            wheels: [wheel(-hh), wheel(hh)],
            sensors,
            corners: [
                PolarOffset::from_local(-hw, -hh),
                PolarOffset::from_local(hw, -hh),
                PolarOffset::from_local(hw, hh),
                PolarOffset::from_local(-hw, hh),
            ],
        };
        vehicle.update_positions();
        vehicle
    }

    pub fn center(&self) -> Point {
        self.center
    }

    /// Heading in radians, always in `[0, 2π)`.
    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    pub fn wheels(&self) -> &[Wheel; 2] {
        &self.wheels
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    /// Average of the two wheel speeds.
    pub fn speed(&self) -> f64 {
        (self.wheels[0].speed + self.wheels[1].speed) * 0.5
    }

    /// Advance one tick: turn by the wheel differential, then translate
    /// along the new heading by the average wheel speed.
    pub fn move_step(&mut self) {
        let [left, right] = [self.wheels[0].speed, self.wheels[1].speed];
        self.heading = normalize_angle(self.heading + (right - left) / self.width);
        self.center = point_on_circle(self.center, (left + right) * 0.5, self.heading);
        self.update_positions();
    }

    /// Add speed deltas to each wheel, clamping each to `±max_speed`.
    pub fn change_speed(&mut self, d_left: f64, d_right: f64) {
        let max = self.max_speed;
        self.wheels[0].speed = (self.wheels[0].speed + d_left).clamp(-max, max);
        self.wheels[1].speed = (self.wheels[1].speed + d_right).clamp(-max, max);
    }

    /// Apply a controller command: the next move turns by `d_theta` and the
    /// average speed changes by `d_speed`, subject to wheel clamping.
    pub fn drive(&mut self, d_theta: f64, d_speed: f64) {
        let target = self.speed() + d_speed;
        let half_diff = d_theta * self.width * 0.5;
        let d_left = (target - half_diff) - self.wheels[0].speed;
        let d_right = (target + half_diff) - self.wheels[1].speed;
        self.change_speed(d_left, d_right);
    }

    /// Body corners in order top-left, top-right, bottom-right, bottom-left
    /// (canonical frame).
    pub fn corners(&self) -> [Point; 4] {
        self.corners.map(|c| c.resolve(self.center, self.heading))
    }

    /// Body borders ordered Top, Right, Bottom, Left in the canonical frame.
    pub fn body_borders(&self) -> [Segment; 4] {
        let [tl, tr, br, bl] = self.corners();
        [
            Segment::new(tl, tr),
            Segment::new(tr, br),
            Segment::new(bl, br),
            Segment::new(tl, bl),
        ]
    }

    /// First point where the body outline crosses `segment`.
    pub fn collides(&self, segment: &Segment) -> Option<Point> {
        self.body_borders()
            .iter()
            .find_map(|border| intersect(border, segment))
    }

    /// Return to rest at `center` with the initial heading.
    pub fn reset(&mut self, center: Point) {
        self.center = center;
        self.heading = self.initial_heading;
        for wheel in &mut self.wheels {
            wheel.speed = 0.0;
        }
        self.update_positions();
    }

    fn update_positions(&mut self) {
        let (center, heading) = (self.center, self.heading);
        for wheel in &mut self.wheels {
            wheel.position = wheel.offset.resolve(center, heading);
        }
        for sensor in &mut self.sensors {
            sensor.update(center, heading);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SensorConfig, VehicleConfig};
    use proptest::prelude::*;
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    fn config() -> VehicleConfig {
        VehicleConfig {
            width: 10.0,
            height: 10.0,
            max_speed: 5.0,
            initial_heading: 0.0,
            sensors: vec![
                SensorConfig {
                    angle: 0.0,
                    range: 50.0,
                },
                SensorConfig {
                    angle: FRAC_PI_2,
                    range: 50.0,
                },
            ],
            ..Default::default()
        }
    }

    fn close(a: Point, b: Point) -> bool {
        distance(a, b) < 1e-9
    }

    #[test]
    fn test_initial_layout() {
        let v = Vehicle::new(Point::new(100.0, 100.0), &config());
        assert_eq!(v.heading(), 0.0);
        assert!(close(v.wheels()[0].position, Point::new(100.0, 95.0)));
        assert!(close(v.wheels()[1].position, Point::new(100.0, 105.0)));
        assert!(close(v.sensors()[0].origin(), Point::new(105.0, 100.0)));
        assert!(close(v.sensors()[0].ray_end(), Point::new(155.0, 100.0)));
    }

    #[test]
    fn test_straight_motion() {
        let mut v = Vehicle::new(Point::new(0.0, 0.0), &config());
        v.change_speed(2.0, 2.0);
        v.move_step();
        v.move_step();
        assert!(close(v.center(), Point::new(4.0, 0.0)));
        assert_eq!(v.heading(), 0.0);
    }

    #[test]
    fn test_turning_rotates_attached_parts() {
        let fast = VehicleConfig {
            max_speed: 10.0,
            ..config()
        };
        let mut v = Vehicle::new(Point::new(0.0, 0.0), &fast);
        // Pure rotation by π/2 in one tick
        v.drive(FRAC_PI_2, 0.0);
        assert!((v.speed()).abs() < 1e-12);
        v.move_step();
        assert!((v.heading() - FRAC_PI_2).abs() < 1e-12);
        assert!(close(v.center(), Point::new(0.0, 0.0)));
        // Front sensor now points down (+y)
        assert!(close(v.sensors()[0].origin(), Point::new(0.0, 5.0)));
        assert!(close(v.sensors()[0].ray_end(), Point::new(0.0, 55.0)));
    }

    #[test]
    fn test_change_speed_clamps_per_wheel() {
        let mut v = Vehicle::new(Point::default(), &config());
        v.change_speed(100.0, -100.0);
        assert_eq!(v.wheels()[0].speed, 5.0);
        assert_eq!(v.wheels()[1].speed, -5.0);
        v.change_speed(-1.0, 0.5);
        assert_eq!(v.wheels()[0].speed, 4.0);
        assert_eq!(v.wheels()[1].speed, -4.5);
    }

    #[test]
    fn test_zero_drive_is_noop() {
        let mut v = Vehicle::new(Point::new(3.0, 4.0), &config());
        v.drive(0.0, 0.0);
        v.move_step();
        assert_eq!(v.speed(), 0.0);
        assert!(close(v.center(), Point::new(3.0, 4.0)));
    }

    #[test]
    fn test_reset_restores_pose() {
        let mut v = Vehicle::new(Point::new(0.0, 0.0), &config());
        v.drive(0.3, 2.0);
        for _ in 0..10 {
            v.move_step();
        }
        v.reset(Point::new(7.0, 7.0));
        assert_eq!(v.center(), Point::new(7.0, 7.0));
        assert_eq!(v.heading(), 0.0);
        assert_eq!(v.speed(), 0.0);
        assert!(close(v.sensors()[0].origin(), Point::new(12.0, 7.0)));
    }

    #[test]
    fn test_collides_with_wall() {
        let v = Vehicle::new(Point::new(0.0, 0.0), &config());
        let through = Segment::new(Point::new(3.0, -20.0), Point::new(3.0, 20.0));
        let hit = v.collides(&through).unwrap();
        assert!((hit.x - 3.0).abs() < 1e-9);

        let clear = Segment::new(Point::new(8.0, -20.0), Point::new(8.0, 20.0));
        assert!(v.collides(&clear).is_none());
    }

    #[test]
    fn test_sensor_intersection_distance() {
        let v = Vehicle::new(Point::new(0.0, 0.0), &config());
        let wall = Segment::new(Point::new(30.0, -10.0), Point::new(30.0, 10.0));
        let (p, d) = v.sensors()[0].intersects(&wall).unwrap();
        assert!(close(p, Point::new(30.0, 0.0)));
        assert!((d - 25.0).abs() < 1e-9);

        // The side sensor ray is parallel to this wall
        assert!(v.sensors()[1].intersects(&wall).is_none());
    }

    #[test]
    fn test_heading_wraps_negative() {
        let mut v = Vehicle::new(Point::default(), &config());
        v.drive(-PI / 4.0, 0.0);
        v.move_step();
        assert!((v.heading() - 7.0 * PI / 4.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn prop_heading_stays_normalized(
            commands in proptest::collection::vec((-3.0f64..3.0, -5.0f64..5.0), 1..200)
        ) {
            let mut v = Vehicle::new(Point::default(), &config());
            for (d_theta, d_speed) in commands {
                v.drive(d_theta, d_speed);
                v.move_step();
                prop_assert!((0.0..TAU).contains(&v.heading()));
                prop_assert!(v.wheels().iter().all(|w| w.speed.abs() <= v.max_speed()));
            }
        }
    }
}
