//! Mapping rules
//!
//! A rule turns one raw OSC number into one mapped output value and names
//! the targets that value should be written to.

use serde::{Deserialize, Serialize};

use crate::mapping::target::{PropertyTarget, Target};

/// Closed numeric interval `[min, max]`. `min > max` is allowed and maps
/// in reverse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub const UNIT: ValueRange = ValueRange { min: 0.0, max: 1.0 };

    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.max == self.min
    }

    /// Smallest and largest endpoint, whatever the orientation
    pub fn bounds(&self) -> (f64, f64) {
        (self.min.min(self.max), self.min.max(self.max))
    }
}

impl Default for ValueRange {
    fn default() -> Self {
        Self::UNIT
    }
}

/// Rotation axis of a bone rotation target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Axis {
    #[default]
    #[serde(alias = "x")]
    X,
    #[serde(alias = "y")]
    Y,
    #[serde(alias = "z")]
    Z,
}

impl Axis {
    /// Component index inside an Euler triple
    pub fn euler_index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Component index inside a `(w, x, y, z)` quaternion
    pub fn quaternion_index(self) -> usize {
        self.euler_index() + 1
    }
}

/// How a bone rotation value is interpreted by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RotationMode {
    #[default]
    #[serde(alias = "euler")]
    Euler,
    #[serde(alias = "quaternion")]
    Quaternion,
}

/// Character rig payload: a shape key and/or a bone rotation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CharacterTarget {
    pub object: String,
    pub shape_key: String,
    pub armature: String,
    pub bone: String,
    pub axis: Axis,
    pub rotation_mode: RotationMode,
}

/// Kind-specific part of a rule
#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    Character(CharacterTarget),
    Generic(PropertyTarget),
}

/// One configured address → value → target(s) mapping
#[derive(Debug, Clone, PartialEq)]
pub struct MappingRule {
    pub address: String,
    pub input: ValueRange,
    pub output: ValueRange,
    pub clamp: bool,
    pub invert: bool,
    pub kind: RuleKind,
}

impl MappingRule {
    /// Rule with unit ranges, clamping on and no inversion
    pub fn new(address: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            address: address.into(),
            input: ValueRange::UNIT,
            output: ValueRange::UNIT,
            clamp: true,
            invert: false,
            kind,
        }
    }

    pub fn with_input(mut self, min: f64, max: f64) -> Self {
        self.input = ValueRange::new(min, max);
        self
    }

    pub fn with_output(mut self, min: f64, max: f64) -> Self {
        self.output = ValueRange::new(min, max);
        self
    }

    pub fn with_clamp(mut self, clamp: bool) -> Self {
        self.clamp = clamp;
        self
    }

    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    /// Map a raw value from the input range onto the output range.
    ///
    /// A degenerate input range normalizes every value to `0.0`, so with
    /// `invert` set the result is always `output.max`.
    #[inline]
    pub fn map_value(&self, v: f64) -> f64 {
        let mut t = if self.input.is_degenerate() {
            0.0
        } else {
            (v - self.input.min) / self.input.span()
        };

        if self.clamp {
            // NaN saturates high, like `max(0, min(1, t))` does.
            t = if t.is_nan() { 1.0 } else { t.clamp(0.0, 1.0) };
        }

        if self.invert {
            t = 1.0 - t;
        }

        self.output.min + t * self.output.span()
    }

    /// Concrete targets this rule writes to, in a fixed order.
    ///
    /// A character rule yields its shape key when one is named, then its bone
    /// when both armature and bone are named; it may yield nothing at all.
    pub fn targets(&self) -> impl Iterator<Item = Target> + '_ {
        let (first, second) = match &self.kind {
            RuleKind::Character(c) => {
                let shape_key = (!c.shape_key.is_empty()).then(|| Target::ShapeKey {
                    object: c.object.clone(),
                    shape_key: c.shape_key.clone(),
                });
                let bone = (!c.armature.is_empty() && !c.bone.is_empty()).then(|| {
                    Target::BoneRotation {
                        armature: c.armature.clone(),
                        bone: c.bone.clone(),
                        axis: c.axis,
                        mode: c.rotation_mode,
                    }
                });
                (shape_key, bone)
            }
            RuleKind::Generic(path) => (Some(Target::Property(path.clone())), None),
        };
        first.into_iter().chain(second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{OscArg, OscMessage};
    use proptest::prelude::*;

    fn generic(address: &str) -> MappingRule {
        MappingRule::new(address, RuleKind::Generic(PropertyTarget::TimelineFrame))
    }

    #[test]
    fn test_identity_mapping() {
        let rule = generic("/face/smile");
        assert_eq!(rule.map_value(0.5), 0.5);
        assert_eq!(rule.map_value(0.0), 0.0);
        assert_eq!(rule.map_value(1.0), 1.0);
    }

    #[test]
    fn test_invert() {
        let rule = generic("/face/smile").with_invert(true);
        assert!((rule.map_value(0.2) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_rescale_and_clamp() {
        let rule = generic("/knob").with_input(0.0, 127.0).with_output(-1.0, 1.0);
        assert_eq!(rule.map_value(0.0), -1.0);
        assert_eq!(rule.map_value(127.0), 1.0);
        assert_eq!(rule.map_value(500.0), 1.0);
        assert_eq!(rule.map_value(-3.0), -1.0);
    }

    #[test]
    fn test_unclamped_extrapolates() {
        let rule = generic("/knob").with_output(0.0, 10.0).with_clamp(false);
        assert_eq!(rule.map_value(2.0), 20.0);
        assert_eq!(rule.map_value(-0.5), -5.0);
    }

    #[test]
    fn test_nan_input_clamped() {
        let rule = generic("/face/smile").with_output(-2.0, 4.0);
        assert_eq!(rule.map_value(f64::NAN), 4.0);
        assert_eq!(rule.clone().with_invert(true).map_value(f64::NAN), -2.0);
        assert_eq!(rule.map_value(f64::INFINITY), 4.0);
        assert_eq!(rule.map_value(f64::NEG_INFINITY), -2.0);

        let wire = OscMessage::new("/face/smile", vec![OscArg::Float(f32::NAN)]);
        let value = wire.first_numeric().unwrap();
        assert_eq!(generic("/face/smile").map_value(value), 1.0);

        assert!(rule.with_clamp(false).map_value(f64::NAN).is_nan());
    }

    #[test]
    fn test_degenerate_input_range() {
        let rule = generic("/flat").with_input(3.0, 3.0).with_output(2.0, 6.0);
        assert_eq!(rule.map_value(3.0), 2.0);
        assert_eq!(rule.map_value(-100.0), 2.0);
        assert_eq!(rule.clone().with_invert(true).map_value(42.0), 6.0);
    }

    #[test]
    fn test_character_fan_out() {
        let full = MappingRule::new(
            "/jaw",
            RuleKind::Character(CharacterTarget {
                object: "Face".into(),
                shape_key: "jawOpen".into(),
                armature: "Rig".into(),
                bone: "jaw".into(),
                axis: Axis::Z,
                rotation_mode: RotationMode::Quaternion,
            }),
        );
        let targets: Vec<_> = full.targets().collect();
        assert_eq!(targets.len(), 2);
        assert!(matches!(targets[0], Target::ShapeKey { .. }));
        assert!(matches!(
            targets[1],
            Target::BoneRotation {
                axis: Axis::Z,
                mode: RotationMode::Quaternion,
                ..
            }
        ));

        let bone_without_armature = MappingRule::new(
            "/jaw",
            RuleKind::Character(CharacterTarget {
                bone: "jaw".into(),
                ..Default::default()
            }),
        );
        assert_eq!(bone_without_armature.targets().count(), 0);
    }

    #[test]
    fn test_axis_indices() {
        assert_eq!(Axis::X.euler_index(), 0);
        assert_eq!(Axis::Z.quaternion_index(), 3);
    }

    fn finite() -> impl Strategy<Value = f64> {
        -1.0e6f64..1.0e6
    }

    fn any_input() -> impl Strategy<Value = f64> {
        prop_oneof![
            8 => finite(),
            1 => Just(f64::NAN),
            1 => Just(f64::INFINITY),
            1 => Just(f64::NEG_INFINITY),
        ]
    }

    proptest! {
        #[test]
        fn prop_clamped_output_within_bounds(
            min_in in finite(), max_in in finite(),
            min_out in finite(), max_out in finite(),
            invert in any::<bool>(), v in any_input(),
        ) {
            let rule = generic("/p")
                .with_input(min_in, max_in)
                .with_output(min_out, max_out)
                .with_invert(invert);
            let mapped = rule.map_value(v);
            let (lo, hi) = rule.output.bounds();
            let eps = 1e-9 * (1.0 + lo.abs().max(hi.abs()));
            prop_assert!(mapped >= lo - eps && mapped <= hi + eps);
        }

        #[test]
        fn prop_degenerate_range_is_constant(
            point in finite(), min_out in finite(), max_out in finite(),
            invert in any::<bool>(), clamp in any::<bool>(), v in finite(),
        ) {
            let rule = generic("/p")
                .with_input(point, point)
                .with_output(min_out, max_out)
                .with_clamp(clamp)
                .with_invert(invert);
            let factor = if invert { 1.0 } else { 0.0 };
            let expected = min_out + factor * (max_out - min_out);
            prop_assert_eq!(rule.map_value(v), expected);
        }

        #[test]
        fn prop_invert_mirrors_output(
            min_in in -1.0e3f64..1.0e3, span in 1.0f64..1.0e3,
            min_out in -1.0e3f64..1.0e3, max_out in -1.0e3f64..1.0e3,
            v in -1.0e3f64..1.0e3,
        ) {
            let plain = generic("/p")
                .with_input(min_in, min_in + span)
                .with_output(min_out, max_out)
                .with_clamp(false);
            let inverted = plain.clone().with_invert(true);
            let lhs = inverted.map_value(v);
            let rhs = min_out + max_out - plain.map_value(v);
            prop_assert!((lhs - rhs).abs() <= 1e-6);
        }
    }
}
