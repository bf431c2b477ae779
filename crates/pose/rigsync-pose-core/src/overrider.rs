//! Pose overriders and their per-node containers.

use serde::{Deserialize, Serialize};

use rigsync_api_core::NodeId;

use crate::condition::{PoseCondition, PoseEnvironment};
use crate::error::PoseError;

/// Reference to a pose asset known to the playback service.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoseId(pub u64);

/// Playing-time bounds in seconds.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseDuration {
    /// A playing pose is not stopped before this much time has elapsed.
    #[serde(default)]
    pub min: f32,
    /// A playing pose is stopped once this much time has elapsed.
    #[serde(default)]
    pub max: Option<f32>,
}

/// How an overrider is triggered.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverriderKind {
    /// Needs an active hover signal; starts as soon as its conditions hold.
    HoverEnter,
    /// Starts as soon as its conditions hold.
    Trigger,
    /// Continuously evaluated; starts once its selection has been confirmed.
    Ambient,
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseOverrider {
    pub pose: PoseId,
    #[serde(default)]
    pub conditions: Vec<PoseCondition>,
    #[serde(default)]
    pub is_hover_enter: bool,
    #[serde(default)]
    pub is_trigger: bool,
    #[serde(default)]
    pub duration: PoseDuration,
    #[serde(default = "yes")]
    pub interpolable: bool,
}

impl PoseOverrider {
    pub fn new(pose: PoseId, conditions: Vec<PoseCondition>) -> Self {
        Self {
            pose,
            conditions,
            is_hover_enter: false,
            is_trigger: false,
            duration: PoseDuration::default(),
            interpolable: true,
        }
    }

    pub fn trigger(mut self) -> Self {
        self.is_trigger = true;
        self
    }

    pub fn hover_enter(mut self) -> Self {
        self.is_hover_enter = true;
        self
    }

    pub fn with_duration(mut self, min: f32, max: Option<f32>) -> Self {
        self.duration = PoseDuration { min, max };
        self
    }

    pub fn kind(&self) -> OverriderKind {
        if self.is_hover_enter {
            OverriderKind::HoverEnter
        } else if self.is_trigger {
            OverriderKind::Trigger
        } else {
            OverriderKind::Ambient
        }
    }

    /// Evaluated without any hover or engagement signal.
    pub fn is_environmental(&self) -> bool {
        !self.is_hover_enter && !self.conditions.iter().any(PoseCondition::requires_interaction)
    }

    /// All conditions hold. An overrider without conditions never holds.
    pub fn conditions_hold(&self, env: &dyn PoseEnvironment) -> bool {
        !self.conditions.is_empty() && self.conditions.iter().all(|c| c.evaluate(env))
    }
}

/// Overriders attached to one scene node, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseOverriderContainer {
    pub node: NodeId,
    #[serde(default)]
    pub overriders: Vec<PoseOverrider>,
}

impl PoseOverriderContainer {
    pub fn new(node: NodeId, overriders: Vec<PoseOverrider>) -> Self {
        Self { node, overriders }
    }

    pub fn validate(&self) -> Result<(), PoseError> {
        for (i, o) in self.overriders.iter().enumerate() {
            let PoseDuration { min, max } = o.duration;
            if !min.is_finite() || min < 0.0 {
                return Err(PoseError::NonFinite {
                    node: self.node,
                    overrider: i,
                    field: "duration.min",
                });
            }
            if let Some(max) = max {
                if !max.is_finite() {
                    return Err(PoseError::NonFinite {
                        node: self.node,
                        overrider: i,
                        field: "duration.max",
                    });
                }
                if max < min {
                    return Err(PoseError::InvalidDuration {
                        node: self.node,
                        overrider: i,
                        min,
                        max,
                    });
                }
            }
            for c in &o.conditions {
                c.validate(self.node, i)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigsync_api_core::BoneType;

    fn magnitude() -> PoseCondition {
        PoseCondition::Magnitude {
            bone_origin: BoneType(13),
            target_object_id: NodeId(1),
            magnitude: 1.0,
        }
    }

    #[test]
    fn classification() {
        let ambient = PoseOverrider::new(PoseId(1), vec![magnitude()]);
        assert_eq!(ambient.kind(), OverriderKind::Ambient);
        assert!(ambient.is_environmental());

        let hover = PoseOverrider::new(PoseId(2), vec![magnitude()]).hover_enter().trigger();
        assert_eq!(hover.kind(), OverriderKind::HoverEnter);
        assert!(!hover.is_environmental());

        let projected = PoseOverrider::new(
            PoseId(3),
            vec![magnitude(), PoseCondition::Projected { interactable_id: NodeId(4) }],
        )
        .trigger();
        assert_eq!(projected.kind(), OverriderKind::Trigger);
        assert!(!projected.is_environmental());
    }

    #[test]
    fn validate_checks_durations() {
        let c = PoseOverriderContainer::new(
            NodeId(9),
            vec![PoseOverrider::new(PoseId(1), vec![magnitude()]).with_duration(2.0, Some(1.0))],
        );
        assert_eq!(
            c.validate(),
            Err(PoseError::InvalidDuration {
                node: NodeId(9),
                overrider: 0,
                min: 2.0,
                max: 1.0
            })
        );
        let ok = PoseOverriderContainer::new(
            NodeId(9),
            vec![PoseOverrider::new(PoseId(1), vec![magnitude()]).with_duration(0.5, Some(1.0))],
        );
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn container_json_defaults() {
        let c: PoseOverriderContainer = serde_json::from_str(
            r#"{"node": 3, "overriders": [{"pose": 7, "conditions": [], "isTrigger": true}]}"#,
        )
        .unwrap();
        let o = &c.overriders[0];
        assert_eq!(o.pose, PoseId(7));
        assert!(o.is_trigger && !o.is_hover_enter && o.interpolable);
        assert_eq!(o.duration, PoseDuration::default());
    }
}
