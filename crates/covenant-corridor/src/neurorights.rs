use covenant_types::OperationChannels;
use serde::{Deserialize, Serialize};

/// Protections a corridor can declare for beings inside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeurorightsFlag {
    /// No fear or pain stimuli used as coercion.
    ForbidFearPainCoercion,
    /// No covert inference of mental states.
    NoCovertInference,
    /// No attempts to shape beliefs.
    NoMentalManipulation,
}

impl NeurorightsFlag {
    pub fn forbids(&self, channels: &OperationChannels) -> bool {
        match self {
            NeurorightsFlag::ForbidFearPainCoercion => channels.fear_or_pain_stimulus,
            NeurorightsFlag::NoCovertInference => channels.mental_state_inference,
            NeurorightsFlag::NoMentalManipulation => channels.belief_shaping,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_flag_guards_one_channel() {
        let inference = OperationChannels {
            mental_state_inference: true,
            ..Default::default()
        };
        assert!(NeurorightsFlag::NoCovertInference.forbids(&inference));
        assert!(!NeurorightsFlag::ForbidFearPainCoercion.forbids(&inference));
        assert!(!NeurorightsFlag::NoMentalManipulation.forbids(&OperationChannels::default()));
    }
}
