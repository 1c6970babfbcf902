use serde::{Deserialize, Serialize};

/// Free, prior and informed consent of the communities a corridor crosses.
///
/// High-severity impacts are admitted only under `Granted`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FpicStatus {
    #[default]
    Pending,
    Granted,
    /// Withheld or withdrawn by the community.
    Withheld,
}

impl FpicStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, FpicStatus::Granted)
    }
}

impl std::fmt::Display for FpicStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FpicStatus::Pending => "pending",
            FpicStatus::Granted => "granted",
            FpicStatus::Withheld => "withheld",
        };
        f.write_str(label)
    }
}
