use serde::{Deserialize, Serialize};

/// Direction a desk is travelling in, as reported to the host.
///
/// `Increasing` means the desk is rising towards a higher percentage,
/// `Decreasing` that it is lowering towards a smaller one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionState {
    Decreasing,
    Increasing,
    Stopped,
}

impl MotionState {
    pub fn derive(current: u8, target: u8) -> Self {
        match target.cmp(&current) {
            std::cmp::Ordering::Greater => MotionState::Increasing,
            std::cmp::Ordering::Less => MotionState::Decreasing,
            std::cmp::Ordering::Equal => MotionState::Stopped,
        }
    }
}
