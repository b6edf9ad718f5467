use crate::RoomType;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoomTypeEstimate {
    pub room_type: RoomType,
    pub confidence: f64,
}

impl RoomTypeEstimate {
    pub fn unknown() -> Self {
        Self {
            room_type: RoomType::Unknown,
            confidence: 0.0,
        }
    }
}

/// Prompts sent to the classifier, aligned with [`RoomType::CANDIDATES`]
pub fn candidate_prompts() -> Vec<&'static str> {
    RoomType::CANDIDATES.iter().map(RoomType::prompt).collect()
}

/// Argmax over one probability per candidate label.
///
/// Returns `None` when the distribution does not line up with the candidates.
/// Exact ties go to the earlier candidate.
pub fn resolve_room_type(probabilities: &[f64]) -> Option<RoomTypeEstimate> {
    if probabilities.len() != RoomType::CANDIDATES.len() {
        return None;
    }

    probabilities
        .iter()
        .copied()
        .zip(RoomType::CANDIDATES)
        .enumerate()
        .filter(|(_, (p, _))| p.is_finite())
        .max_by_key(|(idx, (p, _))| (OrderedFloat(*p), Reverse(*idx)))
        .map(|(_, (p, room_type))| RoomTypeEstimate {
            room_type,
            confidence: p.clamp(0.0, 1.0),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax() {
        let estimate = resolve_room_type(&[0.1, 0.05, 0.7, 0.1, 0.05]).unwrap();
        assert_eq!(estimate.room_type, RoomType::Kitchen);
        assert!((estimate.confidence - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_tie_goes_to_first() {
        let estimate = resolve_room_type(&[0.1, 0.4, 0.1, 0.4, 0.0]).unwrap();
        assert_eq!(estimate.room_type, RoomType::LivingRoom);
    }

    #[test]
    fn test_mismatched_distribution() {
        assert!(resolve_room_type(&[]).is_none());
        assert!(resolve_room_type(&[0.5, 0.5]).is_none());
        assert!(resolve_room_type(&[f64::NAN; 5]).is_none());
    }

    #[test]
    fn test_prompts_follow_candidates() {
        let prompts = candidate_prompts();
        assert_eq!(prompts.len(), 5);
        assert_eq!(prompts[2], "a photo of a kitchen");
    }
}
