//! Entitlement checks and the pre-action hook.
//!
//! Both are decided outside the orchestrator; it only asks.

use async_trait::async_trait;

use crate::model::{AudioQuality, EntitlementTier, MediaSelection, VideoQuality};

/// Decides which qualities a tier may request.
pub trait QualityPolicy: Send + Sync {
    fn can_use_quality(&self, tier: EntitlementTier, selection: MediaSelection) -> bool;
}

/// Free users get 480p, 720p and 128k; premium users get everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct TierPolicy;

impl QualityPolicy for TierPolicy {
    fn can_use_quality(&self, tier: EntitlementTier, selection: MediaSelection) -> bool {
        tier.is_premium()
            || matches!(
                selection,
                MediaSelection::Video(VideoQuality::P480 | VideoQuality::P720)
                    | MediaSelection::Audio(AudioQuality::K128)
            )
    }
}

/// Allows every quality regardless of tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unrestricted;

impl QualityPolicy for Unrestricted {
    fn can_use_quality(&self, _tier: EntitlementTier, _selection: MediaSelection) -> bool {
        true
    }
}

/// Answer of an [`ActionGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    /// Do not start now; the caller may trigger the action again later.
    Deferred,
}

/// Hook consulted once before a download run starts.
#[async_trait]
pub trait ActionGate: Send + Sync {
    async fn before_action(&self) -> GateDecision;
}

/// Gate that always proceeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate;

#[async_trait]
impl ActionGate for OpenGate {
    async fn before_action(&self) -> GateDecision {
        GateDecision::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_tier_is_limited() {
        let policy = TierPolicy;
        let free = EntitlementTier::Free;
        assert!(policy.can_use_quality(free, MediaSelection::Video(VideoQuality::P480)));
        assert!(policy.can_use_quality(free, MediaSelection::Video(VideoQuality::P720)));
        assert!(policy.can_use_quality(free, MediaSelection::Audio(AudioQuality::K128)));
        assert!(!policy.can_use_quality(free, MediaSelection::Video(VideoQuality::P1080)));
        assert!(!policy.can_use_quality(free, MediaSelection::Video(VideoQuality::Best)));
        assert!(!policy.can_use_quality(free, MediaSelection::Audio(AudioQuality::K320)));
    }

    #[test]
    fn premium_tier_gets_everything() {
        let policy = TierPolicy;
        for q in VideoQuality::ALL {
            assert!(policy.can_use_quality(EntitlementTier::Premium, MediaSelection::Video(q)));
        }
        for q in AudioQuality::ALL {
            assert!(policy.can_use_quality(EntitlementTier::Premium, MediaSelection::Audio(q)));
        }
    }

    #[test]
    fn unrestricted_allows_all() {
        assert!(Unrestricted.can_use_quality(
            EntitlementTier::Free,
            MediaSelection::Audio(AudioQuality::Max)
        ));
    }

    #[tokio::test]
    async fn open_gate_proceeds() {
        assert_eq!(OpenGate.before_action().await, GateDecision::Proceed);
    }
}
