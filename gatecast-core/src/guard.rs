//! Trick-play permissions derived from the active grant.
//!
//! The orchestrator builds a guard from whatever grant is current when a
//! seek or pause is evaluated, never from the grant that was current when
//! the request was issued.

use crate::model::Grant;

/// Direction of a requested seek relative to the playhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDirection {
    Forward,
    Backward,
    InPlace,
}

impl SeekDirection {
    pub fn between(playhead: i64, target: i64) -> Self {
        match target.cmp(&playhead) {
            std::cmp::Ordering::Greater => SeekDirection::Forward,
            std::cmp::Ordering::Less => SeekDirection::Backward,
            std::cmp::Ordering::Equal => SeekDirection::InPlace,
        }
    }
}

/// Seek-forward, seek-back and pause predicates for one grant snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrickPlayGuard {
    seek_forward: bool,
    seek_back: bool,
    pause: bool,
}

impl Default for TrickPlayGuard {
    /// Everything is allowed until a grant says otherwise.
    fn default() -> Self {
        Self {
            seek_forward: true,
            seek_back: true,
            pause: true,
        }
    }
}

impl TrickPlayGuard {
    pub fn for_grant(grant: Option<&Grant>) -> Self {
        grant.map_or_else(Self::default, |grant| Self {
            seek_forward: grant.ff_enabled,
            seek_back: grant.rw_enabled,
            pause: grant.timeshift_enabled,
        })
    }

    pub fn can_seek_forward(&self) -> bool {
        self.seek_forward
    }

    pub fn can_seek_back(&self) -> bool {
        self.seek_back
    }

    pub fn can_pause(&self) -> bool {
        self.pause
    }

    /// Whether a seek from `playhead` to `target` is allowed.
    ///
    /// With an unknown playhead the direction cannot be established, so both
    /// directions must be permitted.
    pub fn permits_seek(&self, playhead: Option<i64>, target: i64) -> bool {
        match playhead.map(|playhead| SeekDirection::between(playhead, target)) {
            Some(SeekDirection::Forward) => self.seek_forward,
            Some(SeekDirection::Backward) => self.seek_back,
            Some(SeekDirection::InPlace) => true,
            None => self.seek_forward && self.seek_back,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn grant(ff: bool, rw: bool, timeshift: bool) -> Grant {
        Grant::new("s1", "https://cdn.example.net/a.mpd", "token")
            .with_trick_play(ff, rw, timeshift)
    }

    #[test]
    fn test_no_grant_allows_everything() {
        let guard = TrickPlayGuard::for_grant(None);

        assert!(guard.can_seek_forward());
        assert!(guard.can_seek_back());
        assert!(guard.can_pause());
    }

    #[test]
    fn test_predicates_mirror_grant_flags() {
        let guard = TrickPlayGuard::for_grant(Some(&grant(false, true, false)));

        assert!(!guard.can_seek_forward());
        assert!(guard.can_seek_back());
        assert!(!guard.can_pause());
    }

    #[test]
    fn test_unknown_playhead_needs_both_directions() {
        assert!(TrickPlayGuard::for_grant(Some(&grant(true, true, true))).permits_seek(None, 10));
        assert!(!TrickPlayGuard::for_grant(Some(&grant(true, false, true))).permits_seek(None, 10));
    }

    proptest! {
        #[test]
        fn forward_seeks_follow_ff_flag(
            playhead in 0i64..1_000_000,
            delta in 1i64..1_000_000,
            ff in any::<bool>(),
            rw in any::<bool>(),
        ) {
            let guard = TrickPlayGuard::for_grant(Some(&grant(ff, rw, true)));
            prop_assert_eq!(guard.permits_seek(Some(playhead), playhead + delta), ff);
        }

        #[test]
        fn backward_seeks_follow_rw_flag(
            playhead in 1_000_000i64..2_000_000,
            delta in 1i64..1_000_000,
            ff in any::<bool>(),
            rw in any::<bool>(),
        ) {
            let guard = TrickPlayGuard::for_grant(Some(&grant(ff, rw, true)));
            prop_assert_eq!(guard.permits_seek(Some(playhead), playhead - delta), rw);
        }

        #[test]
        fn seeking_in_place_is_always_allowed(
            playhead in any::<i64>(),
            ff in any::<bool>(),
            rw in any::<bool>(),
        ) {
            let guard = TrickPlayGuard::for_grant(Some(&grant(ff, rw, true)));
            prop_assert!(guard.permits_seek(Some(playhead), playhead));
        }
    }
}
