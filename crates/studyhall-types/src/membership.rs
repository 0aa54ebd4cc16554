//! Capacity and join/leave rules for study groups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Rejection;
use crate::models::StudyGroup;

/// Raw value stored in `study_groups.max_participants` for "no limit".
pub const UNLIMITED: i64 = -1;

/// How many participants a group admits, host included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Capacity {
    Unlimited,
    Limited(u32),
}

impl Capacity {
    pub fn is_full(self, participants: u32) -> bool {
        match self {
            Self::Unlimited => false,
            Self::Limited(max) => participants >= max,
        }
    }

    pub fn as_raw(self) -> i64 {
        match self {
            Self::Unlimited => UNLIMITED,
            Self::Limited(max) => i64::from(max),
        }
    }
}

impl TryFrom<i64> for Capacity {
    type Error = Rejection;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        if raw == UNLIMITED {
            return Ok(Self::Unlimited);
        }
        u32::try_from(raw)
            .ok()
            .filter(|max| *max > 0)
            .map(Self::Limited)
            .ok_or_else(|| Rejection::invalid(format!("invalid max participants: {raw}")))
    }
}

impl From<Capacity> for i64 {
    fn from(capacity: Capacity) -> Self {
        capacity.as_raw()
    }
}

impl StudyGroup {
    pub fn is_full(&self) -> bool {
        self.capacity.is_full(self.participant_count)
    }

    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at < now
    }

    /// "3/4", or "5 participants" when there is no limit.
    pub fn formatted_capacity(&self) -> String {
        match self.capacity {
            Capacity::Unlimited => format!("{} participants", self.participant_count),
            Capacity::Limited(max) => format!("{}/{}", self.participant_count, max),
        }
    }

    pub fn is_virtual(&self) -> bool {
        let location = self.location.to_lowercase();
        location.contains("virtual") || location.contains("zoom")
    }

    /// Checks run in order: past event, capacity, duplicate membership.
    pub fn check_join(&self, already_joined: bool, now: DateTime<Utc>) -> Result<(), Rejection> {
        if self.is_past(now) {
            return Err(Rejection::invalid_state(
                "cannot join a study group that has already occurred",
            ));
        }
        if self.is_full() {
            return Err(Rejection::invalid_state("this study group is already full"));
        }
        if already_joined {
            return Err(Rejection::conflict("you have already joined this study group"));
        }
        Ok(())
    }

    pub fn check_leave(
        &self,
        user_id: Uuid,
        is_participant: bool,
        now: DateTime<Utc>,
    ) -> Result<(), Rejection> {
        if self.host_id == user_id {
            return Err(Rejection::permission_denied(
                "hosts cannot leave their own study group; delete it instead",
            ));
        }
        if !is_participant {
            return Err(Rejection::NotFound(
                "you are not a participant of this study group".into(),
            ));
        }
        if self.is_past(now) {
            return Err(Rejection::invalid_state(
                "cannot leave a study group that has already occurred",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReasonCode;
    use chrono::Duration;

    fn group(capacity: Capacity, participants: u32, in_hours: i64) -> StudyGroup {
        let now = Utc::now();
        StudyGroup {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            host_id: Uuid::new_v4(),
            host_username: "host".into(),
            title: "Midterm prep".into(),
            description: "Going over problem set 3".into(),
            scheduled_at: now + Duration::hours(in_hours),
            location: "Frist 302".into(),
            capacity,
            participant_count: participants,
            created_at: now,
        }
    }

    #[test]
    fn capacity_from_raw() {
        assert_eq!(Capacity::try_from(-1).unwrap(), Capacity::Unlimited);
        assert_eq!(Capacity::try_from(4).unwrap(), Capacity::Limited(4));
        assert!(Capacity::try_from(0).is_err());
        assert!(Capacity::try_from(-2).is_err());
    }

    #[test]
    fn full_group_rejects_fifth_join() {
        let g = group(Capacity::Limited(4), 4, 24);
        let err = g.check_join(false, Utc::now()).unwrap_err();
        assert_eq!(err.reason(), ReasonCode::InvalidState);
    }

    #[test]
    fn unlimited_group_never_full() {
        let g = group(Capacity::Unlimited, 10_000, 24);
        assert!(!g.is_full());
        assert!(g.check_join(false, Utc::now()).is_ok());
    }

    #[test]
    fn join_rejections() {
        let now = Utc::now();
        let past = group(Capacity::Limited(4), 1, -1);
        assert_eq!(past.check_join(false, now).unwrap_err().reason(), ReasonCode::InvalidState);

        let open = group(Capacity::Limited(4), 1, 2);
        assert_eq!(open.check_join(true, now).unwrap_err().reason(), ReasonCode::Conflict);
    }

    #[test]
    fn host_cannot_leave() {
        let g = group(Capacity::Limited(4), 2, 24);
        let err = g.check_leave(g.host_id, true, Utc::now()).unwrap_err();
        assert_eq!(err.reason(), ReasonCode::PermissionDenied);
    }

    #[test]
    fn non_member_cannot_leave() {
        let g = group(Capacity::Limited(4), 2, 24);
        let err = g.check_leave(Uuid::new_v4(), false, Utc::now()).unwrap_err();
        assert_eq!(err.reason(), ReasonCode::NotFound);
        assert!(g.check_leave(Uuid::new_v4(), true, Utc::now()).is_ok());
    }

    #[test]
    fn formatted_capacity() {
        assert_eq!(group(Capacity::Limited(4), 3, 1).formatted_capacity(), "3/4");
        assert_eq!(group(Capacity::Unlimited, 5, 1).formatted_capacity(), "5 participants");
    }

    #[test]
    fn zoom_counts_as_virtual() {
        let mut g = group(Capacity::Unlimited, 1, 1);
        g.location = "Zoom (link in description)".into();
        assert!(g.is_virtual());
        g.location = "Frist 302".into();
        assert!(!g.is_virtual());
    }
}
