//! Command implementations

pub mod import;
pub mod imports;
pub mod init;
pub mod report;
pub mod stats;

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;

use crate::event::{resolve_local, MediaKind};
use crate::store::EventFilter;

/// Build an event filter from local calendar dates. `to` is inclusive.
pub fn date_filter(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    kind: Option<MediaKind>,
    zone: Tz,
) -> EventFilter {
    let midnight = |date: NaiveDate| resolve_local(date.and_time(NaiveTime::MIN), zone);

    EventFilter {
        from: from.and_then(midnight),
        to: to.and_then(|d| d.succ_opt()).and_then(midnight),
        media_kind: kind,
    }
}
