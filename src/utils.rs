use chrono::{DateTime, FixedOffset, Utc};

const KST_OFFSET_SECS: i32 = 9 * 3600;

/// Korea Standard Time, which the report's dates and timestamps are in.
pub fn kst() -> FixedOffset {
    FixedOffset::east_opt(KST_OFFSET_SECS).expect("UTC+9 is a valid offset")
}

pub fn kst_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&kst())
}
