//! Data-mining forecasts: time-based (DM) and head-to-head score (TM).

use super::race_head;
use crate::convert::Conversion::{Decimal, Int, Time};
use crate::layout::{LayoutError, RecordLayout};

pub(super) fn dm() -> Result<RecordLayout, LayoutError> {
    race_head()
        .typed("MakeHM", 27, 4, Time)
        .blocks(
            31,
            18,
            &[
                ("Umaban", 2, Some(Int)),
                ("DMTime", 5, None),
                ("DMGosaP", 4, None),
                ("DMGosaM", 4, None),
            ],
        )
        .build("DM", 303)
}

pub(super) fn tm() -> Result<RecordLayout, LayoutError> {
    race_head()
        .typed("MakeHM", 27, 4, Time)
        .blocks(
            31,
            18,
            &[("Umaban", 2, Some(Int)), ("TMScore", 4, Some(Decimal { places: 1 }))],
        )
        .build("TM", 141)
}
