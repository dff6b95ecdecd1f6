//! O1: win / place / bracket-quinella odds.

use super::race_head;
use crate::convert::Conversion::{Decimal, Int, Odds, Time};
use crate::layout::{LayoutError, RecordLayout};

pub(super) fn o1() -> Result<RecordLayout, LayoutError> {
    race_head()
        .typed("HappyoTime", 27, 8, Time)
        .typed("TorokuTosu", 35, 2, Int)
        .typed("SyussoTosu", 37, 2, Int)
        .text("TansyoFlag", 39, 1)
        .text("FukusyoFlag", 40, 1)
        .text("WakurenFlag", 41, 1)
        .text("FukuChakuBaraiKey", 42, 1)
        .blocks(
            43,
            28,
            &[("TanUmaban", 2, None), ("TanOdds", 4, Some(Odds)), ("TanNinki", 2, Some(Int))],
        )
        .blocks(
            267,
            28,
            &[
                ("FukUmaban", 2, None),
                ("FukOddsLow", 4, Some(Odds)),
                ("FukOddsHigh", 4, Some(Odds)),
                ("FukNinki", 2, Some(Int)),
            ],
        )
        .blocks(
            603,
            36,
            &[
                ("WakuKumi", 2, None),
                ("WakuOdds", 5, Some(Decimal { places: 1 })),
                ("WakuNinki", 2, Some(Int)),
            ],
        )
        .typed("TotalHyosuTansyo", 927, 11, Int)
        .typed("TotalHyosuFukusyo", 938, 11, Int)
        .typed("TotalHyosuWakuren", 949, 11, Int)
        .build("O1", 962)
}
