//! Race-day change notices: weather/going (WE), body weights (WH),
//! scratches (AV), jockey changes (JC), post time changes (TC),
//! course changes (CC).

use super::{meet_head, race_head};
use crate::convert::Conversion::{Int, Time, Weight};
use crate::layout::{LayoutError, RecordLayout};

pub(super) fn we() -> Result<RecordLayout, LayoutError> {
    meet_head()
        .typed("HappyoTime", 25, 8, Time)
        .text("HenkoID", 33, 1)
        .text("TenkoCD", 34, 1)
        .text("SibaBabaCD", 35, 1)
        .text("DirtBabaCD", 36, 1)
        .text("TenkoCDBefore", 37, 1)
        .text("SibaBabaCDBefore", 38, 1)
        .text("DirtBabaCDBefore", 39, 1)
        .build("WE", 42)
}

pub(super) fn wh() -> Result<RecordLayout, LayoutError> {
    race_head()
        .typed("HappyoTime", 27, 8, Time)
        .blocks(
            35,
            18,
            &[
                ("Umaban", 2, Some(Int)),
                ("Bamei", 36, None),
                ("BaTaijyu", 3, Some(Int)),
                ("ZogenFugo", 1, None),
                ("ZogenSa", 3, Some(Int)),
            ],
        )
        .build("WH", 847)
}

pub(super) fn av() -> Result<RecordLayout, LayoutError> {
    race_head()
        .typed("HappyoTime", 27, 8, Time)
        .typed("Umaban", 35, 2, Int)
        .text("Bamei", 37, 36)
        .text("JiyuKubun", 73, 3)
        .build("AV", 78)
}

pub(super) fn jc() -> Result<RecordLayout, LayoutError> {
    race_head()
        .typed("HappyoTime", 27, 8, Time)
        .typed("Umaban", 35, 2, Int)
        .text("Bamei", 37, 36)
        .typed("Futan", 73, 3, Weight)
        .text("KisyuCode", 76, 5)
        .text("KisyuName", 81, 34)
        .text("MinaraiCD", 115, 1)
        .typed("FutanBefore", 116, 3, Weight)
        .text("KisyuCodeBefore", 119, 5)
        .text("KisyuNameBefore", 124, 34)
        .text("MinaraiCDBefore", 158, 1)
        .build("JC", 161)
}

pub(super) fn tc() -> Result<RecordLayout, LayoutError> {
    race_head()
        .typed("HappyoTime", 27, 8, Time)
        .typed("HassoTime", 35, 4, Time)
        .typed("HassoTimeBefore", 39, 4, Time)
        .build("TC", 45)
}

pub(super) fn cc() -> Result<RecordLayout, LayoutError> {
    race_head()
        .typed("HappyoTime", 27, 8, Time)
        .typed("Kyori", 35, 4, Int)
        .text("TrackCD", 39, 2)
        .typed("KyoriBefore", 41, 4, Int)
        .text("TrackCDBefore", 45, 2)
        .text("JiyuKubun", 47, 1)
        .build("CC", 50)
}
