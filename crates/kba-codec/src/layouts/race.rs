//! Race-level records: RA (race details), SE (runner per race), HR (payouts),
//! RC (course record updates).

use super::{race_head, record_head};
use crate::convert::Conversion::{self, Int, LapTime, MonthDay, PrizeMoney, RaceTime, Weight};
use crate::layout::{LayoutError, RecordLayout};

pub(super) fn ra() -> Result<RecordLayout, LayoutError> {
    race_head()
        .text("YoubiCD", 27, 1)
        .text("TokuNum", 28, 4)
        .text("Hondai", 32, 60)
        .text("Fukudai", 92, 60)
        .text("Kakko", 152, 60)
        .text("HondaiEng", 212, 120)
        .text("FukudaiEng", 332, 120)
        .text("KakkoEng", 452, 120)
        .text("Ryakusyo10", 572, 20)
        .text("Ryakusyo6", 592, 12)
        .text("Ryakusyo3", 604, 6)
        .text("Kubun", 610, 1)
        .typed("Nkai", 611, 3, Int)
        .text("GradeCD", 614, 1)
        .text("GradeCDBefore", 615, 1)
        .text("SyubetuCD", 616, 2)
        .text("KigoCD", 618, 3)
        .text("JyuryoCD", 621, 1)
        .repeat("JyokenCD", 622, 3, 5, None)
        .text("JyokenName", 637, 60)
        .typed("Kyori", 697, 4, Int)
        .typed("KyoriBefore", 701, 4, Int)
        .text("TrackCD", 705, 2)
        .text("TrackCDBefore", 707, 2)
        .text("CourseKubunCD", 709, 2)
        .text("CourseKubunCDBefore", 711, 2)
        .repeat("Honsyokin", 713, 8, 7, Some(PrizeMoney))
        .repeat("HonsyokinBefore", 769, 8, 5, Some(PrizeMoney))
        .repeat("Fukasyokin", 809, 8, 5, Some(PrizeMoney))
        .repeat("FukasyokinBefore", 849, 8, 3, Some(PrizeMoney))
        .typed("HassoTime", 873, 4, Conversion::Time)
        .typed("HassoTimeBefore", 877, 4, Conversion::Time)
        .typed("TorokuTosu", 881, 2, Int)
        .typed("SyussoTosu", 883, 2, Int)
        .typed("NyusenTosu", 885, 2, Int)
        .text("TenkoCD", 887, 1)
        .text("SibaBabaCD", 888, 1)
        .text("DirtBabaCD", 889, 1)
        .repeat("LapTime", 890, 3, 25, Some(LapTime))
        .typed("SyogaiMileTime", 965, 4, RaceTime)
        .typed("HaronTimeS3", 969, 3, LapTime)
        .typed("HaronTimeS4", 972, 3, LapTime)
        .typed("HaronTimeL3", 975, 3, LapTime)
        .typed("HaronTimeL4", 978, 3, LapTime)
        .blocks(
            981,
            4,
            &[("Corner", 1, None), ("Syukaisu", 1, None), ("Jyuni", 70, None)],
        )
        .text("RecordUpKubun", 1269, 1)
        .build("RA", 1272)
}

pub(super) fn se() -> Result<RecordLayout, LayoutError> {
    race_head()
        .typed("Wakuban", 27, 1, Int)
        .typed("Umaban", 28, 2, Int)
        .text("KettoNum", 30, 10)
        .text("Bamei", 40, 36)
        .text("UmaKigoCD", 76, 2)
        .text("SexCD", 78, 1)
        .text("HinsyuCD", 79, 1)
        .text("KeiroCD", 80, 2)
        .typed("Barei", 82, 2, Int)
        .text("TozaiCD", 84, 1)
        .text("ChokyosiCode", 85, 5)
        .text("ChokyosiRyakusyo", 90, 8)
        .text("BanusiCode", 98, 6)
        .text("BanusiName", 104, 64)
        .text("Fukusyoku", 168, 60)
        .text("_Reserved1", 228, 60)
        .typed("Futan", 288, 3, Weight)
        .typed("FutanBefore", 291, 3, Weight)
        .text("Blinker", 294, 1)
        .text("_Reserved2", 295, 1)
        .text("KisyuCode", 296, 5)
        .text("KisyuCodeBefore", 301, 5)
        .text("KisyuRyakusyo", 306, 8)
        .text("KisyuRyakusyoBefore", 314, 8)
        .text("MinaraiCD", 322, 1)
        .text("MinaraiCDBefore", 323, 1)
        .typed("BaTaijyu", 324, 3, Int)
        .text("ZogenFugo", 327, 1)
        .typed("ZogenSa", 328, 3, Int)
        .text("IJyoCD", 331, 1)
        .typed("NyusenJyuni", 332, 2, Int)
        .typed("KakuteiJyuni", 334, 2, Int)
        .text("DochakuKubun", 336, 1)
        .text("DochakuTosu", 337, 1)
        .typed("Time", 338, 4, RaceTime)
        .text("ChakusaCD", 342, 3)
        .text("ChakusaCDP", 345, 3)
        .text("ChakusaCDPP", 348, 3)
        .typed("Jyuni1c", 351, 2, Int)
        .typed("Jyuni2c", 353, 2, Int)
        .typed("Jyuni3c", 355, 2, Int)
        .typed("Jyuni4c", 357, 2, Int)
        .typed("Odds", 359, 4, Conversion::Odds)
        .typed("Ninki", 363, 2, Int)
        .typed("Honsyokin", 365, 8, PrizeMoney)
        .typed("Fukasyokin", 373, 8, PrizeMoney)
        .text("_Reserved3", 381, 3)
        .text("_Reserved4", 384, 3)
        .typed("HaronTimeL4", 387, 3, LapTime)
        .typed("HaronTimeL3", 390, 3, LapTime)
        .blocks(393, 3, &[("AiteKettoNum", 10, None), ("AiteBamei", 36, None)])
        .text("TimeDiff", 531, 4)
        .text("RecordUpKubun", 535, 1)
        .text("DMKubun", 536, 1)
        .text("DMTime", 537, 5)
        .text("DMGosaP", 542, 4)
        .text("DMGosaM", 546, 4)
        .typed("DMJyuni", 550, 2, Int)
        .text("KyakusituKubun", 552, 1)
        .build("SE", 555)
}

pub(super) fn hr() -> Result<RecordLayout, LayoutError> {
    race_head()
        .typed("TorokuTosu", 27, 2, Int)
        .typed("SyussoTosu", 29, 2, Int)
        .repeat("FuseirituFlag", 31, 1, 9, None)
        .repeat("TokubaraiFlag", 40, 1, 9, None)
        .repeat("HenkanFlag", 49, 1, 9, None)
        .repeat("HenkanUma", 58, 1, 28, None)
        .repeat("HenkanWaku", 86, 1, 8, None)
        .repeat("HenkanDoWaku", 94, 1, 8, None)
        .blocks(102, 3, &payout("Tansyo", "Umaban", 2, 2))
        .blocks(141, 5, &payout("Fukusyo", "Umaban", 2, 2))
        .blocks(206, 3, &payout("Wakuren", "Kumi", 2, 2))
        .blocks(245, 3, &payout("Umaren", "Kumi", 4, 3))
        .blocks(293, 7, &payout("Wide", "Kumi", 4, 3))
        .repeat("_Reserved", 405, 16, 3, None)
        .blocks(453, 6, &payout("Umatan", "Kumi", 4, 3))
        .blocks(549, 3, &payout("Sanrenpuku", "Kumi", 6, 3))
        .blocks(603, 6, &payout("Sanrentan", "Kumi", 6, 4))
        .build("HR", 719)
}

/// One payout slot: combination, 9-digit payout, popularity rank.
fn payout(
    bet: &str,
    combination: &str,
    combination_width: usize,
    ninki_width: usize,
) -> [(String, usize, Option<Conversion>); 3] {
    [
        (format!("{bet}{combination}"), combination_width, None),
        (format!("{bet}Pay"), 9, Some(Int)),
        (format!("{bet}Ninki"), ninki_width, Some(Int)),
    ]
}

pub(super) fn rc() -> Result<RecordLayout, LayoutError> {
    // RC carries a one-byte record kind before the race key, so its key
    // fields sit one byte later than in `race_head`.
    record_head()
        .text("RecInfoKubun", 11, 1)
        .typed("Year", 12, 4, Int)
        .typed("MonthDay", 16, 4, MonthDay)
        .text("JyoCD", 20, 2)
        .typed("Kaiji", 22, 2, Int)
        .typed("Nichiji", 24, 2, Int)
        .typed("RaceNum", 26, 2, Int)
        .text("TokuNum", 28, 4)
        .text("Hondai", 32, 60)
        .text("GradeCD", 92, 1)
        .text("SyubetuCD", 93, 2)
        .typed("Kyori", 95, 4, Int)
        .text("TrackCD", 99, 2)
        .text("RecKubun", 101, 1)
        .typed("RecTime", 102, 4, RaceTime)
        .text("TenkoCD", 106, 1)
        .text("SibaBabaCD", 107, 1)
        .text("DirtBabaCD", 108, 1)
        .blocks(
            109,
            3,
            &[
                ("RecKettoNum", 10, None),
                ("RecBamei", 36, None),
                ("RecUmaKigoCD", 2, None),
                ("RecSexCD", 1, None),
                ("RecChokyosiCode", 5, None),
                ("RecChokyosiName", 34, None),
                ("RecFutan", 3, Some(Weight)),
                ("RecKisyuCode", 5, None),
                ("RecKisyuName", 34, None),
            ],
        )
        .build("RC", 501)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ra_tail_positions() {
        let ra = ra().unwrap();
        assert_eq!(ra.field("HassoTime").unwrap().offset, 873);
        assert_eq!(ra.field("LapTime25").unwrap().offset, 962);
        assert_eq!(ra.field("Corner4").unwrap().offset, 1197);
        assert_eq!(ra.field("Jyuni4").unwrap().offset, 1199);
        assert_eq!(ra.field("RecordUpKubun").unwrap().offset, 1269);
        assert_eq!(ra.field("MakeDate").unwrap().conversion, Some(Conversion::Date));
    }

    #[test]
    fn hr_payout_groups() {
        let hr = hr().unwrap();
        assert_eq!(hr.field("TansyoUmaban1").unwrap().offset, 102);
        assert_eq!(hr.field("TansyoPay1").unwrap().conversion, Some(Int));
        assert_eq!(hr.field("SanrentanKumi1").unwrap().offset, 603);
        assert_eq!(hr.field("SanrentanNinki6").unwrap().end(), 717);
    }

    #[test]
    fn rc_key_is_shifted() {
        let rc = rc().unwrap();
        assert_eq!(rc.field("Year").unwrap().offset, 12);
        assert_eq!(rc.field("RaceNum").unwrap().offset, 26);
    }
}
