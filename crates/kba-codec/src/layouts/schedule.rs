//! YS: meeting schedule with graded-race guide.

use super::meet_head;
use crate::convert::Conversion::Int;
use crate::layout::{LayoutError, RecordLayout};

pub(super) fn ys() -> Result<RecordLayout, LayoutError> {
    meet_head()
        .text("YoubiCD", 25, 1)
        .blocks(
            26,
            3,
            &[
                ("JyusyoTokuNum", 4, None),
                ("JyusyoHondai", 60, None),
                ("JyusyoRyakusyo10", 20, None),
                ("JyusyoRyakusyo6", 12, None),
                ("JyusyoRyakusyo3", 6, None),
                ("JyusyoNkai", 3, Some(Int)),
                ("JyusyoGradeCD", 1, None),
                ("JyusyoSyubetuCD", 2, None),
                ("JyusyoKigoCD", 3, None),
                ("JyusyoJyuryoCD", 1, None),
                ("JyusyoKyori", 4, Some(Int)),
                ("JyusyoTrackCD", 2, None),
            ],
        )
        .build("YS", 382)
}
