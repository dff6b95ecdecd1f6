//! Record type -> destination table, and destination table -> natural key.

use std::sync::Arc;

use kba_codec::ParserRegistry;
use kba_db::TableDef;

/// Prefix of tables filled by historical loads.
pub const HISTORICAL_PREFIX: &str = "NL_";
/// Prefix of tables filled by the real-time stream.
pub const REALTIME_PREFIX: &str = "RT_";

/// Types the vendor streams live. Master and snapshot types (UM, KS, YS, ...)
/// only arrive through historical loads.
const REALTIME_TYPES: &[&str] = &[
    "WE", "RA", "SE", "DM", "AV", "HR", "WH", "TM", "H1", "H6", "O1", "O2", "O3", "O4", "O5",
    "O6", "JC", "TC", "CC", "RC",
];

const HISTORICAL_TYPES: &[&str] = &[
    "RA", "SE", "HR", "H1", "H6", "O1", "O2", "O3", "O4", "O5", "O6", "WF", "JG", "TK", "UM",
    "KS", "CH", "BR", "BN", "HN", "SK", "RC", "CK", "HC", "HS", "HY", "YS", "BT", "CS", "WC",
    "DM", "TM", "AV", "WE", "WH", "JC", "TC", "CC",
];

const RACE_KEY: &[&str] = &["Year", "MonthDay", "JyoCD", "Kaiji", "Nichiji", "RaceNum"];
const RUNNER_KEY: &[&str] = &[
    "Year", "MonthDay", "JyoCD", "Kaiji", "Nichiji", "RaceNum", "Umaban",
];
const COMBINATION_KEY: &[&str] = &[
    "Year", "MonthDay", "JyoCD", "Kaiji", "Nichiji", "RaceNum", "Kumi",
];
const MEETING_DAY_KEY: &[&str] = &["Year", "MonthDay", "JyoCD", "Kaiji", "Nichiji"];

/// Static mapping from record type to destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRoute {
    prefix: &'static str,
    types: &'static [&'static str],
}

impl TableRoute {
    pub fn realtime() -> Self {
        Self {
            prefix: REALTIME_PREFIX,
            types: REALTIME_TYPES,
        }
    }

    pub fn historical() -> Self {
        Self {
            prefix: HISTORICAL_PREFIX,
            types: HISTORICAL_TYPES,
        }
    }

    pub fn table_for(&self, record_type: &str) -> Option<String> {
        self.types
            .iter()
            .any(|t| *t == record_type)
            .then(|| format!("{}{record_type}", self.prefix))
    }

    /// Table definitions for every routed type the registry can decode.
    pub fn table_defs(&self, registry: &ParserRegistry) -> Vec<TableDef> {
        self.types
            .iter()
            .filter_map(|tag| {
                let layout: Arc<_> = registry.resolve(tag)?;
                let name = format!("{}{tag}", self.prefix);
                let primary_key = primary_key(&name).iter().map(|k| k.to_string()).collect();
                Some(TableDef {
                    name,
                    layout,
                    primary_key,
                })
            })
            .collect()
    }
}

/// Natural key of a destination table, in key order. Empty means the table
/// has no key and records cannot be deleted from it.
pub fn primary_key(table: &str) -> &'static [&'static str] {
    let Some(tag) = table
        .strip_prefix(REALTIME_PREFIX)
        .or_else(|| table.strip_prefix(HISTORICAL_PREFIX))
    else {
        return &[];
    };
    let historical = table.starts_with(HISTORICAL_PREFIX);

    match tag {
        "RA" | "HR" | "H1" => RACE_KEY,
        "SE" | "RC" | "O1" => RUNNER_KEY,
        "O2" | "O3" | "O4" | "O5" | "O6" | "H6" => COMBINATION_KEY,
        "YS" if historical => MEETING_DAY_KEY,
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realtime_route_covers_live_types_only() {
        let r = TableRoute::realtime();
        assert_eq!(r.table_for("RA").as_deref(), Some("RT_RA"));
        assert_eq!(r.table_for("O6").as_deref(), Some("RT_O6"));
        assert_eq!(r.table_for("YS"), None);
        assert_eq!(r.table_for("UM"), None);
    }

    #[test]
    fn historical_route_includes_master_types() {
        let r = TableRoute::historical();
        assert_eq!(r.table_for("YS").as_deref(), Some("NL_YS"));
        assert_eq!(r.table_for("UM").as_deref(), Some("NL_UM"));
        assert_eq!(r.table_for("ZZ"), None);
    }

    #[test]
    fn keys_follow_table_kind() {
        assert_eq!(primary_key("RT_RA"), RACE_KEY);
        assert_eq!(primary_key("RT_SE").last(), Some(&"Umaban"));
        assert_eq!(primary_key("RT_O3").last(), Some(&"Kumi"));
        assert!(primary_key("RT_WE").is_empty());
        assert!(primary_key("RT_WH").is_empty());
        assert!(primary_key("RT_YS").is_empty());
        assert_eq!(primary_key("NL_YS"), MEETING_DAY_KEY);
        assert!(primary_key("XX_RA").is_empty());
    }

    #[test]
    fn table_defs_only_for_decodable_types() {
        let registry = ParserRegistry::new();
        let defs = TableRoute::realtime().table_defs(&registry);
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"RT_RA"));
        assert!(names.contains(&"RT_WE"));
        assert!(!names.contains(&"RT_O6"));

        let ra = defs.iter().find(|d| d.name == "RT_RA").unwrap();
        assert_eq!(ra.primary_key.len(), 6);
        assert!(ra.key_columns().is_some());
    }
}
