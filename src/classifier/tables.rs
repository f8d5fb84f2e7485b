//! Ordered classification tables.
//!
//! Both tables are ordered slices, not maps: the first matching entry wins,
//! and that order is part of the contract (a group id like
//! `electrical_plumbing` resolves to Electrical because its entry comes
//! first). Exposed as data so tests can exercise them directly.

use crate::types::SystemKind;

/// Substring → system pairs matched against a lowercased ancestor group id.
pub const SYSTEM_GROUP_TABLE: &[(&str, SystemKind)] = &[
    ("electrical", SystemKind::Electrical),
    ("power", SystemKind::Electrical),
    ("lighting", SystemKind::Electrical),
    ("plumb", SystemKind::Plumbing),
    ("water", SystemKind::Plumbing),
    ("fire", SystemKind::FireAlarm),
    ("alarm", SystemKind::FireAlarm),
    ("network", SystemKind::Network),
    ("data", SystemKind::Network),
    ("mech", SystemKind::Mechanical),
    ("hvac", SystemKind::Mechanical),
    ("security", SystemKind::Security),
    ("cctv", SystemKind::Security),
    ("controls", SystemKind::BuildingAutomation),
    ("bms", SystemKind::BuildingAutomation),
    ("av", SystemKind::AudioVisual),
    ("audio", SystemKind::AudioVisual),
    ("structural", SystemKind::Structural),
    ("svgx", SystemKind::Svgx),
];

/// Substring → subtype pairs matched against a lowercased element label.
///
/// Refines the subtype only; the system resolved from the group table is
/// never changed by a label match. Each canonical subtype token resolves
/// back to itself so emitted documents classify losslessly.
pub const SUBTYPE_PATTERNS: &[(&str, &str)] = &[
    ("outlet", "outlet"),
    ("receptacle", "outlet"),
    ("gfci", "outlet"),
    ("duplex", "outlet"),
    ("quad", "outlet"),
    ("switch", "switch"),
    ("dimmer", "switch"),
    ("panel", "panel"),
    ("light", "light"),
    ("luminaire", "light"),
    ("lamp", "light"),
    ("pipe", "pipe"),
    ("valve", "valve"),
    ("sink", "fixture"),
    ("toilet", "fixture"),
    ("lavatory", "fixture"),
    ("faucet", "fixture"),
    ("fixture", "fixture"),
    ("horn", "horn_strobe"),
    ("strobe", "horn_strobe"),
    ("smoke", "smoke_detector"),
    ("pull", "pull_station"),
    ("sprinkler", "sprinkler"),
    ("camera", "camera"),
    ("door contact", "door_contact"),
    ("contact", "door_contact"),
    ("thermostat", "thermostat"),
    ("diffuser", "diffuser"),
    ("duct", "duct"),
    ("jack", "jack"),
    ("access point", "access_point"),
    ("access", "access_point"),
    ("wap", "access_point"),
    ("speaker", "speaker"),
    ("display", "display"),
    ("monitor", "display"),
    ("sensor", "sensor"),
    ("detector", "sensor"),
    ("controller", "controller"),
    ("generic", "generic"),
];

/// Resolve a lowercased group id through [`SYSTEM_GROUP_TABLE`].
pub fn system_for_group_id(group_id: &str) -> Option<SystemKind> {
    let lowered = group_id.to_lowercase();
    SYSTEM_GROUP_TABLE
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, system)| *system)
}

/// Resolve a lowercased label through [`SUBTYPE_PATTERNS`].
pub fn subtype_for_label(label: &str) -> Option<&'static str> {
    let lowered = label.to_lowercase();
    SUBTYPE_PATTERNS
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, subtype)| *subtype)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("electrical", SystemKind::Electrical)]
    #[test_case("POWER-DIST", SystemKind::Electrical)]
    #[test_case("plumbing", SystemKind::Plumbing)]
    #[test_case("domestic_water", SystemKind::Plumbing)]
    #[test_case("fire_alarm", SystemKind::FireAlarm)]
    #[test_case("network", SystemKind::Network)]
    #[test_case("mechanical", SystemKind::Mechanical)]
    #[test_case("hvac-supply", SystemKind::Mechanical)]
    #[test_case("security", SystemKind::Security)]
    #[test_case("controls", SystemKind::BuildingAutomation)]
    #[test_case("audio", SystemKind::AudioVisual)]
    #[test_case("structural", SystemKind::Structural)]
    #[test_case("svgx_native", SystemKind::Svgx)]
    fn group_id_resolution(id: &str, expected: SystemKind) {
        assert_eq!(system_for_group_id(id), Some(expected));
    }

    #[test]
    fn first_match_wins_for_composite_ids() {
        // Regression case: both substrings present, earlier entry wins.
        assert_eq!(
            system_for_group_id("electrical_plumbing"),
            Some(SystemKind::Electrical)
        );
        assert_eq!(
            system_for_group_id("plumbing_electrical"),
            Some(SystemKind::Electrical)
        );
    }

    #[test]
    fn unmatched_group_id_returns_none() {
        assert_eq!(system_for_group_id("furniture"), None);
        assert_eq!(system_for_group_id("low_voltage"), None);
    }

    #[test_case("Duplex Outlet", "outlet")]
    #[test_case("GFCI receptacle", "outlet")]
    #[test_case("wall switch", "switch")]
    #[test_case("Horn/Strobe", "horn_strobe")]
    #[test_case("smoke det", "smoke_detector")]
    #[test_case("PTZ Camera", "camera")]
    #[test_case("VAV controller", "controller")]
    fn label_resolution(label: &str, expected: &str) {
        assert_eq!(subtype_for_label(label), Some(expected));
    }

    #[test]
    fn unmatched_label_returns_none() {
        assert_eq!(subtype_for_label("chair"), None);
    }

    #[test]
    fn every_emitted_group_id_resolves_to_its_system() {
        use crate::types::SystemKind::*;
        // LowVoltage and Unknown intentionally have no table entry.
        for system in [
            Electrical,
            Plumbing,
            FireAlarm,
            Network,
            Mechanical,
            Security,
            AudioVisual,
            BuildingAutomation,
            Structural,
            Svgx,
        ] {
            assert_eq!(
                system_for_group_id(system.group_id()),
                Some(system),
                "group id {:?} failed to round-trip",
                system.group_id()
            );
        }
    }
}
