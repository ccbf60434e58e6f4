//! Diagnosis-code (CID) normalisation.
//!
//! The CIPTEA form exposes exactly 18 checkboxes for the autism families of ICD-10
//! (`F84.0`..`F84.9`) and ICD-11 (`6A02.0`..`6A02.5`, `6A02.Y`, `6A02.Z`). The AI
//! extraction step produces free text such as `"10 F84"` or `"11 6a02.y"`; [`normalize`]
//! is the only translation from that text into checkbox identifiers. It never fails:
//! entries it cannot place are dropped.

use std::collections::BTreeSet;
use std::fmt;

/// ICD revision of a checkbox option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CidRevision {
    Icd10,
    Icd11,
}

impl CidRevision {
    /// Text the CIPTEA revision dropdown accepts to switch its checkbox list.
    pub fn dropdown_label(self) -> &'static str {
        match self {
            CidRevision::Icd10 => "CIDs 10 (10ª Revisão)",
            CidRevision::Icd11 => "CIDs 11 (11ª Revisão)",
        }
    }
}

/// One of the 18 checkbox options on the CIPTEA form.
///
/// Variant order matches the lexical order of the element ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CidOption {
    F840,
    F841,
    F842,
    F843,
    F844,
    F845,
    F846,
    F847,
    F848,
    F849,
    A020,
    A021,
    A022,
    A023,
    A024,
    A025,
    A02Y,
    A02Z,
}

impl CidOption {
    pub const ALL: [CidOption; 18] = [
        CidOption::F840,
        CidOption::F841,
        CidOption::F842,
        CidOption::F843,
        CidOption::F844,
        CidOption::F845,
        CidOption::F846,
        CidOption::F847,
        CidOption::F848,
        CidOption::F849,
        CidOption::A020,
        CidOption::A021,
        CidOption::A022,
        CidOption::A023,
        CidOption::A024,
        CidOption::A025,
        CidOption::A02Y,
        CidOption::A02Z,
    ];

    const ICD10_COUNT: usize = 10;

    /// Element id of the checkbox on the remote form.
    pub fn id(self) -> &'static str {
        match self {
            CidOption::F840 => "cid10_F84_0",
            CidOption::F841 => "cid10_F84_1",
            CidOption::F842 => "cid10_F84_2",
            CidOption::F843 => "cid10_F84_3",
            CidOption::F844 => "cid10_F84_4",
            CidOption::F845 => "cid10_F84_5",
            CidOption::F846 => "cid10_F84_6",
            CidOption::F847 => "cid10_F84_7",
            CidOption::F848 => "cid10_F84_8",
            CidOption::F849 => "cid10_F84_9",
            CidOption::A020 => "cid11_6A02_0",
            CidOption::A021 => "cid11_6A02_1",
            CidOption::A022 => "cid11_6A02_2",
            CidOption::A023 => "cid11_6A02_3",
            CidOption::A024 => "cid11_6A02_4",
            CidOption::A025 => "cid11_6A02_5",
            CidOption::A02Y => "cid11_6A02_Y",
            CidOption::A02Z => "cid11_6A02_Z",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|option| option.id() == id)
    }

    pub fn revision(self) -> CidRevision {
        if (self as usize) < Self::ICD10_COUNT {
            CidRevision::Icd10
        } else {
            CidRevision::Icd11
        }
    }

    /// Operator-facing code, e.g. `10:F84.0` or `11:6A02.Y`.
    ///
    /// Feeding the code back through [`normalize`] yields the same option.
    pub fn code(self) -> String {
        let mut parts = self.id().trim_start_matches("cid").split('_');
        let revision = parts.next().unwrap_or_default();
        let family = parts.next().unwrap_or_default();
        let subcode = parts.next().unwrap_or_default();
        format!("{revision}:{family}.{subcode}")
    }

    fn icd10(index: usize) -> Option<Self> {
        Self::ALL[..Self::ICD10_COUNT].get(index).copied()
    }

    fn icd11(subcode: &str) -> Option<Self> {
        match subcode.to_ascii_uppercase().as_str() {
            "0" => Some(CidOption::A020),
            "1" => Some(CidOption::A021),
            "2" => Some(CidOption::A022),
            "3" => Some(CidOption::A023),
            "4" => Some(CidOption::A024),
            "5" => Some(CidOption::A025),
            "Y" => Some(CidOption::A02Y),
            "Z" => Some(CidOption::A02Z),
            _ => None,
        }
    }
}

impl fmt::Display for CidOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Maps free-text diagnosis codes onto the fixed checkbox vocabulary.
///
/// Entries must start with the revision token `10` or `11`. ICD-10 entries must mention
/// `84` and ICD-11 entries `A02`; everything else is dropped. The subcode is the text
/// after the first `.`, or `0` when there is none.
///
/// An ICD-10 subcode that is not an integer maps to `F84.0`; callers depend on this even
/// though it can mis-tag a diagnosis (pending review by the form owners). An integer
/// outside `0..=9` is dropped.
pub fn normalize<S: AsRef<str>>(codes: &[S]) -> BTreeSet<CidOption> {
    codes
        .iter()
        .filter_map(|code| normalize_one(code.as_ref()))
        .collect()
}

fn normalize_one(code: &str) -> Option<CidOption> {
    let subcode = code.split_once('.').map_or("0", |(_, rest)| rest);

    if code.starts_with("10") {
        if !code.contains("84") {
            return None;
        }
        match subcode.trim().parse::<i64>() {
            Ok(n) => usize::try_from(n).ok().and_then(CidOption::icd10),
            Err(_) => Some(CidOption::F840),
        }
    } else if code.starts_with("11") {
        if !code.contains("A02") {
            return None;
        }
        CidOption::icd11(subcode)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(options: &[CidOption]) -> BTreeSet<CidOption> {
        options.iter().copied().collect()
    }

    #[test]
    fn duplicates_collapse() {
        assert_eq!(
            normalize(&["10 F84.0", "10 F84.0"]),
            set(&[CidOption::F840])
        );
    }

    #[test]
    fn missing_subcode_means_zero() {
        assert_eq!(normalize(&["10 F84"]), normalize(&["10 F84.0"]));
        assert_eq!(normalize(&["11 6A02"]), set(&[CidOption::A020]));
    }

    #[test]
    fn non_numeric_icd10_subcode_falls_back_to_first_option() {
        assert_eq!(normalize(&["10 F84.X"]), set(&[CidOption::F840]));
        assert_eq!(normalize(&["10 F84."]), set(&[CidOption::F840]));
    }

    #[test]
    fn out_of_range_icd10_subcode_is_dropped() {
        assert!(normalize(&["10 F84.12"]).is_empty());
        assert!(normalize(&["10 F84.-1"]).is_empty());
    }

    #[test]
    fn icd11_letter_suffixes_are_case_insensitive() {
        assert_eq!(
            normalize(&["11 6A02.Y", "11 6A02.z"]),
            set(&[CidOption::A02Y, CidOption::A02Z])
        );
        assert!(normalize(&["11 6A02.7", "11 6A02.X"]).is_empty());
    }

    #[test]
    fn unrelated_codes_are_dropped() {
        assert!(normalize(&["12 Z99.9"]).is_empty());
        assert!(normalize(&["10 F90.0", "11 6A05.1", "F84.0"]).is_empty());
        assert!(normalize::<&str>(&[]).is_empty());
    }

    #[test]
    fn revision_token_needs_no_separator() {
        assert_eq!(normalize(&["10F84.3"]), set(&[CidOption::F843]));
    }

    #[test]
    fn output_is_always_within_vocabulary() {
        let inputs = [
            "10 F84.0", "10 F84.9", "10 F84.10", "10 F84.x", "11 6A02.5", "11 6A02.Y",
            "11 6A02.y", "11 6A02.6", "10", "11", "", "10 84", "11A02", "1084.3",
        ];
        let result = normalize(&inputs);
        assert!(result.iter().all(|option| CidOption::ALL.contains(option)));
        assert!(result.len() <= CidOption::ALL.len());
    }

    #[test]
    fn codes_round_trip_through_normalize() {
        assert_eq!(CidOption::F840.code(), "10:F84.0");
        assert_eq!(CidOption::A02Y.code(), "11:6A02.Y");
        for option in CidOption::ALL {
            assert_eq!(normalize(&[option.code()]), set(&[option]));
        }
    }

    #[test]
    fn ids_sort_like_variants() {
        let mut ids: Vec<&str> = CidOption::ALL.iter().map(|o| o.id()).collect();
        ids.sort_unstable();
        let ordered: Vec<&str> = CidOption::ALL.iter().map(|o| o.id()).collect();
        assert_eq!(ids, ordered);
        assert_eq!(CidOption::from_id("cid11_6A02_Z"), Some(CidOption::A02Z));
        assert_eq!(CidOption::A020.revision(), CidRevision::Icd11);
        assert_eq!(CidOption::F849.revision(), CidRevision::Icd10);
    }
}
