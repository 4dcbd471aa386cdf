use crate::error::PackError;
use contentpack_common::Category;
use std::collections::BTreeMap;

/// Expected client `.dat` CRC32 per frozen category.
///
/// No category is frozen yet, so this table is empty and strict mode only
/// checks the categories listed under `checksums` in `contentpack.json`.
/// Every other category reports [`ChecksumOutcome::Unfrozen`] with its CRC.
/// Add an entry here once a category has been verified against a reference
/// cache.
pub const FROZEN: &[(Category, u32)] = &[];

/// How a packed category compared against its expected checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumOutcome {
    Matched(u32),
    /// No expected value; the actual CRC is reported so it can be frozen.
    Unfrozen(u32),
    /// Mismatch accepted because verification is not strict.
    Tolerated { expected: u32, actual: u32 },
}

/// Compares freshly packed client bytes with expected checksums.
#[derive(Debug, Clone)]
pub struct ChecksumGate {
    expected: BTreeMap<Category, u32>,
    strict: bool,
}

impl ChecksumGate {
    pub fn new(strict: bool) -> Self {
        Self {
            expected: FROZEN.iter().copied().collect(),
            strict,
        }
    }

    /// Replace or add the expected checksum of one category.
    pub fn with_expected(mut self, category: Category, crc: u32) -> Self {
        self.expected.insert(category, crc);
        self
    }

    pub fn expected(&self, category: Category) -> Option<u32> {
        self.expected.get(&category).copied()
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn check(&self, category: Category, actual: u32) -> Result<ChecksumOutcome, PackError> {
        let Some(expected) = self.expected(category) else {
            tracing::info!(%category, crc = format_args!("{actual:#010x}"), "checksum not frozen");
            return Ok(ChecksumOutcome::Unfrozen(actual));
        };
        if expected == actual {
            return Ok(ChecksumOutcome::Matched(actual));
        }
        if self.strict {
            return Err(PackError::ChecksumMismatch {
                category,
                expected,
                actual,
            });
        }
        tracing::warn!(
            %category,
            expected = format_args!("{expected:#010x}"),
            actual = format_args!("{actual:#010x}"),
            "checksum mismatch tolerated"
        );
        Ok(ChecksumOutcome::Tolerated { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfrozen_categories_pass() {
        let gate = ChecksumGate::new(true);
        assert_eq!(
            gate.check(Category::Npc, 7).unwrap(),
            ChecksumOutcome::Unfrozen(7)
        );
    }

    #[test]
    fn strict_gate_without_overrides_checks_nothing() {
        let gate = ChecksumGate::new(true);
        for category in Category::CONFIGS {
            assert_eq!(gate.expected(category), None);
            assert!(matches!(
                gate.check(category, 0xDEAD_BEEF),
                Ok(ChecksumOutcome::Unfrozen(0xDEAD_BEEF))
            ));
        }
    }

    #[test]
    fn strict_mismatch_is_fatal() {
        let gate = ChecksumGate::new(true).with_expected(Category::Obj, 0xCBF4_3926);
        assert_eq!(
            gate.check(Category::Obj, 0xCBF4_3926).unwrap(),
            ChecksumOutcome::Matched(0xCBF4_3926)
        );
        let err = gate.check(Category::Obj, 1).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("obj"));
        assert!(message.contains("0xcbf43926"));
        assert!(message.contains("0x00000001"));
    }

    #[test]
    fn lenient_mismatch_is_tolerated() {
        let gate = ChecksumGate::new(false).with_expected(Category::Loc, 5);
        assert_eq!(
            gate.check(Category::Loc, 6).unwrap(),
            ChecksumOutcome::Tolerated {
                expected: 5,
                actual: 6
            }
        );
    }
}
