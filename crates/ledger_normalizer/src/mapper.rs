use std::collections::BTreeMap;

use models::text::fold_key;
use models::{AliasTable, SourceField};

/// Resolution of every [`SourceField`] to a header index or absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    indices: BTreeMap<SourceField, Option<usize>>,
}

impl ColumnMapping {
    /// Resolves each field against the header only, never against data.
    ///
    /// Aliases are tried in table order and the first one present in the
    /// header wins. Header cells and aliases are compared by [`fold_key`],
    /// so `ＤＡＴＥ`, ` date ` and `Date` are the same name. With duplicate
    /// header names the leftmost column is used.
    pub fn resolve<S: AsRef<str>>(header: &[S], aliases: &AliasTable) -> Self {
        let keys: Vec<String> = header.iter().map(|h| fold_key(h.as_ref())).collect();

        let indices = SourceField::ALL
            .iter()
            .map(|field| {
                let index = aliases
                    .aliases(*field)
                    .iter()
                    .map(|alias| fold_key(alias))
                    .filter(|alias| !alias.is_empty())
                    .find_map(|alias| keys.iter().position(|key| *key == alias));
                (*field, index)
            })
            .collect();

        Self { indices }
    }

    pub fn index(&self, field: SourceField) -> Option<usize> {
        self.indices.get(&field).copied().flatten()
    }

    pub fn is_resolved(&self, field: SourceField) -> bool {
        self.index(field).is_some()
    }

    /// Fields with no matching header column.
    pub fn absent(&self) -> Vec<SourceField> {
        self.indices
            .iter()
            .filter(|(_, index)| index.is_none())
            .map(|(field, _)| *field)
            .collect()
    }

    /// True when rows can yield a date, either from a date column or from
    /// separate year/month/day columns.
    pub fn has_date_source(&self) -> bool {
        self.is_resolved(SourceField::Date)
            || (self.is_resolved(SourceField::Year)
                && self.is_resolved(SourceField::Month)
                && self.is_resolved(SourceField::Day))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payables_header() {
        let mapping = ColumnMapping::resolve(&["伝票日付", "仕入先", "数量", "金額"], &AliasTable::builtin());
        assert_eq!(mapping.index(SourceField::Date), Some(0));
        assert_eq!(mapping.index(SourceField::Counterparty), Some(1));
        assert_eq!(mapping.index(SourceField::Quantity), Some(2));
        assert_eq!(mapping.index(SourceField::TotalAmount), Some(3));
        assert_eq!(mapping.index(SourceField::UnitPrice), None);
        assert_eq!(mapping.index(SourceField::Memo), None);
        assert!(mapping.has_date_source());
    }

    #[test]
    fn test_every_builtin_alias_resolves_to_its_column() {
        let table = AliasTable::builtin();
        for field in SourceField::ALL {
            for alias in table.aliases(field) {
                let header = ["unrelated", alias.as_str(), "other"];
                let mapping = ColumnMapping::resolve(&header, &table);
                assert_eq!(mapping.index(field), Some(1), "alias {alias} for {field}");
                for other in SourceField::ALL.iter().filter(|f| **f != field) {
                    assert_ne!(mapping.index(*other), Some(1), "alias {alias} leaked into {other}");
                }
            }
        }
    }

    #[test]
    fn test_unknown_header_is_absent() {
        let mapping = ColumnMapping::resolve(&["取引日時", "Vendor", "量"], &AliasTable::builtin());
        assert_eq!(mapping.absent().len(), SourceField::ALL.len());
        assert!(!mapping.has_date_source());
    }

    #[test]
    fn test_width_case_and_space_insensitive() {
        let mapping = ColumnMapping::resolve(&[" ＤＡＴＥ ", "Unit_Price", "伝 票 番 号"], &AliasTable::builtin());
        assert_eq!(mapping.index(SourceField::Date), Some(0));
        assert_eq!(mapping.index(SourceField::UnitPrice), Some(1));
        assert_eq!(mapping.index(SourceField::DocumentId), Some(2));
    }

    #[test]
    fn test_half_width_kana_header() {
        let mapping = ColumnMapping::resolve(&["日付", "ﾒﾓ", "金額"], &AliasTable::builtin());
        assert_eq!(mapping.index(SourceField::Memo), Some(1));

        let table = AliasTable::builtin().with_aliases(SourceField::DocumentId, ["デンピョウバンゴウ"]);
        let mapping = ColumnMapping::resolve(&["ﾃﾞﾝﾋﾟｮｳ ﾊﾞﾝｺﾞｳ", "ﾋﾂﾞｹ"], &table);
        assert_eq!(mapping.index(SourceField::DocumentId), Some(0));
        assert_eq!(mapping.index(SourceField::Date), None);
    }

    #[test]
    fn test_duplicate_header_first_occurrence_wins() {
        let mapping = ColumnMapping::resolve(&["金額", "数量", "金額"], &AliasTable::builtin());
        assert_eq!(mapping.index(SourceField::TotalAmount), Some(0));
    }

    #[test]
    fn test_alias_order_beats_column_order() {
        // 税込金額 comes before 税抜金額 in the alias list
        let mapping = ColumnMapping::resolve(&["税抜金額", "税込金額"], &AliasTable::builtin());
        assert_eq!(mapping.index(SourceField::TotalAmount), Some(1));
    }

    #[test]
    fn test_split_date_columns() {
        let mapping = ColumnMapping::resolve(&["年", "月", "日", "摘要"], &AliasTable::builtin());
        assert!(!mapping.is_resolved(SourceField::Date));
        assert!(mapping.has_date_source());
        assert_eq!(mapping.index(SourceField::Description), Some(3));
    }

    #[test]
    fn test_custom_table_is_total() {
        let table = AliasTable::new(Default::default()).with_aliases(SourceField::Date, ["Booked"]);
        let mapping = ColumnMapping::resolve(&["Booked", "金額"], &table);
        assert_eq!(mapping.index(SourceField::Date), Some(0));
        assert_eq!(mapping.index(SourceField::TotalAmount), None);
        assert_eq!(mapping.absent().len(), SourceField::ALL.len() - 1);
    }
}
