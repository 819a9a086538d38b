use crate::{Column, ColumnData, ColumnError};

/// Separator placed between the parts produced by [`StrAccessor::split`].
pub const SPLIT_MARKER: &str = "|";

/// Text derivations over a `Utf8` column. Every method maps a null row to a null row.
pub struct StrAccessor<'a> {
    values: &'a [String],
    column: &'a Column,
}

impl Column {
    /// Text accessor; fails with a type error unless the column holds text.
    pub fn str(&self) -> Result<StrAccessor<'_>, ColumnError> {
        match self.data() {
            ColumnData::Utf8(values) => Ok(StrAccessor {
                values,
                column: self,
            }),
            _ => Err(ColumnError::UnsupportedDtype {
                op: "string operations",
                dtype: self.dtype(),
            }),
        }
    }
}

impl StrAccessor<'_> {
    fn map_text<T>(&self, func: impl Fn(&str) -> T) -> impl Iterator<Item = Option<T>> {
        self.values
            .iter()
            .enumerate()
            .map(move |(i, s)| self.column.is_valid(i).then(|| func(s.as_str())))
    }

    #[must_use]
    pub fn upper(&self) -> Column {
        Column::from_strings(self.map_text(str::to_uppercase))
    }

    #[must_use]
    pub fn lower(&self) -> Column {
        Column::from_strings(self.map_text(str::to_lowercase))
    }

    #[must_use]
    pub fn strip(&self) -> Column {
        Column::from_strings(self.map_text(|s| s.trim().to_owned()))
    }

    #[must_use]
    pub fn replace(&self, pattern: &str, replacement: &str) -> Column {
        Column::from_strings(self.map_text(|s| s.replace(pattern, replacement)))
    }

    /// Split on `separator` and rejoin the parts with [`SPLIT_MARKER`].
    pub fn split(&self, separator: &str) -> Result<Column, ColumnError> {
        if separator.is_empty() {
            return Err(ColumnError::InvalidArgument(
                "split separator must not be empty".to_owned(),
            ));
        }
        Ok(Column::from_strings(self.map_text(|s| {
            s.split(separator).collect::<Vec<_>>().join(SPLIT_MARKER)
        })))
    }

    #[must_use]
    pub fn contains(&self, pattern: &str) -> Column {
        Column::from_bools(self.map_text(|s| s.contains(pattern)))
    }

    /// Length in characters.
    #[must_use]
    pub fn len(&self) -> Column {
        Column::from_i64s(self.map_text(|s| s.chars().count() as i64))
    }

    /// Every non-null row holds all non-null values of the column joined by `separator`.
    #[must_use]
    pub fn cat(&self, separator: &str) -> Column {
        let joined = self
            .values
            .iter()
            .enumerate()
            .filter(|(i, _)| self.column.is_valid(*i))
            .map(|(_, s)| s.as_str())
            .collect::<Vec<_>>()
            .join(separator);
        Column::from_strings(self.map_text(|_| joined.clone()))
    }
}

#[cfg(test)]
mod tests {
    use tf_types::{DType, ErrorKind, Scalar};

    use crate::Column;

    fn names() -> Column {
        Column::from_strings([Some(" Alice "), None, Some("bob")])
    }

    #[test]
    fn case_and_strip_preserve_nulls() {
        let col = names();
        let upper = col.str().expect("text").upper();
        assert_eq!(
            upper.to_values(),
            vec![Scalar::Utf8(" ALICE ".into()), Scalar::Null, Scalar::Utf8("BOB".into())]
        );
        let stripped = col.str().expect("text").strip();
        assert_eq!(stripped.get(0), Scalar::Utf8("Alice".into()));
        assert_eq!(stripped.get(1), Scalar::Null);
    }

    #[test]
    fn split_rejoins_with_marker() {
        let col = Column::from_strings([Some("a,b,c"), Some("d")]);
        let out = col.str().expect("text").split(",").expect("split");
        assert_eq!(out.get(0), Scalar::Utf8("a|b|c".into()));
        assert_eq!(out.get(1), Scalar::Utf8("d".into()));
        assert!(col.str().expect("text").split("").is_err());
    }

    #[test]
    fn contains_and_len_change_kind() {
        let col = names();
        let contains = col.str().expect("text").contains("li");
        assert_eq!(contains.dtype(), DType::Bool);
        assert_eq!(
            contains.to_values(),
            vec![Scalar::Bool(true), Scalar::Null, Scalar::Bool(false)]
        );
        let len = col.str().expect("text").len();
        assert_eq!(len.dtype(), DType::Int64);
        assert_eq!(len.get(2), Scalar::Int64(3));
    }

    #[test]
    fn cat_joins_every_present_value() {
        let col = Column::from_strings([Some("x"), None, Some("y")]);
        let out = col.str().expect("text").cat("-");
        assert_eq!(
            out.to_values(),
            vec![Scalar::Utf8("x-y".into()), Scalar::Null, Scalar::Utf8("x-y".into())]
        );
    }

    #[test]
    fn replace_substitutes_all_occurrences() {
        let col = Column::from_strings([Some("a-a")]);
        let out = col.str().expect("text").replace("a", "b");
        assert_eq!(out.get(0), Scalar::Utf8("b-b".into()));
    }

    #[test]
    fn numeric_column_is_rejected() {
        let col = Column::from_i64s([Some(1)]);
        let err = col.str().err().expect("type error");
        assert_eq!(err.kind(), ErrorKind::Type);
    }
}
