use serde::{ser::SerializeMap, Serialize, Serializer};

/// A parsed CSV file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    /// Column names from the header row, exactly as written.
    pub headers: Vec<String>,
    /// One entry per data row, aligned with `headers`. Empty or absent cells are `None`.
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn columns(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Serializable view of the rows as header-ordered objects.
    pub fn records(&self) -> Records<'_> {
        Records(self)
    }
}

pub struct Records<'a>(&'a Table);

struct Record<'a> {
    headers: &'a [String],
    cells: &'a [Option<String>],
}

impl Serialize for Records<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.rows.iter().map(|cells| Record {
            headers: &self.0.headers,
            cells,
        }))
    }
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.headers.len()))?;
        for (i, name) in self.headers.iter().enumerate() {
            let cell = self.cells.get(i).and_then(|c| c.as_deref());
            map.serialize_entry(name, &cell)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_keep_header_order() {
        let table = Table {
            headers: vec!["zeta".into(), "alpha".into(), "mid".into()],
            rows: vec![vec![Some("1".into()), None, Some("x".into())]],
        };
        let json = serde_json::to_string(&table.records()).unwrap();
        assert_eq!(json, r#"[{"zeta":"1","alpha":null,"mid":"x"}]"#);
    }

    #[test]
    fn test_ragged_row_serializes_missing_as_null() {
        let table = Table {
            headers: vec!["a".into(), "b".into()],
            rows: vec![vec![Some("1".into())]],
        };
        let json = serde_json::to_string(&table.records()).unwrap();
        assert_eq!(json, r#"[{"a":"1","b":null}]"#);
    }
}
