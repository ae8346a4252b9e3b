//! Sensor column schema and its one-time resolution.

use crate::data::table::TIME_COLUMN;
use crate::error::{AppResult, DaqError};

/// Ordered, unique, non-empty list of sensor column names.
///
/// A schema read from a header line with a time column also remembers the
/// device's own heading for that column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    names: Vec<String>,
    time_heading: Option<String>,
}

impl Schema {
    /// Validate and wrap a list of column names.
    pub fn new(names: Vec<String>) -> AppResult<Self> {
        if names.is_empty() {
            return Err(DaqError::InvalidSchema("no sensor columns".into()));
        }
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(DaqError::InvalidSchema(format!(
                    "column {} has an empty name",
                    i + 1
                )));
            }
            if names[..i].contains(name) {
                return Err(DaqError::InvalidSchema(format!(
                    "duplicate column '{name}'"
                )));
            }
        }
        Ok(Self {
            names,
            time_heading: None,
        })
    }

    /// Schema from a header line. With a time column the first field is the time
    /// signature heading; it is kept apart from the sensor names.
    pub fn from_header(line: &str, delimiter: char, has_time_column: bool) -> AppResult<Self> {
        let mut fields = line.split(delimiter).map(|name| name.trim().to_string());
        let time_heading = if has_time_column { fields.next() } else { None };
        let mut schema = Self::new(fields.collect())?;
        schema.check_time_column(has_time_column)?;
        schema.time_heading = time_heading;
        Ok(schema)
    }

    /// With a time column, no sensor may take its name.
    pub fn check_time_column(&self, has_time_column: bool) -> AppResult<()> {
        if has_time_column && self.names.iter().any(|name| name == TIME_COLUMN) {
            return Err(DaqError::InvalidSchema(format!(
                "'{TIME_COLUMN}' is reserved for the time signature column"
            )));
        }
        Ok(())
    }

    /// The device's heading of the time signature column, when read from a header.
    pub fn time_heading(&self) -> Option<&str> {
        self.time_heading.as_deref()
    }

    /// Column names in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of sensor columns.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false for a constructed schema.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Fields a row must carry.
    pub fn row_arity(&self, has_time_column: bool) -> usize {
        self.names.len() + usize::from(has_time_column)
    }
}

/// Holds the schema of one session: either supplied up front or inferred from the
/// first contentful line. Resolution happens at most once.
#[derive(Debug, Clone)]
pub struct SchemaResolver {
    schema: Option<Schema>,
    explicit: bool,
    delimiter: char,
    has_time_column: bool,
}

impl SchemaResolver {
    /// Resolver that starts resolved with a caller-supplied schema.
    pub fn explicit(schema: Schema, delimiter: char, has_time_column: bool) -> AppResult<Self> {
        schema.check_time_column(has_time_column)?;
        Ok(Self {
            schema: Some(schema),
            explicit: true,
            delimiter,
            has_time_column,
        })
    }

    /// Resolver that will take the first line as the header.
    pub fn inferred(delimiter: char, has_time_column: bool) -> Self {
        Self {
            schema: None,
            explicit: false,
            delimiter,
            has_time_column,
        }
    }

    /// The resolved schema, if any.
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    /// Whether the schema was supplied rather than inferred.
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Resolve from a header line. Returns the existing schema untouched if already
    /// resolved; later lines never re-derive it.
    pub fn resolve(&mut self, header: &str) -> AppResult<&Schema> {
        if self.schema.is_none() {
            let schema = Schema::from_header(header, self.delimiter, self.has_time_column)?;
            tracing::debug!(columns = ?schema.names(), "Schema inferred from header");
            self.schema = Some(schema);
        }
        self.schema
            .as_ref()
            .ok_or_else(|| DaqError::InvalidSchema("schema unresolved".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn header_without_time_column() {
        let schema = Schema::from_header("A,B", ',', false).unwrap();
        assert_eq!(schema.names(), names(&["A", "B"]).as_slice());
        assert_eq!(schema.row_arity(false), 2);
    }

    #[test]
    fn header_drops_time_heading() {
        let schema = Schema::from_header("ms;EKG;MPK;HWDP", ';', true).unwrap();
        assert_eq!(schema.names(), names(&["EKG", "MPK", "HWDP"]).as_slice());
        assert_eq!(schema.row_arity(true), 4);
        assert_eq!(schema.time_heading(), Some("ms"));
    }

    #[test]
    fn header_names_are_trimmed() {
        let schema = Schema::from_header("A, B ", ',', false).unwrap();
        assert_eq!(schema.names(), names(&["A", "B"]).as_slice());
    }

    #[test]
    fn invalid_headers() {
        assert!(Schema::from_header("A,A", ',', false).is_err());
        assert!(Schema::from_header("A,,B", ',', false).is_err());
        assert!(Schema::from_header("ms", ',', true).is_err());
        assert!(Schema::from_header("ms,time", ',', true).is_err());
        assert!(Schema::new(vec![]).is_err());
    }

    #[test]
    fn time_is_a_sensor_name_without_time_column() {
        let schema = Schema::from_header("time,A", ',', false).unwrap();
        assert_eq!(schema.names(), names(&["time", "A"]).as_slice());
        assert_eq!(schema.time_heading(), None);

        let explicit = Schema::new(names(&["time"])).unwrap();
        assert!(SchemaResolver::explicit(explicit.clone(), ',', false).is_ok());
        assert!(matches!(
            SchemaResolver::explicit(explicit, ',', true),
            Err(DaqError::InvalidSchema(_))
        ));
    }

    #[test]
    fn resolves_once() {
        let mut resolver = SchemaResolver::inferred(',', false);
        assert!(resolver.schema().is_none());

        resolver.resolve("A,B").unwrap();
        let again = resolver.resolve("X,Y,Z").unwrap();
        assert_eq!(again.names(), names(&["A", "B"]).as_slice());
        assert!(!resolver.is_explicit());
    }

    #[test]
    fn explicit_is_resolved_from_start() {
        let schema = Schema::new(names(&["EKG", "MPK"])).unwrap();
        let resolver = SchemaResolver::explicit(schema.clone(), ',', true).unwrap();
        assert_eq!(resolver.schema(), Some(&schema));
        assert!(resolver.is_explicit());
    }
}
