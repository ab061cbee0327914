//! Warehouse reserved words and column-name normalization.

use crate::utils::error::{LoaderError, Result};
use std::collections::{BTreeSet, HashSet};

/// Keywords the warehouse refuses as unquoted column names.
pub const DEFAULT_RESERVED_WORDS: &[&str] = &[
    "AES128", "AES256", "ALL", "ALLOWOVERWRITE", "ANALYSE", "ANALYZE", "AND", "ANY", "ARRAY",
    "AS", "ASC", "AUTHORIZATION", "BACKUP", "BETWEEN", "BINARY", "BLANKSASNULL", "BOTH",
    "BYTEDICT", "BZIP2", "CASE", "CAST", "CHECK", "COLLATE", "COLUMN", "CONSTRAINT", "CREATE",
    "CREDENTIALS", "CROSS", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "CURRENT_USER",
    "CURRENT_USER_ID", "DEFAULT", "DEFERRABLE", "DEFLATE", "DEFRAG", "DELTA", "DELTA32K", "DESC",
    "DISABLE", "DISTINCT", "DO", "ELSE", "EMPTYASNULL", "ENABLE", "ENCODE", "ENCRYPT",
    "ENCRYPTION", "END", "EXCEPT", "EXPLICIT", "FALSE", "FOR", "FOREIGN", "FREEZE", "FROM",
    "FULL", "GLOBALDICT256", "GLOBALDICT64K", "GRANT", "GROUP", "GZIP", "HAVING", "IDENTITY",
    "IGNORE", "ILIKE", "IN", "INITIALLY", "INNER", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN",
    "LEADING", "LEFT", "LIKE", "LIMIT", "LOCALTIME", "LOCALTIMESTAMP", "LUN", "LUNS", "LZO",
    "LZOP", "MINUS", "MOSTLY13", "MOSTLY32", "MOSTLY8", "NATURAL", "NEW", "NOT", "NOTNULL",
    "NULL", "NULLS", "OFF", "OFFLINE", "OFFSET", "OID", "OLD", "ON", "ONLY", "OPEN", "OR",
    "ORDER", "OUTER", "OVERLAPS", "PARALLEL", "PARTITION", "PERCENT", "PERMISSIONS", "PLACING",
    "PRIMARY", "RAW", "READRATIO", "RECOVER", "REFERENCES", "RESPECT", "REJECTLOG", "RESORT",
    "RESTORE", "RIGHT", "SELECT", "SESSION_USER", "SIMILAR", "SNAPSHOT", "SOME", "SYSDATE",
    "SYSTEM", "TABLE", "TAG", "TDES", "TEXT255", "TEXT32K", "THEN", "TIMESTAMP", "TO", "TOP",
    "TRAILING", "TRUE", "TRUNCATECOLUMNS", "UNION", "UNIQUE", "USER", "USING", "VERBOSE",
    "WALLET", "WHEN", "WHERE", "WITH", "WITHOUT",
];

/// Lower-cases a column name and replaces spaces with underscores.
pub fn normalize_column_name(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// The reserved-word set one loader validates column names against.
///
/// Words are stored trimmed and lower-cased; lookups compare against the
/// normalized column name, so matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedWords {
    words: HashSet<String>,
}

impl Default for ReservedWords {
    fn default() -> Self {
        Self {
            words: DEFAULT_RESERVED_WORDS
                .iter()
                .map(|w| w.trim().to_lowercase())
                .collect(),
        }
    }
}

impl ReservedWords {
    pub fn empty() -> Self {
        Self {
            words: HashSet::new(),
        }
    }

    /// Adds caller-supplied words. Blank words are rejected and nothing is added.
    pub fn add<I, W>(&mut self, words: I) -> Result<()>
    where
        I: IntoIterator<Item = W>,
        W: AsRef<str>,
    {
        let mut normalized = Vec::new();
        for word in words {
            let word = word.as_ref().trim();
            if word.is_empty() {
                return Err(LoaderError::validation(
                    "reserved words must be non-empty strings",
                ));
            }
            normalized.push(word.to_lowercase());
        }
        self.words.extend(normalized);
        Ok(())
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(&word.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Normalizes every column name and checks it against the set.
    ///
    /// Fails on the first reserved name, naming the offending column, and on
    /// names that collide once normalized.
    pub fn validate_columns<I, S>(&self, names: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized = Vec::new();
        let mut seen = BTreeSet::new();
        for name in names {
            let column = normalize_column_name(name.as_ref());
            if self.words.contains(&column) {
                return Err(LoaderError::validation(format!(
                    "column name {} is a reserved word",
                    column
                )));
            }
            if !seen.insert(column.clone()) {
                return Err(LoaderError::validation(format!(
                    "column name {} appears more than once after normalization",
                    column
                )));
            }
            normalized.push(column);
        }
        Ok(normalized)
    }
}
