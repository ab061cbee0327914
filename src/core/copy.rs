//! Bulk COPY statements that pull a staged manifest into a table.

use crate::core::format::{Compression, TableFormat};
use crate::core::manifest::LoadManifest;
use crate::utils::error::{LoaderError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const ACCESS_KEY_ID_ENV: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_ACCESS_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";

const REDACTED: &str = "'****'";

static SECRET_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(SECRET_ACCESS_KEY|SESSION_TOKEN) '(?:[^']|'')*'")
        .expect("secret clause pattern is valid")
});

/// Credentials clause of a COPY statement.
#[derive(Clone, PartialEq, Eq)]
pub enum Authorization {
    IamRole(String),
    AccessKeys {
        access_key_id: String,
        secret_access_key: String,
    },
    /// No credential material; the warehouse's own permission check decides.
    Unauthenticated,
}

impl std::fmt::Debug for Authorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Authorization::IamRole(role) => f.debug_tuple("IamRole").field(role).finish(),
            Authorization::AccessKeys { access_key_id, .. } => f
                .debug_struct("AccessKeys")
                .field("access_key_id", access_key_id)
                .finish_non_exhaustive(),
            Authorization::Unauthenticated => f.write_str("Unauthenticated"),
        }
    }
}

impl Authorization {
    /// An IAM role wins; otherwise both access keys must be available from `lookup`.
    pub fn resolve<F>(iam_role: Option<&str>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(role) = iam_role.filter(|r| !r.trim().is_empty()) {
            return Authorization::IamRole(role.to_string());
        }

        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());
        match (non_empty(ACCESS_KEY_ID_ENV), non_empty(SECRET_ACCESS_KEY_ENV)) {
            (Some(access_key_id), Some(secret_access_key)) => Authorization::AccessKeys {
                access_key_id,
                secret_access_key,
            },
            _ => Authorization::Unauthenticated,
        }
    }

    pub fn from_env(iam_role: Option<&str>) -> Self {
        Self::resolve(iam_role, |name| std::env::var(name).ok())
    }

    fn clause(&self, redact: bool) -> Option<String> {
        match self {
            Authorization::IamRole(role) => Some(format!("IAM_ROLE {}", quote_literal(role))),
            Authorization::AccessKeys {
                access_key_id,
                secret_access_key,
            } => {
                let secret = if redact {
                    REDACTED.to_string()
                } else {
                    quote_literal(secret_access_key)
                };
                Some(format!(
                    "ACCESS_KEY_ID {} SECRET_ACCESS_KEY {}",
                    quote_literal(access_key_id),
                    secret
                ))
            }
            Authorization::Unauthenticated => None,
        }
    }
}

/// Knobs of the COPY statement that are not fixed by the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyOptions {
    pub date_format: String,
    pub time_format: String,
    pub region: Option<String>,
    /// Extra COPY parameters appended verbatim.
    pub parameters: Option<String>,
    pub iam_role: Option<String>,
    pub session_token: Option<String>,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            date_format: "auto".to_string(),
            time_format: "auto".to_string(),
            region: None,
            parameters: None,
            iam_role: None,
            session_token: None,
        }
    }
}

impl CopyOptions {
    pub fn with_iam_role(mut self, role: impl Into<String>) -> Self {
        self.iam_role = Some(role.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// A rendered COPY statement plus a copy safe to write to logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyStatement {
    pub sql: String,
    pub redacted: String,
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Masks credential literals in any statement text.
pub fn redact_statement(sql: &str) -> String {
    SECRET_CLAUSE
        .replace_all(sql, format!("$1 {}", REDACTED).as_str())
        .into_owned()
}

/// Builds the COPY for `table`, naming every destination column explicitly.
pub fn copy_statement(
    table: &str,
    columns: &[String],
    manifest: &LoadManifest,
    options: &CopyOptions,
    authorization: &Authorization,
) -> Result<CopyStatement> {
    if !manifest.format.format.is_copy_loadable() {
        return Err(LoaderError::validation(format!(
            "{} objects cannot be bulk-copied, use csv or parquet",
            manifest.format.format
        )));
    }
    if columns.is_empty() {
        return Err(LoaderError::validation(format!(
            "COPY into {} needs at least one column",
            table
        )));
    }

    let render = |redact: bool| {
        let mut lines = vec![
            format!("COPY {} ({})", table, columns.join(", ")),
            format!("FROM {}", quote_literal(&manifest.copy_url())),
        ];

        match manifest.format.format {
            TableFormat::Parquet => lines.push("FORMAT AS PARQUET".to_string()),
            _ => {
                let mut csv = format!(
                    "CSV DELIMITER {} QUOTE AS {} IGNOREHEADER 1",
                    quote_literal(&manifest.format.delimiter.to_string()),
                    quote_literal(&manifest.format.quote.to_string())
                );
                if manifest.format.compression == Compression::Gzip {
                    csv.push_str(" GZIP");
                }
                lines.push(csv);
                lines.push(format!(
                    "DATEFORMAT {} TIMEFORMAT {}",
                    quote_literal(&options.date_format),
                    quote_literal(&options.time_format)
                ));
            }
        }

        if let Some(clause) = authorization.clause(redact) {
            lines.push(clause);
        }
        if let Some(parameters) = non_empty(&options.parameters) {
            lines.push(parameters.to_string());
        }
        if let Some(region) = non_empty(&options.region) {
            lines.push(format!("REGION {}", quote_literal(region)));
        }
        if let Some(token) = non_empty(&options.session_token) {
            let token = if redact {
                REDACTED.to_string()
            } else {
                quote_literal(token)
            };
            lines.push(format!("SESSION_TOKEN {}", token));
        }

        let mut sql = lines.join("\n");
        sql.push(';');
        sql
    };

    Ok(CopyStatement {
        sql: render(false),
        redacted: render(true),
    })
}
