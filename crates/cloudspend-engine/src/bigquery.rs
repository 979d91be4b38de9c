//! BigQuery-backed [`RemoteCostSource`] over the standard billing
//! export table.
//!
//! Queries go through the synchronous `jobs.query` REST endpoint with
//! named string parameters. Identifiers (project, dataset, table) can
//! never be parameterized in SQL, so they are charset-validated before
//! being interpolated into a backtick-quoted table reference.

use crate::source::{RemoteCostSource, SourceResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use cloudspend_core::config::is_valid_identifier;
use cloudspend_core::error::SourceError;
use cloudspend_core::{DailyCost, MonthlySummary, ServiceBreakdown, SkuBreakdown, TableRef};
use serde_json::{json, Value};

const BIGQUERY_API: &str = "https://bigquery.googleapis.com/bigquery/v2";
const EXPORT_TABLE_PREFIX: &str = "gcp_billing_export_v1_";
const QUERY_TIMEOUT_MS: u64 = 30_000;

const AUTH_HINT: &str = "run: gcloud auth application-default login";
const PERMISSION_HINT: &str =
    "grant roles/bigquery.jobUser on the billing project and read access on the export dataset";
const EXPORT_HINT: &str =
    "check that billing export to BigQuery is enabled and the dataset name is correct";

pub struct BigQuerySource {
    client: reqwest::Client,
    project_id: String,
    token: String,
}

impl BigQuerySource {
    /// Builds a source for queries billed to `project_id`, acquiring an
    /// access token up front so every later failure is a query failure.
    pub async fn new(project_id: impl Into<String>) -> SourceResult<Self> {
        let token = access_token().await?;
        Ok(Self {
            client: reqwest::Client::new(),
            project_id: project_id.into(),
            token,
        })
    }

    /// Runs one parameterized query and returns rows of nullable cell
    /// strings (BigQuery serializes every cell as a string).
    async fn run_query(
        &self,
        query: &str,
        params: &[(&str, String)],
    ) -> SourceResult<Vec<Vec<Option<String>>>> {
        let url = format!("{BIGQUERY_API}/projects/{}/queries", self.project_id);
        let query_parameters: Vec<Value> = params
            .iter()
            .map(|(name, value)| {
                json!({
                    "name": name,
                    "parameterType": { "type": "STRING" },
                    "parameterValue": { "value": value },
                })
            })
            .collect();
        let body = json!({
            "query": query,
            "useLegacySql": false,
            "parameterMode": "NAMED",
            "queryParameters": query_parameters,
            "timeoutMs": QUERY_TIMEOUT_MS,
        });

        tracing::debug!(project = %self.project_id, "running BigQuery job");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let payload = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(classify_http_error(status.as_u16(), &payload));
        }

        let payload: Value = serde_json::from_str(&payload).map_err(|err| SourceError::Query {
            message: format!("unreadable BigQuery response: {err}"),
            hint: None,
        })?;
        if payload["jobComplete"] == json!(false) {
            return Err(SourceError::Query {
                message: "query did not complete within the timeout".to_string(),
                hint: None,
            });
        }
        Ok(extract_rows(&payload))
    }

    fn with_common_filters(
        base: String,
        filter_project: Option<&str>,
        params: &mut Vec<(&'static str, String)>,
    ) -> String {
        match filter_project {
            Some(project) => {
                params.push(("project", project.to_string()));
                format!("{base} AND project.id = @project")
            }
            None => base,
        }
    }
}

#[async_trait]
impl RemoteCostSource for BigQuerySource {
    async fn current_month_costs(
        &self,
        table: &TableRef,
        filter_project: Option<&str>,
        currency: &str,
    ) -> SourceResult<MonthlySummary> {
        let table_ref = qualified_table(table)?;
        let mut params = vec![("month", current_invoice_month())];
        let query = Self::with_common_filters(
            format!(
                "SELECT FORMAT_DATE('%Y-%m-%d', DATE(usage_start_time)) AS day, \
                 SUM(cost) AS gross, \
                 SUM(cost) + SUM(IFNULL((SELECT SUM(c.amount) FROM UNNEST(credits) c), 0)) AS net, \
                 ANY_VALUE(currency) AS currency \
                 FROM {table_ref} WHERE invoice.month = @month"
            ),
            filter_project,
            &mut params,
        );
        let query = format!("{query} GROUP BY day ORDER BY day");

        let rows = self.run_query(&query, &params).await?;
        let mut total_cost = 0.0;
        let mut net_cost = 0.0;
        let mut observed_currency = None;
        let daily_costs: Vec<DailyCost> = rows
            .iter()
            .filter_map(|row| {
                let date = row.first()?.clone()?;
                let gross = cell_f64(row.get(1));
                let net = cell_f64(row.get(2));
                let row_currency = row
                    .get(3)
                    .and_then(|c| c.clone())
                    .unwrap_or_else(|| currency.to_string());
                total_cost += gross;
                net_cost += net;
                observed_currency.get_or_insert_with(|| row_currency.clone());
                Some(DailyCost {
                    date,
                    amount: net,
                    currency: row_currency,
                })
            })
            .collect();

        Ok(MonthlySummary {
            total_cost,
            net_cost,
            currency: observed_currency.unwrap_or_else(|| currency.to_string()),
            daily_costs,
        })
    }

    async fn costs_by_service(
        &self,
        table: &TableRef,
        filter_project: Option<&str>,
        month: Option<&str>,
        currency: &str,
    ) -> SourceResult<Vec<ServiceBreakdown>> {
        let table_ref = qualified_table(table)?;
        let mut params = vec![("month", invoice_month(month)?)];
        let query = Self::with_common_filters(
            format!(
                "SELECT service.description AS service, \
                 SUM(cost) + SUM(IFNULL((SELECT SUM(c.amount) FROM UNNEST(credits) c), 0)) AS amount, \
                 ANY_VALUE(currency) AS currency \
                 FROM {table_ref} WHERE invoice.month = @month"
            ),
            filter_project,
            &mut params,
        );
        let query = format!("{query} GROUP BY service HAVING amount != 0 ORDER BY amount DESC");

        let rows = self.run_query(&query, &params).await?;
        let parsed: Vec<(String, f64, String)> = rows
            .iter()
            .filter_map(|row| {
                let service = row.first()?.clone()?;
                let amount = cell_f64(row.get(1));
                let row_currency = row
                    .get(2)
                    .and_then(|c| c.clone())
                    .unwrap_or_else(|| currency.to_string());
                Some((service, amount, row_currency))
            })
            .collect();

        let total: f64 = parsed.iter().map(|(_, amount, _)| amount.abs()).sum();
        Ok(parsed
            .into_iter()
            .map(|(service, amount, currency)| ServiceBreakdown {
                service,
                percentage: share_percent(amount, total),
                amount,
                currency,
            })
            .collect())
    }

    async fn costs_by_sku(
        &self,
        table: &TableRef,
        service: Option<&str>,
        filter_project: Option<&str>,
        month: Option<&str>,
        currency: &str,
    ) -> SourceResult<Vec<SkuBreakdown>> {
        let table_ref = qualified_table(table)?;
        let mut params = vec![("month", invoice_month(month)?)];
        let mut query = Self::with_common_filters(
            format!(
                "SELECT sku.id AS sku, ANY_VALUE(sku.description) AS description, \
                 SUM(cost) + SUM(IFNULL((SELECT SUM(c.amount) FROM UNNEST(credits) c), 0)) AS amount, \
                 ANY_VALUE(currency) AS currency \
                 FROM {table_ref} WHERE invoice.month = @month"
            ),
            filter_project,
            &mut params,
        );
        if let Some(service) = service {
            params.push(("service", service.to_string()));
            query = format!("{query} AND service.description = @service");
        }
        let query = format!("{query} GROUP BY sku HAVING amount != 0 ORDER BY amount DESC");

        let rows = self.run_query(&query, &params).await?;
        let parsed: Vec<(String, String, f64, String)> = rows
            .iter()
            .filter_map(|row| {
                let sku = row.first()?.clone()?;
                let description = row.get(1).and_then(|c| c.clone()).unwrap_or_default();
                let amount = cell_f64(row.get(2));
                let row_currency = row
                    .get(3)
                    .and_then(|c| c.clone())
                    .unwrap_or_else(|| currency.to_string());
                Some((sku, description, amount, row_currency))
            })
            .collect();

        let total: f64 = parsed.iter().map(|(_, _, amount, _)| amount.abs()).sum();
        Ok(parsed
            .into_iter()
            .map(|(sku, description, amount, currency)| SkuBreakdown {
                sku,
                description,
                percentage: share_percent(amount, total),
                amount,
                currency,
            })
            .collect())
    }

    async fn daily_costs(
        &self,
        table: &TableRef,
        filter_project: Option<&str>,
        days: u32,
        currency: &str,
    ) -> SourceResult<Vec<DailyCost>> {
        let table_ref = qualified_table(table)?;
        let cutoff = (Utc::now() - Duration::days(i64::from(days)))
            .format("%Y-%m-%d")
            .to_string();
        let mut params = vec![("cutoff", cutoff)];
        let query = Self::with_common_filters(
            format!(
                "SELECT FORMAT_DATE('%Y-%m-%d', DATE(usage_start_time)) AS day, \
                 SUM(cost) + SUM(IFNULL((SELECT SUM(c.amount) FROM UNNEST(credits) c), 0)) AS amount, \
                 ANY_VALUE(currency) AS currency \
                 FROM {table_ref} WHERE DATE(usage_start_time) >= @cutoff"
            ),
            filter_project,
            &mut params,
        );
        let query = format!("{query} GROUP BY day ORDER BY day");

        let rows = self.run_query(&query, &params).await?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                let date = row.first()?.clone()?;
                Some(DailyCost {
                    date,
                    amount: cell_f64(row.get(1)),
                    currency: row
                        .get(2)
                        .and_then(|c| c.clone())
                        .unwrap_or_else(|| currency.to_string()),
                })
            })
            .collect())
    }

    async fn data_freshness(&self, table: &TableRef) -> SourceResult<DateTime<Utc>> {
        let table_ref = qualified_table(table)?;
        let query = format!("SELECT MAX(export_time) FROM {table_ref}");
        let rows = self.run_query(&query, &[]).await?;
        let cell = rows
            .first()
            .and_then(|row| row.first())
            .and_then(|c| c.clone())
            .ok_or_else(|| SourceError::Query {
                message: "billing export table has no rows".to_string(),
                hint: Some(EXPORT_HINT.to_string()),
            })?;
        parse_export_timestamp(&cell).ok_or_else(|| SourceError::Query {
            message: format!("unparseable export timestamp: {cell}"),
            hint: None,
        })
    }

    async fn find_export_table(
        &self,
        project_id: &str,
        dataset_id: &str,
    ) -> SourceResult<Option<String>> {
        if !is_valid_identifier(project_id) || !is_valid_identifier(dataset_id) {
            return Err(SourceError::InvalidInput {
                message: format!("invalid dataset reference: {project_id}.{dataset_id}"),
            });
        }
        let url = format!(
            "{BIGQUERY_API}/projects/{project_id}/datasets/{dataset_id}/tables?maxResults=200"
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let payload = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(classify_http_error(status.as_u16(), &payload));
        }

        let payload: Value = serde_json::from_str(&payload).map_err(|err| SourceError::Query {
            message: format!("unreadable table listing: {err}"),
            hint: None,
        })?;
        let found = payload["tables"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|t| t["tableReference"]["tableId"].as_str())
            .find(|id| id.starts_with(EXPORT_TABLE_PREFIX))
            .map(String::from);
        Ok(found)
    }
}

/// Token from `CLOUDSPEND_ACCESS_TOKEN`, else one gcloud ADC call.
async fn access_token() -> SourceResult<String> {
    if let Ok(token) = std::env::var("CLOUDSPEND_ACCESS_TOKEN") {
        let token = token.trim().to_string();
        if !token.is_empty() {
            return Ok(token);
        }
    }

    let output = tokio::process::Command::new("gcloud")
        .args(["auth", "application-default", "print-access-token"])
        .output()
        .await
        .map_err(|err| SourceError::Auth {
            message: format!("could not invoke gcloud: {err}"),
            hint: Some(AUTH_HINT.to_string()),
        })?;
    if !output.status.success() {
        return Err(SourceError::Auth {
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            hint: Some(AUTH_HINT.to_string()),
        });
    }
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(SourceError::Auth {
            message: "gcloud returned an empty access token".to_string(),
            hint: Some(AUTH_HINT.to_string()),
        });
    }
    Ok(token)
}

fn transport_error(err: reqwest::Error) -> SourceError {
    SourceError::Query {
        message: format!("request to BigQuery failed: {err}"),
        hint: None,
    }
}

/// Backtick-quoted `project.dataset.table`, charset-checked first.
fn qualified_table(table: &TableRef) -> SourceResult<String> {
    if !is_valid_identifier(&table.project_id)
        || !is_valid_identifier(&table.dataset_id)
        || !is_valid_identifier(&table.table_id)
    {
        return Err(SourceError::InvalidInput {
            message: format!(
                "invalid table reference: {}.{}.{}",
                table.project_id, table.dataset_id, table.table_id
            ),
        });
    }
    Ok(format!(
        "`{}.{}.{}`",
        table.project_id, table.dataset_id, table.table_id
    ))
}

/// `YYYY-MM` input to the `YYYYMM` form the export's `invoice.month`
/// column uses.
fn validate_month(month: &str) -> SourceResult<String> {
    let bytes = month.as_bytes();
    let well_formed = bytes.len() == 7
        && bytes[4] == b'-'
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[5..].iter().all(u8::is_ascii_digit);
    if !well_formed {
        return Err(SourceError::InvalidInput {
            message: format!("month must be YYYY-MM, got: {month}"),
        });
    }
    Ok(format!("{}{}", &month[..4], &month[5..]))
}

fn invoice_month(month: Option<&str>) -> SourceResult<String> {
    match month {
        Some(month) => validate_month(month),
        None => Ok(current_invoice_month()),
    }
}

fn current_invoice_month() -> String {
    Utc::now().format("%Y%m").to_string()
}

fn share_percent(amount: f64, total: f64) -> f64 {
    if total == 0.0 {
        0.0
    } else {
        amount.abs() / total * 100.0
    }
}

fn cell_f64(cell: Option<&Option<String>>) -> f64 {
    cell.and_then(|c| c.as_deref())
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// `jobs.query` rows: `rows[].f[].v`, every cell a string or null.
fn extract_rows(payload: &Value) -> Vec<Vec<Option<String>>> {
    payload["rows"]
        .as_array()
        .into_iter()
        .flatten()
        .map(|row| {
            row["f"]
                .as_array()
                .into_iter()
                .flatten()
                .map(|cell| cell["v"].as_str().map(String::from))
                .collect()
        })
        .collect()
}

/// BigQuery serializes TIMESTAMP cells as epoch seconds with a
/// fractional part ("1.7249472E9"); fall back to RFC 3339 for safety.
fn parse_export_timestamp(cell: &str) -> Option<DateTime<Utc>> {
    if let Ok(epoch) = cell.parse::<f64>() {
        return DateTime::from_timestamp(epoch as i64, 0);
    }
    DateTime::parse_from_rfc3339(cell)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn classify_http_error(status: u16, body: &str) -> SourceError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| format!("BigQuery returned HTTP {status}"));
    match status {
        401 => SourceError::Auth {
            message,
            hint: Some(AUTH_HINT.to_string()),
        },
        403 => SourceError::Permission {
            message,
            hint: Some(PERMISSION_HINT.to_string()),
        },
        400 | 404 => SourceError::Query {
            message,
            hint: Some(EXPORT_HINT.to_string()),
        },
        _ => SourceError::Query {
            message,
            hint: None,
        },
    }
}
