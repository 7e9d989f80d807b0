use std::time::Duration;

use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{ApiError, DataSource, SummaryQuery, TrendBy};
use crate::models::{
    FilterOptions, Health, RawRows, ReportEntry, ReportType, SummaryRow, TrendRow, User,
};

/// REST 后端客户端
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    ok: bool,
    username: String,
    #[serde(default)]
    role: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = normalize_base(base_url)?;
        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;

        tracing::info!(base_url = %base_url, timeout_secs = timeout.as_secs(), "后端客户端已初始化");
        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidUrl {
                url: format!("{}{}", self.base_url, path),
                message: e.to_string(),
            })
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.url(path)?;
        tracing::debug!(%url, params = query.len(), "GET");
        let response = self.client.get(url).query(query).send()?;
        decode(path, response)
    }

    fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ApiError> {
        let url = self.url(path)?;
        tracing::debug!(%url, "POST");
        let response = self.client.post(url).json(body).send()?;
        decode(path, response)
    }
}

impl DataSource for ApiClient {
    fn login(&mut self, username: &str, password: &str) -> Result<User, ApiError> {
        let body = serde_json::json!({ "username": username, "password": password });
        let url = self.url("auth/login")?;
        tracing::debug!(%url, "POST");
        let response = self.client.post(url).json(&body).send()?;
        // 登录接口的 401 表示凭据错误，不是会话过期
        if response.status() == StatusCode::UNAUTHORIZED {
            let detail = error_detail(&response.text()?);
            return Err(login_rejected(&detail));
        }
        let response: LoginResponse = decode("auth/login", response)?;
        tracing::info!(user = %response.username, ok = response.ok, "登录成功");
        Ok(User {
            username: response.username,
            role: response.role.unwrap_or_else(|| "user".to_string()),
        })
    }

    fn logout(&mut self) -> Result<(), ApiError> {
        let _: Value = self.post_json("auth/logout", &Value::Null)?;
        Ok(())
    }

    fn me(&self) -> Result<User, ApiError> {
        self.get_json("auth/me", &[])
    }

    fn health(&self) -> Result<Health, ApiError> {
        self.get_json("api/health", &[])
    }

    fn reports(&self) -> Result<Vec<ReportEntry>, ApiError> {
        self.get_json("api/reports", &[])
    }

    fn filters(&self, query: &SummaryQuery) -> Result<FilterOptions, ApiError> {
        // 国家列表只受地区影响
        let mut pairs = query.to_pairs();
        pairs.retain(|(name, _)| *name != "country");
        self.get_json("api/filters", &pairs)
    }

    fn summary(&self, query: &SummaryQuery) -> Result<Vec<SummaryRow>, ApiError> {
        self.get_json("api/summary", &query.to_pairs())
    }

    fn trend(&self, report_type: ReportType, by: TrendBy) -> Result<Vec<TrendRow>, ApiError> {
        self.get_json(
            "api/summary/trend",
            &[
                ("report_type", report_type.as_str().to_string()),
                ("by", by.as_str().to_string()),
            ],
        )
    }

    fn raw(
        &self,
        report_type: ReportType,
        region: Option<&str>,
        country: Option<&str>,
        limit: usize,
    ) -> Result<RawRows, ApiError> {
        let mut pairs = vec![
            ("report_type", report_type.as_str().to_string()),
            ("limit", limit.clamp(1, 2000).to_string()),
        ];
        if let Some(region) = region {
            pairs.push(("region", region.to_string()));
        }
        if let Some(country) = country {
            pairs.push(("country", country.to_string()));
        }
        self.get_json("api/raw", &pairs)
    }
}

/// 统一为以 `/` 结尾，`join` 才会在其下追加路径
fn normalize_base(base_url: &str) -> Result<Url, ApiError> {
    let trimmed = base_url.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&with_slash).map_err(|e| ApiError::InvalidUrl {
        url: base_url.to_string(),
        message: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text()?;

    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    if !status.is_success() {
        let detail = error_detail(&body);
        tracing::warn!(endpoint, status = status.as_u16(), %detail, "后端返回错误");
        return Err(ApiError::Status {
            status: status.as_u16(),
            detail,
        });
    }

    serde_json::from_str(&body).map_err(|source| ApiError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

fn login_rejected(detail: &str) -> ApiError {
    if detail == "Unknown error" {
        ApiError::Rejected("用户名或密码错误".to_string())
    } else {
        ApiError::Rejected(detail.to_string())
    }
}

/// 提取后端 `{"detail": ...}` 错误信息
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("detail") {
            Some(Value::String(detail)) => detail.clone(),
            Some(other) => other.to_string(),
            None => body.trim().to_string(),
        },
        _ if body.trim().is_empty() => "Unknown error".to_string(),
        _ => body.trim().to_string(),
    }
}
