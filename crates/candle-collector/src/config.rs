//! YAML 파일 + 환경변수 기반 설정 모듈.
//!
//! 설정 파일은 `collector.yaml` 하나이며 `CANDLE__<SECTION>__<KEY>` 형식의
//! 환경변수로 개별 값을 덮어쓸 수 있습니다 (예: `CANDLE__QUOTE__RPS=20`).

use std::collections::hash_map::{Entry, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use candle_core::{
    parse_date, AdjustType, CandlePeriod, LogConfig, LogFormat, SymbolCode,
};
use chrono::NaiveDate;
use config::{Environment, File, FileFormat};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::error::CollectorError;
use crate::Result;

/// 설정 파일 이름
pub const CONFIG_FILE_NAME: &str = "collector.yaml";

/// 기본 워커 수
pub const DEFAULT_THREADS: usize = 5;
/// 기본 초당 요청 수
pub const DEFAULT_RPS: u32 = 10;
/// 기본 요청 타임아웃 (밀리초)
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
/// 기본 최대 시도 횟수
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// 기본 백오프 시작 지연 (밀리초)
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;
/// 기본 백오프 최대 지연 (밀리초)
pub const DEFAULT_MAX_DELAY_MS: u64 = 2_000;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 수집 대상 심볼
    pub symbols: Vec<SymbolCode>,
    /// 수집 대상 날짜
    pub dates: Vec<NaiveDate>,
    /// 캔들 주기
    pub period: CandlePeriod,
    /// 가격 수정 방식
    pub adjust_type: AdjustType,
    /// 시세 서비스 계정 및 처리량 설정
    pub quote: QuoteConfig,
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 재시도 설정
    pub retry: RetryConfig,
    /// 로깅 설정
    pub logging: LogConfig,
}

/// 시세 서비스 설정 (단일 계정)
#[derive(Debug, Clone)]
pub struct QuoteConfig {
    pub base_url: String,
    pub app_key: String,
    pub app_secret: SecretString,
    pub access_token: SecretString,
    pub region: String,
    /// 워커 수
    pub threads: usize,
    /// 초당 최대 요청 수
    pub rps: u32,
    /// 요청 타임아웃 (밀리초)
    pub timeout_ms: u64,
}

impl QuoteConfig {
    /// 요청 타임아웃을 Duration으로 반환
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// 데이터베이스 설정
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub name: String,
    pub sslmode: String,
    /// 커넥션 풀 최대 크기
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// sqlx 연결 옵션 생성.
    ///
    /// `DATABASE_URL` 환경변수가 있으면 파일 설정보다 우선합니다.
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            return PgConnectOptions::from_str(&url)
                .map_err(|e| CollectorError::Config(format!("DATABASE_URL 해석 실패: {}", e)));
        }

        let ssl_mode = PgSslMode::from_str(&self.sslmode).map_err(|_| {
            CollectorError::Config(format!("지원하지 않는 sslmode: {}", self.sslmode))
        })?;

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(self.password.expose_secret())
            .database(&self.name)
            .ssl_mode(ssl_mode))
    }
}

/// 재시도 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    #[serde(default)]
    symbols: Vec<String>,
    #[serde(default)]
    dates: Vec<String>,
    #[serde(default)]
    settings: SettingsSection,
    quote: QuoteSection,
    database: DatabaseSection,
    #[serde(default)]
    retry: RetrySection,
    #[serde(default)]
    logging: LoggingSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    period: Option<String>,
    adjust_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuoteSection {
    #[serde(default)]
    base_url: String,
    #[serde(default)]
    app_key: String,
    #[serde(default)]
    app_secret: String,
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    region: String,
    threads: Option<i64>,
    rps: Option<i64>,
    timeout_ms: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DatabaseSection {
    #[serde(default = "default_db_host")]
    host: String,
    port: Option<i64>,
    #[serde(default)]
    user: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    name: String,
    sslmode: Option<String>,
    max_connections: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct RetrySection {
    max_attempts: Option<i64>,
    base_delay_ms: Option<i64>,
    max_delay_ms: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    format: Option<String>,
    with_file: Option<bool>,
    with_thread_ids: Option<bool>,
    with_target: Option<bool>,
}

fn default_db_host() -> String {
    "127.0.0.1".to_string()
}

impl CollectorConfig {
    /// 설정 파일과 환경변수에서 설정 로드.
    ///
    /// `.env`는 호출 전에 읽어 두어야 합니다 (`CONFIG_DIR` 해석에도 필요).
    pub fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(File::from(path).format(FileFormat::Yaml).required(true))
            .add_source(
                Environment::with_prefix("CANDLE")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("symbols")
                    .with_list_parse_key("dates"),
            )
            .build()
            .map_err(|e| {
                CollectorError::Config(format!("{} 읽기 실패: {}", path.display(), e))
            })?;

        Self::from_file_config(settings.try_deserialize()?)
    }

    /// YAML 문자열에서 설정 로드 (환경변수 미적용)
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(File::from_str(content, FileFormat::Yaml))
            .build()?;
        Self::from_file_config(settings.try_deserialize()?)
    }

    fn from_file_config(file: FileConfig) -> Result<Self> {
        let symbols = file
            .symbols
            .iter()
            .map(|s| s.parse::<SymbolCode>())
            .collect::<candle_core::Result<Vec<_>>>()?;
        check_table_collisions(&symbols)?;
        let dates = file
            .dates
            .iter()
            .map(|d| parse_date(d))
            .collect::<candle_core::Result<Vec<_>>>()?;

        let period = file
            .settings
            .period
            .as_deref()
            .map(CandlePeriod::from_config)
            .unwrap_or_default();
        let adjust_type = file
            .settings
            .adjust_type
            .as_deref()
            .map(AdjustType::from_config)
            .unwrap_or_default();

        let q = file.quote;
        if q.base_url.trim().is_empty() {
            return Err(CollectorError::Config(
                "quote.base_url 이 설정되지 않았습니다".to_string(),
            ));
        }
        let threads = positive_or(q.threads, DEFAULT_THREADS as u64) as usize;
        let quote = QuoteConfig {
            base_url: q.base_url.trim_end_matches('/').to_string(),
            app_key: q.app_key,
            app_secret: SecretString::from(q.app_secret),
            access_token: SecretString::from(q.access_token),
            region: q.region,
            threads,
            rps: positive_or(q.rps, DEFAULT_RPS as u64) as u32,
            timeout_ms: positive_or(q.timeout_ms, DEFAULT_TIMEOUT_MS),
        };

        let db = file.database;
        let database = DatabaseConfig {
            host: db.host,
            port: positive_or(db.port, 5432) as u16,
            user: db.user,
            password: SecretString::from(db.password),
            name: db.name,
            sslmode: db.sslmode.unwrap_or_else(|| "disable".to_string()),
            max_connections: positive_or(db.max_connections, threads as u64 + 1) as u32,
        };

        let retry = RetryConfig {
            max_attempts: positive_or(file.retry.max_attempts, DEFAULT_MAX_ATTEMPTS as u64) as u32,
            base_delay_ms: positive_or(file.retry.base_delay_ms, DEFAULT_BASE_DELAY_MS),
            max_delay_ms: positive_or(file.retry.max_delay_ms, DEFAULT_MAX_DELAY_MS),
        };

        let format = match file.logging.format.as_deref() {
            Some(f) => LogFormat::from_str(f).map_err(CollectorError::Config)?,
            None => LogFormat::default(),
        };
        let defaults = LogConfig::default();
        let logging =
            LogConfig::new(file.logging.level.unwrap_or_else(|| "info".to_string()))
                .with_format(format)
                .with_file(file.logging.with_file.unwrap_or(defaults.with_file))
                .with_thread_ids(
                    file.logging
                        .with_thread_ids
                        .unwrap_or(defaults.with_thread_ids),
                )
                .with_target(file.logging.with_target.unwrap_or(defaults.with_target));

        Ok(Self {
            symbols,
            dates,
            period,
            adjust_type,
            quote,
            database,
            retry,
            logging,
        })
    }

    /// 전체 작업 수 (심볼 수 × 날짜 수)
    pub fn total_tasks(&self) -> usize {
        self.symbols.len() * self.dates.len()
    }
}

/// 서로 다른 심볼이 같은 테이블 이름을 갖지 않는지 확인 (`BRK.B.US` / `BRK-B.US`)
fn check_table_collisions(symbols: &[SymbolCode]) -> Result<()> {
    let mut tables: HashMap<String, &SymbolCode> = HashMap::new();
    for symbol in symbols {
        match tables.entry(symbol.table_name()) {
            Entry::Occupied(existing) if existing.get() != &symbol => {
                return Err(CollectorError::Config(format!(
                    "{} 과 {} 이 같은 테이블 {} 을 사용합니다",
                    existing.get(),
                    symbol,
                    existing.key()
                )));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(symbol);
            }
        }
    }
    Ok(())
}

/// 0 이하이거나 없는 값은 기본값으로 대체
fn positive_or(value: Option<i64>, default: u64) -> u64 {
    match value {
        Some(v) if v > 0 => v as u64,
        _ => default,
    }
}

/// `.env`를 먼저 읽은 뒤 설정 파일 경로를 결정합니다.
///
/// `.env`에 적힌 `CONFIG_DIR`도 경로 결정에 반영됩니다.
pub fn locate_config(explicit: Option<&Path>) -> PathBuf {
    dotenvy::dotenv().ok();
    resolve_config_path(explicit)
}

/// 설정 파일 경로 결정.
///
/// 1. 명시적 경로
/// 2. `$CONFIG_DIR/collector.yaml`
/// 3. `./config/collector.yaml` (존재 시)
/// 4. `<실행 파일 디렉토리>/config/collector.yaml` (존재 시)
/// 5. `./config/collector.yaml` (읽기 단계에서 에러 보고)
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Ok(dir) = std::env::var("CONFIG_DIR") {
        if !dir.is_empty() {
            return Path::new(&dir).join(CONFIG_FILE_NAME);
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        let candidate = cwd.join("config").join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return candidate;
        }
    }

    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        let candidate = dir.join("config").join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return candidate;
        }
    }

    PathBuf::from(".").join("config").join(CONFIG_FILE_NAME)
}
